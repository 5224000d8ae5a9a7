//! Copy decisions for a single source/target file pair

use crate::fingerprint::digest_file;
use std::fmt;
use std::fs;
use std::io;
use std::path::Path;
use tracing::warn;

/// Outcome of comparing a source file against its mirrored target
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CopyDecision {
    /// Target is byte-identical to the source
    Unchanged,
    /// Target does not exist
    Missing,
    /// A directory, symlink or special file occupies the target path
    NotRegular,
    /// Sizes differ
    SizeMismatch { source: u64, target: u64 },
    /// Same size, different content digest
    ContentMismatch,
    /// Stat or digest failed; copy anyway
    Unreadable(String),
}

impl CopyDecision {
    pub fn needs_copy(&self) -> bool {
        !matches!(self, CopyDecision::Unchanged)
    }

    /// Short machine-friendly label for logs and audit records
    pub fn label(&self) -> &'static str {
        match self {
            CopyDecision::Unchanged => "unchanged",
            CopyDecision::Missing => "missing",
            CopyDecision::NotRegular => "not_regular",
            CopyDecision::SizeMismatch { .. } => "size_mismatch",
            CopyDecision::ContentMismatch => "content_mismatch",
            CopyDecision::Unreadable(_) => "unreadable",
        }
    }
}

impl fmt::Display for CopyDecision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CopyDecision::SizeMismatch { source, target } => {
                write!(f, "size_mismatch (source {} bytes, target {} bytes)", source, target)
            }
            CopyDecision::Unreadable(reason) => write!(f, "unreadable ({})", reason),
            other => f.write_str(other.label()),
        }
    }
}

/// Decide whether `target` must be overwritten from `source`.
///
/// Stages short-circuit in order: existence, size, content digest. Every I/O
/// failure resolves to a copy so a real change is never skipped. The target is
/// inspected without following symlinks; the source is read through them.
pub fn decide(source: &Path, target: &Path) -> CopyDecision {
    let target_meta = match fs::symlink_metadata(target) {
        Ok(meta) => meta,
        Err(e) if e.kind() == io::ErrorKind::NotFound => return CopyDecision::Missing,
        Err(e) => return unreadable("stat target", target, e),
    };
    if !target_meta.is_file() {
        return CopyDecision::NotRegular;
    }

    let source_meta = match fs::metadata(source) {
        Ok(meta) => meta,
        Err(e) => return unreadable("stat source", source, e),
    };
    if source_meta.len() != target_meta.len() {
        return CopyDecision::SizeMismatch {
            source: source_meta.len(),
            target: target_meta.len(),
        };
    }

    let source_digest = match digest_file(source) {
        Ok(digest) => digest,
        Err(e) => return unreadable("digest source", source, e),
    };
    let target_digest = match digest_file(target) {
        Ok(digest) => digest,
        Err(e) => return unreadable("digest target", target, e),
    };

    if source_digest == target_digest {
        CopyDecision::Unchanged
    } else {
        CopyDecision::ContentMismatch
    }
}

fn unreadable(stage: &str, path: &Path, err: io::Error) -> CopyDecision {
    warn!(path = %path.display(), stage, error = %err, "Cannot inspect file, copying anyway");
    CopyDecision::Unreadable(format!("{} {}: {}", stage, path.display(), err))
}
