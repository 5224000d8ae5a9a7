//! Directory mirroring
//!
//! A [`DirectoryMirror`] keeps a target tree identical to a source tree at file
//! granularity: changed or missing files are copied over, files that only exist
//! in the target are deleted. Every decision is taken from the current on-disk
//! state, so a sync can be repeated any number of times and an interrupted sync
//! is repaired by the next one.

pub mod plan;
pub mod walker;

use crate::audit::{AuditEvent, AuditLog};
use crate::error::SyncError;
use serde::Serialize;
use std::collections::HashSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

pub use plan::{decide, CopyDecision};
pub use walker::{EntryKind, FileEntry, Walker};

/// Per-cycle summary of a sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncReport {
    /// Source files considered
    pub total: usize,
    pub copied: usize,
    pub unchanged: usize,
    /// Target files removed because no source file maps to them
    pub deleted: usize,
}

/// One source/target directory pair
#[derive(Debug, Clone)]
pub struct DirectoryMirror {
    name: String,
    source: PathBuf,
    target: PathBuf,
    audit: AuditLog,
}

impl DirectoryMirror {
    pub fn new(
        name: impl Into<String>,
        source: impl Into<PathBuf>,
        target: impl Into<PathBuf>,
        audit: AuditLog,
    ) -> Self {
        Self {
            name: name.into(),
            source: source.into(),
            target: target.into(),
            audit,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn source(&self) -> &Path {
        &self.source
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    /// Bring the target tree in line with the source tree.
    ///
    /// A missing target root is treated as empty. A missing source root is an
    /// error: an absent source must never be mirrored as "delete everything".
    pub fn sync(&self) -> Result<SyncReport, SyncError> {
        if !self.source.is_dir() {
            return Err(SyncError::MissingSource(self.source.clone()));
        }

        let source_files = Walker::new(&self.source).files()?;
        let target_files = if self.target.exists() {
            Walker::new(&self.target).files()?
        } else {
            Vec::new()
        };

        let mut report = SyncReport::default();
        let mut mirrored: HashSet<&Path> = HashSet::with_capacity(source_files.len());
        // Source links that do not resolve to a file; nothing under them is deleted.
        let mut held: Vec<&Path> = Vec::new();

        for file in &source_files {
            mirrored.insert(file.relative.as_path());
            if file.is_symlink() && !resolves_to_file(&file.path) {
                warn!(
                    mirror = %self.name,
                    path = %file.path.display(),
                    "Source symlink does not resolve to a regular file, leaving target path alone"
                );
                held.push(file.relative.as_path());
                continue;
            }
            report.total += 1;

            let target_path = self.target.join(&file.relative);
            let decision = decide(&file.path, &target_path);
            if !decision.needs_copy() {
                report.unchanged += 1;
                continue;
            }

            info!(
                mirror = %self.name,
                source = %file.path.display(),
                target = %target_path.display(),
                reason = %decision,
                "Restoring file from source"
            );
            self.copy_file(&file.path, &target_path)?;
            self.audit.record(&AuditEvent::FileCopied {
                source: file.path.clone(),
                target: target_path,
                reason: decision.label().to_string(),
            });
            report.copied += 1;
        }

        for file in &target_files {
            let relative = file.relative.as_path();
            if mirrored.contains(relative) || held.iter().any(|h| relative.starts_with(h)) {
                continue;
            }

            // Directory replacement during the copy phase may already have
            // removed this entry.
            match fs::symlink_metadata(&file.path) {
                Ok(meta) if meta.is_file() || meta.file_type().is_symlink() => {}
                _ => {
                    debug!(path = %file.path.display(), "Stale target entry already gone");
                    continue;
                }
            }

            info!(
                mirror = %self.name,
                path = %file.path.display(),
                symlink = file.is_symlink(),
                "Target entry has no source counterpart, deleting"
            );
            fs::remove_file(&file.path).map_err(|source| SyncError::Delete {
                path: file.path.clone(),
                source,
            })?;
            self.audit.record(&AuditEvent::FileDeleted {
                path: file.path.clone(),
            });
            report.deleted += 1;
        }

        info!(
            mirror = %self.name,
            total = report.total,
            copied = report.copied,
            unchanged = report.unchanged,
            deleted = report.deleted,
            "Sync complete"
        );
        Ok(report)
    }

    /// Overwrite `target` with the full content of `source`, following a
    /// symlinked source to its file.
    fn copy_file(&self, source: &Path, target: &Path) -> Result<(), SyncError> {
        if let Some(parent) = target.parent() {
            self.clear_blocking_ancestors(parent)?;
            fs::create_dir_all(parent).map_err(|source| SyncError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }

        let copy_err = |source_err: io::Error| SyncError::Copy {
            from: source.to_path_buf(),
            to: target.to_path_buf(),
            source: source_err,
        };

        // Never write through a symlink or into a directory squatting on the path.
        if let Ok(meta) = fs::symlink_metadata(target) {
            if meta.is_dir() {
                fs::remove_dir_all(target).map_err(copy_err)?;
            } else if meta.file_type().is_symlink() {
                fs::remove_file(target).map_err(copy_err)?;
            }
        }

        fs::copy(source, target).map_err(copy_err)?;
        Ok(())
    }

    /// Remove non-directories (files, symlinks) sitting where a parent directory
    /// of a mirrored file must be.
    fn clear_blocking_ancestors(&self, dir: &Path) -> Result<(), SyncError> {
        for ancestor in dir.ancestors() {
            if ancestor == self.target || !ancestor.starts_with(&self.target) {
                break;
            }
            if let Ok(meta) = fs::symlink_metadata(ancestor) {
                if !meta.is_dir() {
                    debug!(path = %ancestor.display(), "Removing file that blocks a mirrored directory");
                    fs::remove_file(ancestor).map_err(|source| SyncError::Delete {
                        path: ancestor.to_path_buf(),
                        source,
                    })?;
                }
            }
        }
        Ok(())
    }
}

fn resolves_to_file(path: &Path) -> bool {
    fs::metadata(path).map(|meta| meta.is_file()).unwrap_or(false)
}
