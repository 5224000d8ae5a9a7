//! File and symlink enumeration for mirrored trees

use crate::error::SyncError;
use std::path::PathBuf;
use tracing::debug;
use walkdir::WalkDir;

/// What sits at a listed path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntryKind {
    File,
    /// A symbolic link, whatever it points to
    Symlink,
}

/// A regular file or symlink found under a mirror root
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileEntry {
    /// Absolute (root-joined) path
    pub path: PathBuf,
    /// Path relative to the walked root
    pub relative: PathBuf,
    /// Size in bytes at walk time; for a symlink, the size of the link itself
    pub size: u64,
    pub kind: EntryKind,
}

impl FileEntry {
    pub fn is_symlink(&self) -> bool {
        self.kind == EntryKind::Symlink
    }
}

/// Walks one root and collects its files and symlinks
pub struct Walker {
    root: PathBuf,
}

impl Walker {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Collect every regular file and symlink below the root, sorted by
    /// relative path.
    ///
    /// Symlinks are listed but never descended into. Sockets, fifos and
    /// devices are skipped. Any walk error aborts: a partial listing of the
    /// source would turn into spurious deletions on the target.
    pub fn files(&self) -> Result<Vec<FileEntry>, SyncError> {
        let mut files = Vec::new();

        for entry in WalkDir::new(&self.root).follow_links(false) {
            let entry = entry.map_err(|e| SyncError::Walk {
                root: self.root.clone(),
                reason: e.to_string(),
            })?;

            let file_type = entry.file_type();
            let kind = if file_type.is_file() {
                EntryKind::File
            } else if file_type.is_symlink() {
                EntryKind::Symlink
            } else {
                if !file_type.is_dir() {
                    debug!(path = %entry.path().display(), "Skipping special file");
                }
                continue;
            };

            let path = entry.path().to_path_buf();
            let relative = path
                .strip_prefix(&self.root)
                .map_err(|e| SyncError::Walk {
                    root: self.root.clone(),
                    reason: format!("{} escapes root: {}", path.display(), e),
                })?
                .to_path_buf();
            // The root itself is never a mirrored entry.
            if relative.as_os_str().is_empty() {
                continue;
            }
            let size = entry
                .metadata()
                .map_err(|e| SyncError::Walk {
                    root: self.root.clone(),
                    reason: format!("Failed to read metadata for {:?}: {}", path, e),
                })?
                .len();

            files.push(FileEntry {
                path,
                relative,
                size,
                kind,
            });
        }

        files.sort_by(|a, b| a.relative.cmp(&b.relative));
        Ok(files)
    }
}
