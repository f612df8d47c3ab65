//! Sandboxed file store rooted at the workspace directory.
//!
//! Every path handed to the store is relative to the workspace root and is
//! resolved before the filesystem is touched:
//! - `..` and `.` segments are folded lexically; climbing above the root is
//!   rejected.
//! - Absolute paths (and Windows prefixes) are rejected.
//! - The deepest existing ancestor of the target is canonicalized so a
//!   symlink inside the workspace cannot redirect writes outside it.

use std::fs::OpenOptions;
use std::io::Write;
use std::path::{Component, Path, PathBuf};

use thiserror::Error;

/// Errors raised by [`FileStore`] operations.
#[derive(Debug, Error)]
pub enum WorkspaceError {
    /// The path resolves outside the workspace root.
    #[error("path {path:?} escapes the workspace root {}", root.display())]
    PathTraversal { path: String, root: PathBuf },

    /// A read targeted a file that does not exist.
    #[error("file not found: {path}")]
    FileNotFound { path: String },

    /// Any other filesystem failure.
    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// File access confined to one workspace root.
#[derive(Debug, Clone)]
pub struct FileStore {
    /// Canonical workspace root.
    root: PathBuf,
}

impl FileStore {
    /// Open (creating if needed) the workspace at `root`.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, WorkspaceError> {
        let root = root.as_ref();
        std::fs::create_dir_all(root).map_err(|source| WorkspaceError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        let root = root.canonicalize().map_err(|source| WorkspaceError::Io {
            path: root.to_path_buf(),
            source,
        })?;
        Ok(Self { root })
    }

    /// The canonical workspace root.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Map `relative` to an absolute path inside the workspace without
    /// creating anything.
    pub fn locate(&self, relative: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let relative = relative.as_ref();
        let traversal = || WorkspaceError::PathTraversal {
            path: relative.display().to_string(),
            root: self.root.clone(),
        };

        let mut resolved = self.root.clone();
        let mut depth = 0usize;
        for component in relative.components() {
            match component {
                Component::Normal(part) => {
                    resolved.push(part);
                    depth += 1;
                }
                Component::CurDir => {}
                Component::ParentDir => {
                    if depth == 0 {
                        return Err(traversal());
                    }
                    resolved.pop();
                    depth -= 1;
                }
                Component::RootDir | Component::Prefix(_) => return Err(traversal()),
            }
        }

        // Symlinks: whatever already exists on the way must stay inside.
        if let Some(existing) = resolved
            .ancestors()
            .find(|p| p.symlink_metadata().is_ok())
        {
            let canonical = existing.canonicalize().map_err(|_| traversal())?;
            if !canonical.starts_with(&self.root) {
                tracing::warn!(
                    path = %relative.display(),
                    resolved = %canonical.display(),
                    "rejected path that leaves the workspace through a symlink"
                );
                return Err(traversal());
            }
        }

        Ok(resolved)
    }

    /// Resolve `relative` inside the workspace and create its missing parent
    /// directories.
    pub fn resolve(&self, relative: impl AsRef<Path>) -> Result<PathBuf, WorkspaceError> {
        let target = self.locate(relative)?;
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).map_err(|source| WorkspaceError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        Ok(target)
    }

    /// Create or truncate the file at `relative` and write `content`.
    pub fn write(
        &self,
        relative: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf, WorkspaceError> {
        let target = self.resolve(relative)?;
        std::fs::write(&target, content).map_err(|source| WorkspaceError::Io {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }

    /// Append `content` to the file at `relative`, creating it if absent.
    pub fn append(
        &self,
        relative: impl AsRef<Path>,
        content: impl AsRef<[u8]>,
    ) -> Result<PathBuf, WorkspaceError> {
        let target = self.resolve(relative)?;
        let io_err = |source| WorkspaceError::Io {
            path: target.clone(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&target)
            .map_err(io_err)?;
        file.write_all(content.as_ref()).map_err(io_err)?;
        Ok(target)
    }

    /// Read the file at `relative` as text.
    pub fn read(&self, relative: impl AsRef<Path>) -> Result<String, WorkspaceError> {
        let relative = relative.as_ref();
        let target = self.locate(relative)?;
        if !target.is_file() {
            return Err(WorkspaceError::FileNotFound {
                path: relative.display().to_string(),
            });
        }
        std::fs::read_to_string(&target).map_err(|source| WorkspaceError::Io {
            path: target,
            source,
        })
    }

    /// Whether a file or directory exists at `relative`.
    pub fn exists(&self, relative: impl AsRef<Path>) -> Result<bool, WorkspaceError> {
        Ok(self.locate(relative)?.exists())
    }
}
