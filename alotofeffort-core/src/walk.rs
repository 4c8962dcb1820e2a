//! Site tree traversal: every regular file under a root directory, paired with its bucket key.

use std::path::{Path, PathBuf};
use tracing::{debug, error, warn};
use walkdir::WalkDir;

use crate::change::object_key;
use crate::deploy::DeployError;

/// One file of the site, read into memory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SiteFile {
    /// Location on the local filesystem.
    pub path: PathBuf,
    /// Relative path from the site root, forward-slash separated.
    pub key: String,
    pub content: Vec<u8>,
}

/// A local directory holding a static site.
#[derive(Debug, Clone)]
pub struct SiteTree {
    root: PathBuf,
}

impl SiteTree {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Lazily walks the tree, reading each file as it is reached.
    ///
    /// Order is deterministic (sorted by file name per directory). Every call starts a fresh walk.
    /// Symlinks are followed; a directory link back to one of its ancestors is skipped.
    pub fn files(&self) -> impl Iterator<Item = Result<SiteFile, DeployError>> + '_ {
        WalkDir::new(&self.root)
            .follow_links(true)
            .sort_by_file_name()
            .into_iter()
            .filter_map(move |entry| {
                let entry = match entry {
                    Ok(entry) => entry,
                    Err(e) if e.loop_ancestor().is_some() => {
                        warn!(path = ?e.path(), ancestor = ?e.loop_ancestor(), "Skipping symlink loop in site directory");
                        return None;
                    }
                    Err(e) => {
                        error!(root = %self.root.display(), error = %e, "Failed to walk site directory");
                        return Some(Err(DeployError::Walk(e.into())));
                    }
                };
                if !entry.file_type().is_file() {
                    return None;
                }
                Some(self.read_entry(entry.path()))
            })
    }

    fn read_entry(&self, path: &Path) -> Result<SiteFile, DeployError> {
        let relative = path
            .strip_prefix(&self.root)
            .map_err(|_| DeployError::InvalidKey(path.to_path_buf()))?;
        let key = object_key(relative)?;
        let content = std::fs::read(path).map_err(|source| {
            error!(error = ?source, path = %path.display(), "Failed to read site file");
            DeployError::Read {
                path: path.to_path_buf(),
                source,
            }
        })?;
        debug!(key = %key, size = content.len(), "Read site file");
        Ok(SiteFile {
            path: path.to_path_buf(),
            key,
            content,
        })
    }
}
