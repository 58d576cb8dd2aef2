//! Audio persistence sink.
//!
//! [`AudioStore`] is the capability the pipeline writes through; the
//! default implementation drops bytes into a directory tree, creating any
//! missing parents. Logical names may carry `/` separators so artifacts
//! can be namespaced per message id.

use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::Result;

pub trait AudioStore: Send + Sync {
    /// Persist `data` under `logical_name` (extension added by the store)
    /// and return the path it was stored at.
    fn save(&self, data: &[u8], logical_name: &str) -> Result<PathBuf>;
}

/// Stores audio files under a root directory as `{root}/{name}.{ext}`.
pub struct FileStore {
    root: PathBuf,
    extension: String,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>, extension: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            extension: extension.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl AudioStore for FileStore {
    fn save(&self, data: &[u8], logical_name: &str) -> Result<PathBuf> {
        let path = self.root.join(format!("{logical_name}.{}", self.extension));
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(&path, data)?;
        debug!(bytes = data.len(), path = %path.display(), "saved audio");
        Ok(path)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_save_creates_nested_directories() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "mp3");
        let path = store.save(b"abc", "parts/19a4/news_part1").unwrap();
        assert_eq!(path, tmp.path().join("parts/19a4/news_part1.mp3"));
        assert_eq!(std::fs::read(&path).unwrap(), b"abc");
    }

    #[test]
    fn test_save_overwrites_existing_artifact() {
        let tmp = TempDir::new().unwrap();
        let store = FileStore::new(tmp.path(), "mp3");
        store.save(b"old", "merged/x").unwrap();
        let path = store.save(b"new", "merged/x").unwrap();
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
    }
}
