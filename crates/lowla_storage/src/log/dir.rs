//! On-disk layout of a persistent store.
//!
//! ```text
//! <store_path>/
//! ├─ LOCK          # advisory lock, one process at a time
//! └─ data.log      # frame log
//! ```

use crate::error::{StorageError, StorageResult};
use fs2::FileExt;
use std::fs::{self, File, OpenOptions};
use std::path::{Path, PathBuf};

const LOCK_FILE: &str = "LOCK";
const LOG_FILE: &str = "data.log";
const COMPACT_FILE: &str = "data.log.compact";

/// A store directory held under an exclusive lock for as long as this
/// value lives.
#[derive(Debug)]
pub(crate) struct StoreDir {
    path: PathBuf,
    _lock: File,
}

impl StoreDir {
    pub(crate) fn open(path: &Path, create_if_missing: bool) -> StorageResult<Self> {
        if !path.exists() {
            if create_if_missing {
                fs::create_dir_all(path)?;
            } else {
                return Err(StorageError::Io(std::io::Error::new(
                    std::io::ErrorKind::NotFound,
                    format!("store directory does not exist: {}", path.display()),
                )));
            }
        }
        if !path.is_dir() {
            return Err(StorageError::Io(std::io::Error::new(
                std::io::ErrorKind::InvalidInput,
                format!("not a directory: {}", path.display()),
            )));
        }

        let lock = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(path.join(LOCK_FILE))?;
        if lock.try_lock_exclusive().is_err() {
            return Err(StorageError::Locked);
        }

        Ok(Self {
            path: path.to_path_buf(),
            _lock: lock,
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn log_path(&self) -> PathBuf {
        self.path.join(LOG_FILE)
    }

    pub(crate) fn compact_path(&self) -> PathBuf {
        self.path.join(COMPACT_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn second_open_is_locked_out() {
        let dir = tempdir().unwrap();
        let first = StoreDir::open(dir.path(), true).unwrap();
        assert!(matches!(
            StoreDir::open(dir.path(), true),
            Err(StorageError::Locked)
        ));
        drop(first);
        assert!(StoreDir::open(dir.path(), true).is_ok());
    }

    #[test]
    fn missing_directory_without_create_fails() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("absent");
        assert!(StoreDir::open(&path, false).is_err());
        let opened = StoreDir::open(&path, true).unwrap();
        assert_eq!(opened.log_path(), path.join("data.log"));
    }
}
