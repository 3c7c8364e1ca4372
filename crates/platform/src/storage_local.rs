//! Local filesystem Storage implementation for desktop runs.
//!
//! `LocalFileStorage` implements `platform::Storage` using `std::fs`.
//! Used when the `std` feature is enabled (host builds only).
//! Clip names such as `/male/c_bwh_16.wav` are resolved relative to the
//! clip root provided at construction, exactly as they appear in a packed
//! flash image.

use std::fs;
use std::io::{Read, Seek, SeekFrom};
use std::path::PathBuf;

use crate::storage::{File, Storage};

/// Error type for local filesystem operations.
#[derive(Debug)]
pub struct LocalStorageError(pub std::io::Error);

impl core::fmt::Display for LocalStorageError {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "local clip storage error: {}", self.0)
    }
}

impl std::error::Error for LocalStorageError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&self.0)
    }
}

/// An open clip on the local filesystem.
pub struct LocalFile {
    inner: fs::File,
    size: u64,
}

impl File for LocalFile {
    type Error = LocalStorageError;

    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, Self::Error> {
        Read::read(&mut self.inner, buf).map_err(LocalStorageError)
    }

    async fn seek(&mut self, pos: u64) -> Result<u64, Self::Error> {
        Seek::seek(&mut self.inner, SeekFrom::Start(pos)).map_err(LocalStorageError)
    }

    fn size(&self) -> u64 {
        self.size
    }
}

/// A `platform::Storage` implementation backed by a clip directory.
///
/// # Example
/// ```no_run
/// # async fn example() {
/// use platform::storage_local::LocalFileStorage;
/// use platform::Storage;
/// let mut storage = LocalFileStorage::new("/home/user/clips");
/// storage.mount().await.unwrap();
/// let file = storage.open_file("/male/c_bwh_16.wav").await.unwrap();
/// # }
/// ```
pub struct LocalFileStorage {
    root: PathBuf,
}

impl LocalFileStorage {
    /// Create a new storage rooted at `clip_root`.
    #[must_use]
    pub fn new(clip_root: impl Into<PathBuf>) -> Self {
        Self {
            root: clip_root.into(),
        }
    }

    fn resolve(&self, path: &str) -> PathBuf {
        // Clip names are absolute within the image; keep them under root.
        self.root.join(path.trim_start_matches('/'))
    }
}

impl Storage for LocalFileStorage {
    type Error = LocalStorageError;
    type File = LocalFile;

    async fn mount(&mut self) -> Result<(), Self::Error> {
        let meta = fs::metadata(&self.root).map_err(LocalStorageError)?;
        if meta.is_dir() {
            Ok(())
        } else {
            Err(LocalStorageError(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "clip root is not a directory",
            )))
        }
    }

    async fn open_file(&mut self, path: &str) -> Result<Self::File, Self::Error> {
        let full = self.resolve(path);
        let file = fs::File::open(&full).map_err(LocalStorageError)?;
        let meta = file.metadata().map_err(LocalStorageError)?;
        Ok(LocalFile {
            inner: file,
            size: meta.len(),
        })
    }

    async fn exists(&mut self, path: &str) -> Result<bool, Self::Error> {
        Ok(self.resolve(path).is_file())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]
mod tests {
    use super::*;
    use crate::storage::{File, Storage};
    use std::fs;
    use tempfile::TempDir;

    #[tokio::test]
    async fn mount_requires_directory() {
        let tmp = TempDir::new().unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        assert!(storage.mount().await.is_ok());

        let mut missing = LocalFileStorage::new(tmp.path().join("nope"));
        assert!(missing.mount().await.is_err());

        fs::write(tmp.path().join("plain"), b"x").unwrap();
        let mut not_dir = LocalFileStorage::new(tmp.path().join("plain"));
        assert!(not_dir.mount().await.is_err());
    }

    #[tokio::test]
    async fn leading_slash_resolves_under_root() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("male")).unwrap();
        fs::write(tmp.path().join("male/c_bwh_16.wav"), b"hello world").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let mut file = storage.open_file("/male/c_bwh_16.wav").await.unwrap();
        let mut buf = [0u8; 11];
        let n = file.read(&mut buf).await.unwrap();
        assert_eq!(n, 11);
        assert_eq!(&buf, b"hello world");
        assert_eq!(file.size(), 11);
    }

    #[tokio::test]
    async fn seek_and_read() {
        let tmp = TempDir::new().unwrap();
        fs::write(tmp.path().join("seek.wav"), b"ABCDEFGH").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        let mut file = storage.open_file("/seek.wav").await.unwrap();
        file.seek(4).await.unwrap();
        let mut buf = [0u8; 4];
        file.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"EFGH");
    }

    #[tokio::test]
    async fn exists_is_false_for_directories_and_missing_files() {
        let tmp = TempDir::new().unwrap();
        fs::create_dir(tmp.path().join("male")).unwrap();
        fs::write(tmp.path().join("male/a_bwh_16.wav"), b"x").unwrap();
        let mut storage = LocalFileStorage::new(tmp.path());
        assert!(storage.exists("/male/a_bwh_16.wav").await.unwrap());
        assert!(!storage.exists("/male").await.unwrap());
        assert!(!storage.exists("/male/b_bwh_16.wav").await.unwrap());
    }
}
