//! Byte-level filesystem access used by the cache store.
//!
//! The store only needs a handful of operations, so they sit behind the
//! [`Filesystem`] trait. [`LocalFs`] is the real implementation; tests can
//! substitute one that fails on demand.

use std::io;
use std::path::Path;

use async_trait::async_trait;

#[async_trait]
pub trait Filesystem: Send + Sync {
    /// Reads a whole file.
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>>;

    /// Creates or truncates `path` and writes `contents` to it.
    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()>;

    /// Returns `true` if `path` can be stat'ed. Any error reads as absent.
    async fn exists(&self, path: &Path) -> bool;

    /// Creates `path` and any missing parents.
    async fn create_dir_all(&self, path: &Path) -> io::Result<()>;

    /// Moves `from` over `to`, replacing it.
    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    async fn remove(&self, path: &Path) -> io::Result<()>;
}

/// The local disk, through `tokio::fs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl Filesystem for LocalFs {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        tokio::fs::read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        tokio::fs::write(path, contents).await
    }

    async fn exists(&self, path: &Path) -> bool {
        tokio::fs::metadata(path).await.is_ok()
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        tokio::fs::create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        tokio::fs::rename(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        tokio::fs::remove_file(path).await
    }
}

#[async_trait]
impl<F: Filesystem + ?Sized> Filesystem for std::sync::Arc<F> {
    async fn read(&self, path: &Path) -> io::Result<Vec<u8>> {
        (**self).read(path).await
    }

    async fn write(&self, path: &Path, contents: &[u8]) -> io::Result<()> {
        (**self).write(path, contents).await
    }

    async fn exists(&self, path: &Path) -> bool {
        (**self).exists(path).await
    }

    async fn create_dir_all(&self, path: &Path) -> io::Result<()> {
        (**self).create_dir_all(path).await
    }

    async fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        (**self).rename(from, to).await
    }

    async fn remove(&self, path: &Path) -> io::Result<()> {
        (**self).remove(path).await
    }
}
