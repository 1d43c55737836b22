//! Filesystem collaborator: existence checks, recursive removal, listings.

use async_trait::async_trait;
use std::io;
use std::path::{Path, PathBuf};

#[async_trait]
pub trait StorageFs: Send + Sync {
    async fn exists(&self, path: &Path) -> io::Result<bool>;

    /// Removes a file or a directory tree. Missing paths are not an error.
    async fn remove_all(&self, path: &Path) -> io::Result<()>;

    /// Entries directly under `root`, sorted by name.
    async fn list_dir(&self, root: &Path) -> io::Result<Vec<PathBuf>>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LocalFs;

#[async_trait]
impl StorageFs for LocalFs {
    async fn exists(&self, path: &Path) -> io::Result<bool> {
        tokio::fs::try_exists(path).await
    }

    async fn remove_all(&self, path: &Path) -> io::Result<()> {
        let meta = match tokio::fs::symlink_metadata(path).await {
            Ok(meta) => meta,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(e),
        };
        if meta.is_dir() {
            tokio::fs::remove_dir_all(path).await
        } else {
            tokio::fs::remove_file(path).await
        }
    }

    async fn list_dir(&self, root: &Path) -> io::Result<Vec<PathBuf>> {
        let mut entries = Vec::new();
        let mut dir = tokio::fs::read_dir(root).await?;
        while let Some(entry) = dir.next_entry().await? {
            entries.push(entry.path());
        }
        entries.sort();
        Ok(entries)
    }
}

/// Checks that `root` is a directory this process can create files in.
pub fn probe_writable(root: &Path) -> io::Result<()> {
    if !root.is_dir() {
        return Err(io::Error::new(
            io::ErrorKind::NotFound,
            format!("{} is not a directory", root.display()),
        ));
    }
    let probe = root.join(format!(".runsweep-probe-{}", std::process::id()));
    std::fs::write(&probe, b"")?;
    std::fs::remove_file(&probe)
}
