//! On-disk cache of file contents.
//!
//! One file per cached object at `{root}/{name}`, plus transient
//! `{root}/.{object_id}.tmp` files while a download is in flight. Every writer
//! for a given name is serialized by that handle's task queue, so the cache
//! itself does no locking.

use std::io::Write;
use std::path::{Path, PathBuf};

use bytes::Bytes;
use tracing::{debug, warn};

use crate::error::{FileError, Result};

/// Keep names and object ids to a single path component.
fn flatten(component: &str) -> String {
    component.replace(['/', '\\'], "_")
}

#[derive(Debug, Clone)]
pub struct CacheStore {
    root: PathBuf,
}

impl CacheStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Cache path for a file name.
    pub fn path_for(&self, name: &str) -> PathBuf {
        self.root.join(flatten(name))
    }

    /// Download staging path for a remote object.
    pub fn temp_path_for(&self, object_id: &str) -> PathBuf {
        self.root.join(format!(".{}.tmp", flatten(object_id)))
    }

    pub fn exists(&self, path: &Path) -> bool {
        path.is_file()
    }

    /// Async form of [`exists`](Self::exists) for use inside units of work.
    pub async fn contains(&self, path: &Path) -> bool {
        tokio::fs::metadata(path)
            .await
            .map(|metadata| metadata.is_file())
            .unwrap_or(false)
    }

    /// Write `data` to `path`, replacing any existing file.
    ///
    /// The bytes go to a temp file in the same directory first and are renamed
    /// into place, so readers see either the old file or the complete new one.
    pub async fn write(&self, path: &Path, data: Bytes) -> Result<()> {
        let path = path.to_path_buf();
        let dir = path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());

        debug!(path = %path.display(), size = data.len(), "writing cache file");

        tokio::task::spawn_blocking(move || -> Result<()> {
            std::fs::create_dir_all(&dir).map_err(|e| FileError::io("create dir", &dir, e))?;
            let mut temp = tempfile::NamedTempFile::new_in(&dir)
                .map_err(|e| FileError::io("write", &path, e))?;
            temp.write_all(&data)
                .map_err(|e| FileError::io("write", &path, e))?;
            temp.as_file()
                .sync_all()
                .map_err(|e| FileError::io("write", &path, e))?;
            temp.persist(&path)
                .map_err(|e| FileError::io("write", &path, e.error))?;
            Ok(())
        })
        .await
        .map_err(|_| FileError::Aborted)?
    }

    /// Move `src` to `dst`. Fails if `dst` already exists.
    pub async fn rename(&self, src: &Path, dst: &Path) -> Result<()> {
        let occupied = tokio::fs::try_exists(dst)
            .await
            .map_err(|e| FileError::io("move", dst, e))?;
        if occupied {
            return Err(FileError::io(
                "move",
                dst,
                std::io::Error::new(
                    std::io::ErrorKind::AlreadyExists,
                    "destination already exists",
                ),
            ));
        }

        let rename_err = match tokio::fs::rename(src, dst).await {
            Ok(()) => return Ok(()),
            Err(e) => e,
        };

        // rename can fail across filesystems; copy and drop the source instead
        debug!(src = %src.display(), error = %rename_err, "rename failed, copying");
        tokio::fs::copy(src, dst)
            .await
            .map_err(|_| FileError::io("move", src, rename_err))?;
        if let Err(e) = tokio::fs::remove_file(src).await {
            self.remove(dst).await;
            return Err(FileError::io("move", src, e));
        }
        Ok(())
    }

    /// Best-effort delete. Missing files are fine; other errors are logged.
    pub async fn remove(&self, path: &Path) {
        match tokio::fs::remove_file(path).await {
            Ok(()) => debug!(path = %path.display(), "removed cache file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => warn!(path = %path.display(), error = %e, "failed to remove cache file"),
        }
    }

    pub async fn read(&self, path: &Path) -> Result<Bytes> {
        tokio::fs::read(path)
            .await
            .map(Bytes::from)
            .map_err(|e| FileError::io("read", path, e))
    }

    pub async fn open(&self, path: &Path) -> Result<tokio::fs::File> {
        tokio::fs::File::open(path)
            .await
            .map_err(|e| FileError::io("open", path, e))
    }

    /// Delete every entry in the cache directory.
    ///
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(FileError::io("clear", &self.root, e)),
        };

        let mut removed = 0;
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| FileError::io("clear", &self.root, e))?
        {
            let path = entry.path();
            let result = match entry.file_type().await {
                Ok(file_type) if file_type.is_dir() => tokio::fs::remove_dir_all(&path).await,
                _ => tokio::fs::remove_file(&path).await,
            };
            match result {
                Ok(()) => removed += 1,
                Err(e) => warn!(path = %path.display(), error = %e, "failed to clear cache entry"),
            }
        }

        debug!(root = %self.root.display(), removed, "cache cleared");
        Ok(removed)
    }
}
