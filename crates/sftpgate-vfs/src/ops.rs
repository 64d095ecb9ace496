//! VFS operations trait.
//!
//! The capability set every storage backend exposes to the protocol engine.
//! Paths are `/`-separated strings; how they map onto backend storage is
//! each backend's business.

use async_trait::async_trait;
use std::time::SystemTime;

use super::file::FileHandle;
use super::types::{DirEntry, FileAttr, OpenFlags};
use super::VfsResult;

/// Core VFS operations trait.
///
/// Implemented by the SFTP adapter, the local-disk backend and the memory
/// backend alike, so the caller never needs to know which one it holds.
#[async_trait]
pub trait VfsOps: Send + Sync {
    /// Human-readable backend name, for diagnostics.
    fn name(&self) -> &str;

    // ========================================================================
    // Handles
    // ========================================================================

    /// Create (or truncate) a file and open it for reading and writing.
    async fn create(&self, path: &str) -> VfsResult<FileHandle>;

    /// Open a file or directory for reading.
    async fn open(&self, path: &str) -> VfsResult<FileHandle>;

    /// Open with explicit flags. `perm` applies when the file is created.
    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> VfsResult<FileHandle>;

    // ========================================================================
    // Namespace
    // ========================================================================

    /// Create a single directory.
    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()>;

    /// Create a directory and any missing parents.
    async fn mkdir_all(&self, path: &str, perm: u32) -> VfsResult<()>;

    /// Remove a file or an empty directory.
    async fn remove(&self, path: &str) -> VfsResult<()>;

    /// Remove a path and everything below it.
    async fn remove_all(&self, path: &str) -> VfsResult<()>;

    /// Rename a file or directory.
    async fn rename(&self, from: &str, to: &str) -> VfsResult<()>;

    // ========================================================================
    // Metadata
    // ========================================================================

    /// Get file attributes.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr>;

    /// Change permission bits.
    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()>;

    /// Change owner and group.
    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()>;

    /// Change access and modification times.
    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()>;

    // ========================================================================
    // Convenience methods (default implementations)
    // ========================================================================

    /// Check if a path exists.
    async fn exists(&self, path: &str) -> bool {
        self.stat(path).await.is_ok()
    }

    /// List a whole directory through a fresh handle.
    async fn read_dir(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let mut handle = self.open(path).await?;
        let entries = handle.readdir(0).await?;
        handle.close().await?;
        Ok(entries)
    }

    /// Read entire file contents.
    async fn read_to_end(&self, path: &str) -> VfsResult<Vec<u8>> {
        let mut handle = self.open(path).await?;
        let data = handle.read_to_end().await?;
        handle.close().await?;
        Ok(data)
    }
}
