//! Open file handles.
//!
//! [`FileHandle`] is what `open`/`create` hand back. It is either a regular
//! backend file or a [`DirListing`]; both answer the same method set, so the
//! caller does not care which one it got. Directory handles reject every
//! byte-level operation with [`VfsError::Unsupported`].

use async_trait::async_trait;
use std::io::SeekFrom;

use super::listing::DirListing;
use super::types::{DirEntry, FileAttr};
use super::{VfsError, VfsResult};

/// Chunk size used by [`FileHandle::read_to_end`].
const READ_CHUNK: usize = 32 * 1024;

/// A regular file opened on some backend.
#[async_trait]
pub trait VfsFile: Send {
    /// Path the handle was opened with.
    fn name(&self) -> &str;

    /// Read from the current offset.
    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize>;

    /// Read at `offset` without moving the current offset.
    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize>;

    /// Move the current offset.
    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64>;

    /// Write at the current offset.
    async fn write(&mut self, data: &[u8]) -> VfsResult<usize>;

    /// Write at `offset` without moving the current offset.
    async fn write_at(&mut self, data: &[u8], offset: u64) -> VfsResult<usize>;

    /// Set the file length.
    async fn truncate(&mut self, size: u64) -> VfsResult<()>;

    /// Flush buffered writes to the backend.
    async fn sync(&mut self) -> VfsResult<()>;

    /// Release the handle.
    async fn close(&mut self) -> VfsResult<()>;

    /// Attributes of the open file.
    async fn stat(&mut self) -> VfsResult<FileAttr>;

    /// List directory entries, for backends whose generic open also works on
    /// directories. Follows [`DirListing::readdir`] semantics.
    async fn readdir(&mut self, count: isize) -> VfsResult<Vec<DirEntry>> {
        let _ = count;
        Err(VfsError::not_a_directory(self.name()))
    }
}

/// A handle returned by [`VfsOps::open`](super::VfsOps::open) and friends.
pub enum FileHandle {
    /// A file opened through the backend's generic open path.
    Regular(Box<dyn VfsFile>),
    /// A listing-only directory handle.
    Directory(DirListing),
}

impl std::fmt::Debug for FileHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FileHandle::Regular(file) => f.debug_tuple("Regular").field(&file.name()).finish(),
            FileHandle::Directory(listing) => f.debug_tuple("Directory").field(listing).finish(),
        }
    }
}

impl From<DirListing> for FileHandle {
    fn from(listing: DirListing) -> Self {
        FileHandle::Directory(listing)
    }
}

impl FileHandle {
    /// Box a regular file.
    pub fn regular(file: impl VfsFile + 'static) -> Self {
        FileHandle::Regular(Box::new(file))
    }

    /// Returns true if this is a listing-only directory handle.
    pub fn is_directory_listing(&self) -> bool {
        matches!(self, FileHandle::Directory(_))
    }

    pub fn name(&self) -> &str {
        match self {
            FileHandle::Regular(file) => file.name(),
            FileHandle::Directory(listing) => listing.name(),
        }
    }

    pub async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        match self {
            FileHandle::Regular(file) => file.read(buf).await,
            FileHandle::Directory(listing) => listing.read(buf),
        }
    }

    pub async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        match self {
            FileHandle::Regular(file) => file.read_at(buf, offset).await,
            FileHandle::Directory(listing) => listing.read_at(buf, offset),
        }
    }

    pub async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        match self {
            FileHandle::Regular(file) => file.seek(pos).await,
            FileHandle::Directory(listing) => listing.seek(pos),
        }
    }

    pub async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        match self {
            FileHandle::Regular(file) => file.write(data).await,
            FileHandle::Directory(listing) => listing.write(data),
        }
    }

    pub async fn write_at(&mut self, data: &[u8], offset: u64) -> VfsResult<usize> {
        match self {
            FileHandle::Regular(file) => file.write_at(data, offset).await,
            FileHandle::Directory(listing) => listing.write_at(data, offset),
        }
    }

    pub async fn write_str(&mut self, s: &str) -> VfsResult<usize> {
        match self {
            FileHandle::Regular(file) => file.write(s.as_bytes()).await,
            FileHandle::Directory(listing) => listing.write_str(s),
        }
    }

    pub async fn truncate(&mut self, size: u64) -> VfsResult<()> {
        match self {
            FileHandle::Regular(file) => file.truncate(size).await,
            FileHandle::Directory(listing) => listing.truncate(size),
        }
    }

    pub async fn sync(&mut self) -> VfsResult<()> {
        match self {
            FileHandle::Regular(file) => file.sync().await,
            FileHandle::Directory(listing) => listing.sync(),
        }
    }

    pub async fn close(&mut self) -> VfsResult<()> {
        match self {
            FileHandle::Regular(file) => file.close().await,
            FileHandle::Directory(listing) => listing.close(),
        }
    }

    pub async fn stat(&mut self) -> VfsResult<FileAttr> {
        match self {
            FileHandle::Regular(file) => file.stat().await,
            FileHandle::Directory(listing) => listing.stat().await,
        }
    }

    /// Up to `count` entries from the cursor; `count <= 0` drains the rest.
    pub async fn readdir(&mut self, count: isize) -> VfsResult<Vec<DirEntry>> {
        match self {
            FileHandle::Regular(file) => file.readdir(count).await,
            FileHandle::Directory(listing) => listing.readdir(count).await,
        }
    }

    /// Like [`readdir`](Self::readdir) but names only. Shares the cursor.
    pub async fn readdir_names(&mut self, count: isize) -> VfsResult<Vec<String>> {
        let entries = self.readdir(count).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Read from the current offset until EOF.
    pub async fn read_to_end(&mut self) -> VfsResult<Vec<u8>> {
        let mut data = Vec::new();
        let mut chunk = vec![0u8; READ_CHUNK];
        loop {
            let n = self.read(&mut chunk).await?;
            if n == 0 {
                return Ok(data);
            }
            data.extend_from_slice(&chunk[..n]);
        }
    }
}
