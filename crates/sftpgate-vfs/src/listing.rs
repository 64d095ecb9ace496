//! Listing-only directory handles.
//!
//! Some servers refuse to open a directory through the generic open path but
//! still answer a dedicated listing request. [`DirListing`] covers that case:
//! it holds a path and a [`DirLister`], fetches the whole listing on the first
//! `readdir` call and then hands it out through a cursor.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::sync::Arc;

use super::types::{DirEntry, FileAttr};
use super::{VfsError, VfsResult};

/// The two remote queries a directory handle needs.
#[async_trait]
pub trait DirLister: Send + Sync {
    /// All entries of the directory at `path`, in backend order.
    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>>;

    /// Attributes of `path`.
    async fn stat(&self, path: &str) -> VfsResult<FileAttr>;
}

/// Listing-only handle over one directory path.
///
/// Not meant for concurrent use: the cursor is plain state owned by the
/// handle, hence the `&mut self` on [`readdir`](Self::readdir).
pub struct DirListing {
    lister: Arc<dyn DirLister>,
    path: String,
    entries: Option<Vec<DirEntry>>,
    position: usize,
}

impl std::fmt::Debug for DirListing {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DirListing")
            .field("path", &self.path)
            .field("cached", &self.entries.as_ref().map(Vec::len))
            .field("position", &self.position)
            .finish()
    }
}

impl DirListing {
    /// Bind a listing handle to `path`. Nothing is fetched yet.
    pub fn new(lister: Arc<dyn DirLister>, path: impl Into<String>) -> Self {
        Self {
            lister,
            path: path.into(),
            entries: None,
            position: 0,
        }
    }

    /// The bound path.
    pub fn name(&self) -> &str {
        &self.path
    }

    /// Cursor position into the cached listing.
    pub fn position(&self) -> usize {
        self.position
    }

    /// Returns true once the listing has been fetched.
    pub fn is_loaded(&self) -> bool {
        self.entries.is_some()
    }

    /// Up to `count` entries starting at the cursor.
    ///
    /// The first call fetches the full listing in one round trip. `count <= 0`
    /// returns the whole remaining tail. Once the cursor is at the end every
    /// call returns an empty vector.
    pub async fn readdir(&mut self, count: isize) -> VfsResult<Vec<DirEntry>> {
        if self.entries.is_none() {
            let fetched = self.lister.list(&self.path).await?;
            tracing::debug!(path = %self.path, entries = fetched.len(), "fetched directory listing");
            self.entries = Some(fetched);
            self.position = 0;
        }
        let entries = self.entries.as_deref().unwrap_or_default();

        let end = if count <= 0 {
            entries.len()
        } else {
            self.position.saturating_add(count as usize).min(entries.len())
        };

        let batch = entries[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }

    /// Names only; shares the cursor with [`readdir`](Self::readdir).
    pub async fn readdir_names(&mut self, count: isize) -> VfsResult<Vec<String>> {
        let entries = self.readdir(count).await?;
        Ok(entries.into_iter().map(|e| e.name).collect())
    }

    /// Attributes of the bound path, straight from the backend.
    pub async fn stat(&self) -> VfsResult<FileAttr> {
        self.lister.stat(&self.path).await
    }

    pub fn read(&self, _buf: &mut [u8]) -> VfsResult<usize> {
        Err(VfsError::unsupported("read", &self.path))
    }

    pub fn read_at(&self, _buf: &mut [u8], _offset: u64) -> VfsResult<usize> {
        Err(VfsError::unsupported("read", &self.path))
    }

    pub fn seek(&self, _pos: SeekFrom) -> VfsResult<u64> {
        Err(VfsError::unsupported("seek", &self.path))
    }

    pub fn write(&self, _data: &[u8]) -> VfsResult<usize> {
        Err(VfsError::unsupported("write", &self.path))
    }

    pub fn write_at(&self, _data: &[u8], _offset: u64) -> VfsResult<usize> {
        Err(VfsError::unsupported("write", &self.path))
    }

    pub fn write_str(&self, _s: &str) -> VfsResult<usize> {
        Err(VfsError::unsupported("write", &self.path))
    }

    pub fn truncate(&self, _size: u64) -> VfsResult<()> {
        Err(VfsError::unsupported("truncate", &self.path))
    }

    /// No-op.
    pub fn sync(&self) -> VfsResult<()> {
        Ok(())
    }

    /// No-op; the cached listing goes away with the handle.
    pub fn close(&mut self) -> VfsResult<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedLister {
        names: Vec<&'static str>,
        fetches: AtomicUsize,
    }

    impl FixedLister {
        fn new(names: &[&'static str]) -> Arc<Self> {
            Arc::new(Self {
                names: names.to_vec(),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl DirLister for FixedLister {
        async fn list(&self, _path: &str) -> VfsResult<Vec<DirEntry>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .names
                .iter()
                .map(|n| DirEntry::new(*n, FileAttr::file(0, 0o644)))
                .collect())
        }

        async fn stat(&self, _path: &str) -> VfsResult<FileAttr> {
            Ok(FileAttr::directory(0o755))
        }
    }

    struct FailingLister;

    #[async_trait]
    impl DirLister for FailingLister {
        async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
            Err(VfsError::not_found(path))
        }

        async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
            Err(VfsError::not_found(path))
        }
    }

    #[tokio::test]
    async fn test_bounded_reads_advance_cursor() {
        let lister = FixedLister::new(&["c", "a", "b", "d", "e"]);
        let mut dir = DirListing::new(lister.clone(), "/srv");

        let first = dir.readdir_names(2).await.unwrap();
        assert_eq!(first, vec!["c", "a"]);
        assert_eq!(dir.position(), 2);

        let second = dir.readdir_names(2).await.unwrap();
        assert_eq!(second, vec!["b", "d"]);

        let third = dir.readdir_names(2).await.unwrap();
        assert_eq!(third, vec!["e"]);

        // One round trip for the whole handle.
        assert_eq!(lister.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unbounded_read_drains_tail() {
        let lister = FixedLister::new(&["a", "b", "c"]);
        let mut dir = DirListing::new(lister, "/srv");

        dir.readdir(1).await.unwrap();
        let rest = dir.readdir_names(0).await.unwrap();
        assert_eq!(rest, vec!["b", "c"]);
        assert_eq!(dir.position(), 3);

        let rest = dir.readdir_names(-1).await.unwrap();
        assert!(rest.is_empty());
    }

    #[tokio::test]
    async fn test_exhausted_listing_stays_empty() {
        let lister = FixedLister::new(&["a"]);
        let mut dir = DirListing::new(lister.clone(), "/srv");

        assert_eq!(dir.readdir(0).await.unwrap().len(), 1);
        for count in [0, 1, 10, -5] {
            assert!(dir.readdir(count).await.unwrap().is_empty());
        }
        assert_eq!(lister.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_names_and_entries_share_cursor() {
        let lister = FixedLister::new(&["a", "b", "c", "d"]);
        let mut dir = DirListing::new(lister, "/srv");

        assert_eq!(dir.readdir_names(1).await.unwrap(), vec!["a"]);
        let entries = dir.readdir(2).await.unwrap();
        assert_eq!(entries[0].name, "b");
        assert_eq!(entries[1].name, "c");
        assert_eq!(dir.readdir_names(0).await.unwrap(), vec!["d"]);
    }

    #[tokio::test]
    async fn test_byte_operations_rejected_without_touching_cursor() {
        let lister = FixedLister::new(&["a", "b"]);
        let mut dir = DirListing::new(lister, "/srv");
        dir.readdir(1).await.unwrap();

        let mut buf = [0u8; 8];
        assert!(dir.read(&mut buf).unwrap_err().is_unsupported());
        assert!(dir.read_at(&mut buf, 0).unwrap_err().is_unsupported());
        assert!(dir.seek(SeekFrom::Start(0)).unwrap_err().is_unsupported());
        assert!(dir.write(b"x").unwrap_err().is_unsupported());
        assert!(dir.write_at(b"x", 0).unwrap_err().is_unsupported());
        assert!(dir.write_str("x").unwrap_err().is_unsupported());
        assert!(dir.truncate(0).unwrap_err().is_unsupported());

        assert_eq!(dir.position(), 1);
        assert_eq!(dir.readdir_names(0).await.unwrap(), vec!["b"]);
    }

    #[tokio::test]
    async fn test_close_and_sync_succeed() {
        let mut dir = DirListing::new(FixedLister::new(&[]), "/srv");
        dir.sync().unwrap();
        dir.close().unwrap();
        assert_eq!(dir.name(), "/srv");
        assert!(dir.stat().await.unwrap().is_dir());
    }

    #[tokio::test]
    async fn test_listing_error_surfaces_on_first_call() {
        let mut dir = DirListing::new(Arc::new(FailingLister), "/missing");
        let err = dir.readdir(0).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
        assert!(!dir.is_loaded());
    }
}
