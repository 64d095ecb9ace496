//! Local filesystem backend.
//!
//! Provides access to real filesystem paths, with path security
//! to prevent escaping the root directory.

use async_trait::async_trait;
use std::io::SeekFrom;
use std::os::unix::fs::{MetadataExt, PermissionsExt};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;
use tokio::fs;
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::error::{VfsError, VfsResult};
use crate::file::{FileHandle, VfsFile};
use crate::listing::{DirLister, DirListing};
use crate::ops::VfsOps;
use crate::types::{DirEntry, FileAttr, FileType, OpenFlags};

/// Local filesystem backend.
///
/// All operations are relative to `root`. For example, if `root` is
/// `/srv/ftp`, then `open("/pub/readme.txt")` opens
/// `/srv/ftp/pub/readme.txt`.
///
/// Path security is enforced: attempts to escape via `..` are blocked.
#[derive(Debug, Clone)]
pub struct LocalBackend {
    root: PathBuf,
    read_only: bool,
}

impl LocalBackend {
    /// Create a new local filesystem rooted at the given path.
    ///
    /// The root is canonicalized at construction time to handle symlinks
    /// (e.g. macOS `/tmp` → `/private/tmp`).
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root: PathBuf = root.into();
        let root = root.canonicalize().unwrap_or(root);
        Self {
            root,
            read_only: false,
        }
    }

    /// Create a read-only local filesystem.
    pub fn read_only(root: impl Into<PathBuf>) -> Self {
        Self {
            read_only: true,
            ..Self::new(root)
        }
    }

    /// Get the root path.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a client path to an absolute path within the root.
    ///
    /// Returns an error if the path escapes the root (via `..`).
    async fn resolve(&self, path: &str) -> VfsResult<PathBuf> {
        // Strip leading slash if present
        let path = path.trim_start_matches('/');

        // Handle empty path (root)
        if path.is_empty() {
            return Ok(self.root.clone());
        }

        // Join with root
        let full = self.root.join(path);

        // Canonicalize to resolve symlinks and ..
        // For non-existent paths, we need to check parent
        let canonical = if full.exists() {
            full.canonicalize().map_err(VfsError::from)?
        } else {
            // For new files, canonicalize parent and append filename
            let parent = full.parent().ok_or_else(|| VfsError::invalid_path("no parent"))?;

            let filename = full
                .file_name()
                .ok_or_else(|| VfsError::invalid_path("no filename"))?;

            if parent.exists() {
                parent.canonicalize().map_err(VfsError::from)?.join(filename)
            } else {
                // Parent doesn't exist, will fail on actual operation
                full
            }
        };

        // Verify we haven't escaped the root
        if !canonical.starts_with(&self.root) {
            return Err(VfsError::path_escapes_root(format!(
                "{} is not under {}",
                canonical.display(),
                self.root.display()
            )));
        }

        Ok(canonical)
    }

    /// Check if write operations are allowed.
    fn check_writable(&self, path: &str) -> VfsResult<()> {
        if self.read_only {
            Err(VfsError::permission_denied(format!("{path}: filesystem is read-only")))
        } else {
            Ok(())
        }
    }

    /// Convert std::fs::Metadata to FileAttr.
    fn metadata_to_attr(meta: &std::fs::Metadata) -> FileAttr {
        let kind = if meta.is_dir() {
            FileType::Directory
        } else if meta.file_type().is_symlink() {
            FileType::Symlink
        } else {
            FileType::File
        };

        FileAttr {
            size: meta.len(),
            kind,
            perm: meta.permissions().mode() & 0o7777,
            mtime: meta.modified().unwrap_or(SystemTime::UNIX_EPOCH),
            atime: meta.accessed().ok(),
            uid: Some(meta.uid()),
            gid: Some(meta.gid()),
        }
    }
}

/// Listing side of a [`LocalBackend`], handed to [`DirListing`].
struct LocalLister(LocalBackend);

#[async_trait]
impl DirLister for LocalLister {
    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let full_path = self.0.resolve(path).await?;
        let mut entries = Vec::new();
        let mut dir = fs::read_dir(&full_path).await.map_err(VfsError::from)?;

        while let Some(entry) = dir.next_entry().await.map_err(VfsError::from)? {
            let meta = entry.metadata().await.map_err(VfsError::from)?;
            entries.push(DirEntry::new(
                entry.file_name().to_string_lossy(),
                LocalBackend::metadata_to_attr(&meta),
            ));
        }

        entries.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(entries)
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.0.stat(path).await
    }
}

#[async_trait]
impl VfsOps for LocalBackend {
    fn name(&self) -> &str {
        "local"
    }

    async fn create(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::create_truncate(), 0o666)
            .await
    }

    async fn open(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::read(), 0).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> VfsResult<FileHandle> {
        if flags.write || flags.append || flags.create || flags.truncate {
            self.check_writable(path)?;
        }
        let full_path = self.resolve(path).await?;

        if !flags.write && !flags.append {
            if let Ok(meta) = fs::metadata(&full_path).await {
                if meta.is_dir() {
                    let listing = DirListing::new(Arc::new(LocalLister(self.clone())), path);
                    return Ok(FileHandle::Directory(listing));
                }
            }
        }

        let file = fs::OpenOptions::new()
            .read(flags.read)
            .write(flags.write)
            .append(flags.append)
            .truncate(flags.truncate)
            .create(flags.create && !flags.exclusive)
            .create_new(flags.create && flags.exclusive)
            .mode(if perm == 0 { 0o666 } else { perm })
            .open(&full_path)
            .await
            .map_err(VfsError::from)?;

        Ok(FileHandle::regular(LocalFile {
            name: path.to_string(),
            file,
        }))
    }

    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;

        fs::DirBuilder::new()
            .mode(perm)
            .create(&full_path)
            .await
            .map_err(VfsError::from)
    }

    async fn mkdir_all(&self, path: &str, perm: u32) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;

        fs::DirBuilder::new()
            .mode(perm)
            .recursive(true)
            .create(&full_path)
            .await
            .map_err(VfsError::from)
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let meta = fs::symlink_metadata(&full_path).await.map_err(VfsError::from)?;
        if meta.is_dir() {
            fs::remove_dir(&full_path).await.map_err(VfsError::from)
        } else {
            fs::remove_file(&full_path).await.map_err(VfsError::from)
        }
    }

    async fn remove_all(&self, path: &str) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;
        if full_path == self.root {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        match fs::symlink_metadata(&full_path).await {
            Ok(meta) if meta.is_dir() => fs::remove_dir_all(&full_path).await.map_err(VfsError::from),
            Ok(_) => fs::remove_file(&full_path).await.map_err(VfsError::from),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.check_writable(from)?;
        let from_path = self.resolve(from).await?;
        let to_path = self.resolve(to).await?;

        fs::rename(&from_path, &to_path)
            .await
            .map_err(VfsError::from)
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let full_path = self.resolve(path).await?;
        let meta = fs::metadata(&full_path).await.map_err(VfsError::from)?;
        Ok(Self::metadata_to_attr(&meta))
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;

        fs::set_permissions(&full_path, std::fs::Permissions::from_mode(mode))
            .await
            .map_err(VfsError::from)
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;

        blocking(move || std::os::unix::fs::chown(&full_path, Some(uid), Some(gid))).await
    }

    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.check_writable(path)?;
        let full_path = self.resolve(path).await?;

        let times = std::fs::FileTimes::new()
            .set_accessed(atime)
            .set_modified(mtime);
        blocking(move || std::fs::File::open(&full_path)?.set_times(times)).await
    }
}

/// Run a std-only filesystem call off the async workers.
async fn blocking<F>(f: F) -> VfsResult<()>
where
    F: FnOnce() -> std::io::Result<()> + Send + 'static,
{
    match tokio::task::spawn_blocking(f).await {
        Ok(result) => result.map_err(VfsError::from),
        Err(join) => Err(VfsError::other(format!("blocking task failed: {join}"))),
    }
}

/// Regular file handle on a [`LocalBackend`].
struct LocalFile {
    name: String,
    file: fs::File,
}

#[async_trait]
impl VfsFile for LocalFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        self.file.read(buf).await.map_err(VfsError::from)
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        let saved = self.file.stream_position().await?;
        self.file.seek(SeekFrom::Start(offset)).await?;
        let result = self.file.read(buf).await;
        self.file.seek(SeekFrom::Start(saved)).await?;
        result.map_err(VfsError::from)
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        self.file.seek(pos).await.map_err(VfsError::from)
    }

    async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.file.write_all(data).await?;
        Ok(data.len())
    }

    async fn write_at(&mut self, data: &[u8], offset: u64) -> VfsResult<usize> {
        let saved = self.file.stream_position().await?;
        self.file.seek(SeekFrom::Start(offset)).await?;
        let result = self.file.write_all(data).await;
        self.file.seek(SeekFrom::Start(saved)).await?;
        result?;
        Ok(data.len())
    }

    async fn truncate(&mut self, size: u64) -> VfsResult<()> {
        self.file.set_len(size).await.map_err(VfsError::from)
    }

    async fn sync(&mut self) -> VfsResult<()> {
        self.file.flush().await?;
        self.file.sync_data().await.map_err(VfsError::from)
    }

    async fn close(&mut self) -> VfsResult<()> {
        self.file.flush().await.map_err(VfsError::from)
    }

    async fn stat(&mut self) -> VfsResult<FileAttr> {
        let meta = self.file.metadata().await?;
        Ok(LocalBackend::metadata_to_attr(&meta))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn setup() -> (TempDir, LocalBackend) {
        let dir = TempDir::new().unwrap();
        let backend = LocalBackend::new(dir.path());
        (dir, backend)
    }

    #[tokio::test]
    async fn test_create_write_read() {
        let (_dir, fs) = setup();

        let mut file = fs.create("/test.txt").await.unwrap();
        file.write_str("hello world").await.unwrap();
        file.close().await.unwrap();

        assert_eq!(fs.read_to_end("/test.txt").await.unwrap(), b"hello world");
        assert_eq!(fs.stat("/test.txt").await.unwrap().size, 11);
    }

    #[tokio::test]
    async fn test_read_at_keeps_offset() {
        let (dir, fs) = setup();
        std::fs::write(dir.path().join("data.bin"), b"0123456789").unwrap();

        let mut file = fs.open("/data.bin").await.unwrap();
        let mut buf = [0u8; 3];
        file.read_at(&mut buf, 7).await.unwrap();
        assert_eq!(&buf, b"789");

        file.read(&mut buf).await.unwrap();
        assert_eq!(&buf, b"012");
    }

    #[tokio::test]
    async fn test_open_directory_lists() {
        let (dir, fs) = setup();
        std::fs::create_dir(dir.path().join("sub")).unwrap();
        std::fs::write(dir.path().join("sub/b.txt"), b"b").unwrap();
        std::fs::write(dir.path().join("sub/a.txt"), b"a").unwrap();

        let mut handle = fs.open("/sub").await.unwrap();
        assert!(handle.is_directory_listing());
        assert_eq!(handle.readdir_names(1).await.unwrap(), vec!["a.txt"]);
        assert_eq!(handle.readdir_names(0).await.unwrap(), vec!["b.txt"]);
        assert!(handle.write(b"x").await.unwrap_err().is_unsupported());
    }

    #[tokio::test]
    async fn test_mkdir_remove() {
        let (dir, fs) = setup();

        fs.mkdir("/one", 0o755).await.unwrap();
        assert!(fs.mkdir("/x/y", 0o755).await.is_err());
        fs.mkdir_all("/x/y/z", 0o755).await.unwrap();
        assert!(dir.path().join("x/y/z").is_dir());

        assert!(fs.remove("/x").await.is_err());
        fs.remove_all("/x").await.unwrap();
        assert!(!dir.path().join("x").exists());

        fs.remove("/one").await.unwrap();
        fs.remove_all("/never-existed").await.unwrap();
    }

    #[tokio::test]
    async fn test_mkdir_applies_mode() {
        let (_dir, fs) = setup();

        fs.mkdir("/private", 0o700).await.unwrap();
        assert_eq!(fs.stat("/private").await.unwrap().perm, 0o700);

        fs.mkdir_all("/deep/er", 0o700).await.unwrap();
        assert_eq!(fs.stat("/deep/er").await.unwrap().perm, 0o700);
    }

    #[tokio::test]
    async fn test_chown_to_current_owner() {
        let (dir, fs) = setup();
        std::fs::write(dir.path().join("mine"), b"").unwrap();
        let meta = std::fs::metadata(dir.path().join("mine")).unwrap();

        fs.chown("/mine", meta.uid(), meta.gid()).await.unwrap();
        let attr = fs.stat("/mine").await.unwrap();
        assert_eq!(attr.uid, Some(meta.uid()));
        assert!(fs.chown("/absent", meta.uid(), meta.gid()).await.is_err());
    }

    #[tokio::test]
    async fn test_rename_and_chmod() {
        let (dir, fs) = setup();
        std::fs::write(dir.path().join("old.txt"), b"content").unwrap();

        fs.rename("/old.txt", "/new.txt").await.unwrap();
        fs.chmod("/new.txt", 0o600).await.unwrap();

        assert!(!dir.path().join("old.txt").exists());
        assert_eq!(fs.stat("/new.txt").await.unwrap().perm, 0o600);
    }

    #[tokio::test]
    async fn test_chtimes() {
        let (dir, fs) = setup();
        std::fs::write(dir.path().join("f"), b"").unwrap();

        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_500_000_000);
        fs.chtimes("/f", when, when).await.unwrap();
        assert_eq!(fs.stat("/f").await.unwrap().mtime, when);
    }

    #[tokio::test]
    async fn test_path_escape_blocked() {
        let (_dir, fs) = setup();
        let result = fs.stat("/../../../etc/passwd").await;
        assert!(matches!(result, Err(VfsError::PathEscapesRoot(_))));
    }

    #[tokio::test]
    async fn test_read_only() {
        let dir = TempDir::new().unwrap();
        let fs = LocalBackend::read_only(dir.path());

        let result = fs.create("/test.txt").await;
        assert!(matches!(result, Err(VfsError::PermissionDenied(_))));
        assert!(fs.mkdir("/d", 0o755).await.is_err());
    }
}
