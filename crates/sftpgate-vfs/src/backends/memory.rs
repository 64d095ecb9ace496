//! In-memory filesystem backend.
//!
//! Used for testing. All data is ephemeral.

use async_trait::async_trait;
use std::collections::HashMap;
use std::io::SeekFrom;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::SystemTime;

use crate::error::{VfsError, VfsResult};
use crate::file::{FileHandle, VfsFile};
use crate::listing::{DirLister, DirListing};
use crate::ops::VfsOps;
use crate::types::{DirEntry, FileAttr, OpenFlags};

/// Entry in the memory filesystem.
#[derive(Debug, Clone)]
enum Entry {
    File { data: Vec<u8>, attr: FileAttr },
    Directory { attr: FileAttr },
}

impl Entry {
    fn attr(&self) -> &FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
        }
    }

    fn attr_mut(&mut self) -> &mut FileAttr {
        match self {
            Entry::File { attr, .. } => attr,
            Entry::Directory { attr } => attr,
        }
    }
}

/// The shared tree. Handles keep an `Arc` to it so they outlive borrows of
/// the backend.
#[derive(Debug)]
struct Tree {
    entries: RwLock<HashMap<String, Entry>>,
}

impl Tree {
    fn read(&self) -> VfsResult<RwLockReadGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .read()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn write(&self) -> VfsResult<RwLockWriteGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .write()
            .map_err(|_| VfsError::other("lock poisoned"))
    }

    fn attr_of(&self, key: &str) -> VfsResult<FileAttr> {
        self.read()?
            .get(key)
            .map(|e| e.attr().clone())
            .ok_or_else(|| VfsError::not_found(display(key)))
    }
}

#[async_trait]
impl DirLister for Tree {
    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let key = normalize(path);
        let entries = self.read()?;

        match entries.get(&key) {
            Some(Entry::Directory { .. }) => {}
            Some(_) => return Err(VfsError::not_a_directory(display(&key))),
            None => return Err(VfsError::not_found(display(&key))),
        }

        let mut result: Vec<DirEntry> = entries
            .iter()
            .filter(|(k, _)| k.as_str() != key && parent_of(k) == key)
            .map(|(k, e)| DirEntry::new(base_name(k), e.attr().clone()))
            .collect();

        // Sort for consistent ordering
        result.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(result)
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.attr_of(&normalize(path))
    }
}

/// In-memory filesystem backend.
///
/// Thread-safe via internal `RwLock`. All data is lost when the backend and
/// every handle opened on it are dropped.
#[derive(Debug, Clone)]
pub struct MemoryBackend {
    tree: Arc<Tree>,
    refuse_directory_open: bool,
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryBackend {
    /// Create a new empty in-memory filesystem.
    pub fn new() -> Self {
        let mut entries = HashMap::new();
        // Root directory always exists
        entries.insert(
            String::new(),
            Entry::Directory {
                attr: FileAttr::directory(0o755),
            },
        );
        Self {
            tree: Arc::new(Tree {
                entries: RwLock::new(entries),
            }),
            refuse_directory_open: false,
        }
    }

    /// Make `open` fail on directories, like SFTP servers that only list
    /// directories through the dedicated listing request.
    pub fn refusing_directory_open(mut self) -> Self {
        self.refuse_directory_open = true;
        self
    }

    /// The listing side of this backend, for building [`DirListing`]s.
    pub fn lister(&self) -> Arc<dyn DirLister> {
        self.tree.clone()
    }

    /// Fail unless the parent of `key` is an existing directory.
    fn check_parent(entries: &HashMap<String, Entry>, key: &str) -> VfsResult<()> {
        let parent = parent_of(key);
        match entries.get(&parent) {
            Some(Entry::Directory { .. }) => Ok(()),
            Some(_) => Err(VfsError::not_a_directory(display(&parent))),
            None => Err(VfsError::not_found(display(&parent))),
        }
    }
}

/// Normalize a path: remove leading `/`, resolve `.` and `..`.
fn normalize(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    for component in path.split('/') {
        match component {
            "" | "." => {}
            ".." => {
                parts.pop();
            }
            name => parts.push(name),
        }
    }
    parts.join("/")
}

/// Parent key of a normalized key. The root is its own parent.
fn parent_of(key: &str) -> String {
    key.rsplit_once('/')
        .map(|(parent, _)| parent.to_string())
        .unwrap_or_default()
}

fn base_name(key: &str) -> &str {
    key.rsplit_once('/').map(|(_, name)| name).unwrap_or(key)
}

/// Get the path string for error messages.
fn display(key: &str) -> String {
    format!("/{key}")
}

fn is_under(candidate: &str, dir: &str) -> bool {
    dir.is_empty() || candidate.strip_prefix(dir).is_some_and(|rest| rest.starts_with('/'))
}

#[async_trait]
impl VfsOps for MemoryBackend {
    fn name(&self) -> &str {
        "memory"
    }

    async fn create(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::create_truncate(), 0o666)
            .await
    }

    async fn open(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::read(), 0).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> VfsResult<FileHandle> {
        let key = normalize(path);
        let mut entries = self.tree.write()?;

        match entries.get_mut(&key) {
            Some(_) if flags.create && flags.exclusive => {
                return Err(VfsError::already_exists(display(&key)));
            }
            Some(Entry::Directory { .. }) => {
                if flags.write || flags.append || self.refuse_directory_open {
                    return Err(VfsError::is_a_directory(display(&key)));
                }
                let listing = DirListing::new(self.tree.clone(), display(&key));
                return Ok(FileHandle::Directory(listing));
            }
            Some(Entry::File { data, attr }) => {
                if flags.truncate {
                    data.clear();
                    attr.size = 0;
                    attr.mtime = SystemTime::now();
                }
            }
            None if flags.create => {
                Self::check_parent(&entries, &key)?;
                entries.insert(
                    key.clone(),
                    Entry::File {
                        data: Vec::new(),
                        attr: FileAttr::file(0, perm),
                    },
                );
            }
            None => return Err(VfsError::not_found(display(&key))),
        }

        Ok(FileHandle::regular(MemoryFile {
            tree: self.tree.clone(),
            name: path.to_string(),
            key,
            pos: 0,
            flags,
        }))
    }

    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()> {
        let key = normalize(path);
        let mut entries = self.tree.write()?;

        if entries.contains_key(&key) {
            return Err(VfsError::already_exists(display(&key)));
        }
        Self::check_parent(&entries, &key)?;

        entries.insert(
            key,
            Entry::Directory {
                attr: FileAttr::directory(perm),
            },
        );
        Ok(())
    }

    async fn mkdir_all(&self, path: &str, perm: u32) -> VfsResult<()> {
        let key = normalize(path);
        let mut entries = self.tree.write()?;

        let mut current = String::new();
        for component in key.split('/').filter(|c| !c.is_empty()) {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(component);

            match entries.get(&current) {
                Some(Entry::Directory { .. }) => {}
                Some(_) => return Err(VfsError::not_a_directory(display(&current))),
                None => {
                    entries.insert(
                        current.clone(),
                        Entry::Directory {
                            attr: FileAttr::directory(perm),
                        },
                    );
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        let key = normalize(path);

        if key.is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.tree.write()?;
        match entries.get(&key) {
            Some(Entry::Directory { .. }) => {
                if entries.keys().any(|k| k != &key && is_under(k, &key)) {
                    return Err(VfsError::directory_not_empty(display(&key)));
                }
            }
            Some(_) => {}
            None => return Err(VfsError::not_found(display(&key))),
        }

        entries.remove(&key);
        Ok(())
    }

    async fn remove_all(&self, path: &str) -> VfsResult<()> {
        let key = normalize(path);

        if key.is_empty() {
            return Err(VfsError::permission_denied("cannot remove root"));
        }

        let mut entries = self.tree.write()?;
        entries.retain(|k, _| k != &key && !is_under(k, &key));
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        let from_key = normalize(from);
        let to_key = normalize(to);

        let mut entries = self.tree.write()?;
        Self::check_parent(&entries, &to_key)?;

        // Remove source entry
        let entry = entries
            .remove(&from_key)
            .ok_or_else(|| VfsError::not_found(display(&from_key)))?;

        // If it's a directory, we need to rename all children too
        if matches!(entry, Entry::Directory { .. }) {
            let children: Vec<_> = entries
                .keys()
                .filter(|k| is_under(k, &from_key))
                .cloned()
                .collect();

            for child in children {
                if let Some(child_entry) = entries.remove(&child) {
                    let relative = &child[from_key.len()..];
                    entries.insert(format!("{to_key}{relative}"), child_entry);
                }
            }
        }

        // Insert at new location (possibly overwriting)
        entries.insert(to_key, entry);
        Ok(())
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.tree.attr_of(&normalize(path))
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.update_attr(path, |attr| attr.perm = mode)
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.update_attr(path, |attr| {
            attr.uid = Some(uid);
            attr.gid = Some(gid);
        })
    }

    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.update_attr(path, |attr| {
            attr.atime = Some(atime);
            attr.mtime = mtime;
        })
    }
}

impl MemoryBackend {
    fn update_attr(&self, path: &str, f: impl FnOnce(&mut FileAttr)) -> VfsResult<()> {
        let key = normalize(path);
        let mut entries = self.tree.write()?;
        let entry = entries
            .get_mut(&key)
            .ok_or_else(|| VfsError::not_found(display(&key)))?;
        f(entry.attr_mut());
        Ok(())
    }
}

/// Regular file handle on a [`MemoryBackend`].
struct MemoryFile {
    tree: Arc<Tree>,
    name: String,
    key: String,
    pos: u64,
    flags: OpenFlags,
}

impl MemoryFile {
    fn read_from(&self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        if !self.flags.read {
            return Err(VfsError::permission_denied(format!("{} not open for reading", self.name)));
        }
        let entries = self.tree.read()?;
        match entries.get(&self.key) {
            Some(Entry::File { data, .. }) => {
                let start = (offset as usize).min(data.len());
                let n = buf.len().min(data.len() - start);
                buf[..n].copy_from_slice(&data[start..start + n]);
                Ok(n)
            }
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(display(&self.key))),
            None => Err(VfsError::not_found(display(&self.key))),
        }
    }

    /// Writes at `offset`, or at the end in append mode. Returns the offset
    /// just past the written bytes.
    fn write_to(&self, buf: &[u8], offset: u64) -> VfsResult<u64> {
        if !self.flags.write && !self.flags.append {
            return Err(VfsError::permission_denied(format!("{} not open for writing", self.name)));
        }
        let mut entries = self.tree.write()?;
        match entries.get_mut(&self.key) {
            Some(Entry::File { data, attr }) => {
                let offset = if self.flags.append { data.len() } else { offset as usize };
                // Extend if necessary
                if offset + buf.len() > data.len() {
                    data.resize(offset + buf.len(), 0);
                }
                data[offset..offset + buf.len()].copy_from_slice(buf);
                attr.size = data.len() as u64;
                attr.mtime = SystemTime::now();
                Ok((offset + buf.len()) as u64)
            }
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(display(&self.key))),
            None => Err(VfsError::not_found(display(&self.key))),
        }
    }
}

#[async_trait]
impl VfsFile for MemoryFile {
    fn name(&self) -> &str {
        &self.name
    }

    async fn read(&mut self, buf: &mut [u8]) -> VfsResult<usize> {
        let n = self.read_from(buf, self.pos)?;
        self.pos += n as u64;
        Ok(n)
    }

    async fn read_at(&mut self, buf: &mut [u8], offset: u64) -> VfsResult<usize> {
        self.read_from(buf, offset)
    }

    async fn seek(&mut self, pos: SeekFrom) -> VfsResult<u64> {
        let len = self.tree.attr_of(&self.key)?.size as i64;
        let target = match pos {
            SeekFrom::Start(offset) => offset as i64,
            SeekFrom::End(delta) => len + delta,
            SeekFrom::Current(delta) => self.pos as i64 + delta,
        };
        if target < 0 {
            return Err(VfsError::invalid_path(format!("seek before start of {}", self.name)));
        }
        self.pos = target as u64;
        Ok(self.pos)
    }

    async fn write(&mut self, data: &[u8]) -> VfsResult<usize> {
        self.pos = self.write_to(data, self.pos)?;
        Ok(data.len())
    }

    async fn write_at(&mut self, data: &[u8], offset: u64) -> VfsResult<usize> {
        self.write_to(data, offset)?;
        Ok(data.len())
    }

    async fn truncate(&mut self, size: u64) -> VfsResult<()> {
        let mut entries = self.tree.write()?;
        match entries.get_mut(&self.key) {
            Some(Entry::File { data, attr }) => {
                data.resize(size as usize, 0);
                attr.size = size;
                attr.mtime = SystemTime::now();
                Ok(())
            }
            Some(Entry::Directory { .. }) => Err(VfsError::is_a_directory(display(&self.key))),
            None => Err(VfsError::not_found(display(&self.key))),
        }
    }

    async fn sync(&mut self) -> VfsResult<()> {
        Ok(())
    }

    async fn close(&mut self) -> VfsResult<()> {
        Ok(())
    }

    async fn stat(&mut self) -> VfsResult<FileAttr> {
        self.tree.attr_of(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    async fn write_file(fs: &MemoryBackend, path: &str, data: &[u8]) {
        let mut file = fs.create(path).await.unwrap();
        file.write(data).await.unwrap();
        file.close().await.unwrap();
    }

    #[tokio::test]
    async fn test_create_and_read() {
        let fs = MemoryBackend::new();
        write_file(&fs, "/test.txt", b"hello world").await;

        let data = fs.read_to_end("/test.txt").await.unwrap();
        assert_eq!(data, b"hello world");
    }

    #[tokio::test]
    async fn test_partial_read_at() {
        let fs = MemoryBackend::new();
        write_file(&fs, "/test.txt", b"hello world").await;

        let mut file = fs.open("/test.txt").await.unwrap();
        let mut buf = [0u8; 5];
        let n = file.read_at(&mut buf, 6).await.unwrap();
        assert_eq!(&buf[..n], b"world");

        // read_at leaves the cursor alone
        let n = file.read(&mut buf).await.unwrap();
        assert_eq!(&buf[..n], b"hello");
    }

    #[tokio::test]
    async fn test_mkdir_and_list() {
        let fs = MemoryBackend::new();
        fs.mkdir("/subdir", 0o755).await.unwrap();
        write_file(&fs, "/subdir/file.txt", b"x").await;
        write_file(&fs, "/root.txt", b"y").await;

        let names: Vec<_> = fs
            .read_dir("/")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["root.txt", "subdir"]);

        let sub = fs.read_dir("/subdir").await.unwrap();
        assert_eq!(sub.len(), 1);
        assert_eq!(sub[0].name, "file.txt");
        assert!(sub[0].kind().is_file());
    }

    #[tokio::test]
    async fn test_mkdir_requires_parent() {
        let fs = MemoryBackend::new();
        let err = fs.mkdir("/a/b", 0o755).await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));

        fs.mkdir_all("/a/b/c", 0o700).await.unwrap();
        assert!(fs.stat("/a/b").await.unwrap().is_dir());
        assert_eq!(fs.stat("/a/b/c").await.unwrap().perm, 0o700);

        // Idempotent
        fs.mkdir_all("/a/b/c", 0o700).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove() {
        let fs = MemoryBackend::new();
        fs.mkdir("/dir", 0o755).await.unwrap();
        write_file(&fs, "/dir/file.txt", b"x").await;

        let err = fs.remove("/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));

        fs.remove("/dir/file.txt").await.unwrap();
        fs.remove("/dir").await.unwrap();
        assert!(!fs.exists("/dir").await);
    }

    #[tokio::test]
    async fn test_remove_all() {
        let fs = MemoryBackend::new();
        fs.mkdir_all("/a/b", 0o755).await.unwrap();
        write_file(&fs, "/a/b/file.txt", b"x").await;
        write_file(&fs, "/ab.txt", b"keep").await;

        fs.remove_all("/a").await.unwrap();
        assert!(!fs.exists("/a/b/file.txt").await);
        assert!(!fs.exists("/a").await);
        assert!(fs.exists("/ab.txt").await);

        // Missing paths are fine
        fs.remove_all("/nope").await.unwrap();
    }

    #[tokio::test]
    async fn test_rename_directory_moves_children() {
        let fs = MemoryBackend::new();
        fs.mkdir("/old", 0o755).await.unwrap();
        write_file(&fs, "/old/file.txt", b"content").await;

        fs.rename("/old", "/new").await.unwrap();

        assert!(!fs.exists("/old").await);
        let data = fs.read_to_end("/new/file.txt").await.unwrap();
        assert_eq!(data, b"content");
    }

    #[tokio::test]
    async fn test_open_directory_gives_listing() {
        let fs = MemoryBackend::new();
        fs.mkdir("/dir", 0o755).await.unwrap();

        let handle = fs.open("/dir").await.unwrap();
        assert!(handle.is_directory_listing());

        let refusing = fs.clone().refusing_directory_open();
        let err = refusing.open("/dir").await.unwrap_err();
        assert!(matches!(err, VfsError::IsADirectory(_)));
    }

    #[tokio::test]
    async fn test_open_file_flags() {
        let fs = MemoryBackend::new();
        write_file(&fs, "/log.txt", b"one").await;

        let err = fs
            .open_file("/log.txt", OpenFlags::create_exclusive(), 0o644)
            .await
            .unwrap_err();
        assert!(matches!(err, VfsError::AlreadyExists(_)));

        let mut file = fs
            .open_file("/log.txt", OpenFlags::append(), 0)
            .await
            .unwrap();
        file.write_str("two").await.unwrap();
        assert_eq!(fs.read_to_end("/log.txt").await.unwrap(), b"onetwo");

        let err = fs.open("/missing.txt").await.unwrap_err();
        assert!(matches!(err, VfsError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_truncate_and_seek() {
        let fs = MemoryBackend::new();
        write_file(&fs, "/test.txt", b"hello world").await;

        let mut file = fs.open_file("/test.txt", OpenFlags::write(), 0).await.unwrap();
        file.truncate(5).await.unwrap();
        assert_eq!(file.seek(SeekFrom::End(0)).await.unwrap(), 5);
        file.write(b"!").await.unwrap();

        assert_eq!(fs.read_to_end("/test.txt").await.unwrap(), b"hello!");
    }

    #[tokio::test]
    async fn test_attribute_changes() {
        let fs = MemoryBackend::new();
        write_file(&fs, "/f", b"").await;

        fs.chmod("/f", 0o600).await.unwrap();
        fs.chown("/f", 1000, 100).await.unwrap();
        let when = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(1_000_000);
        fs.chtimes("/f", when, when).await.unwrap();

        let attr = fs.stat("/f").await.unwrap();
        assert_eq!(attr.perm, 0o600);
        assert_eq!(attr.uid, Some(1000));
        assert_eq!(attr.gid, Some(100));
        assert_eq!(attr.mtime, when);
    }

    #[tokio::test]
    async fn test_path_normalization() {
        let fs = MemoryBackend::new();
        fs.mkdir_all("/a/b", 0o755).await.unwrap();
        write_file(&fs, "/a/b/c.txt", b"x").await;

        // Various path forms should all work
        assert!(fs.exists("a/b/c.txt").await);
        assert!(fs.exists("./a/b/c.txt").await);
        assert!(fs.exists("a/./b/c.txt").await);
        assert!(fs.exists("a/b/../b/c.txt").await);
    }
}
