//! A loaded access and the operations the CLI runs against it.

use std::sync::Arc;

use sftpgate_vfs::{DirEntry, FileAttr, FileType, VfsOps, VfsResult};

use crate::config::AccessConfig;
use crate::loader::{load_fs, LoadError};

/// One user's filesystem, held for the lifetime of a command.
pub struct Gateway {
    user: String,
    fs: Arc<dyn VfsOps>,
}

impl Gateway {
    pub fn new(user: impl Into<String>, fs: Arc<dyn VfsOps>) -> Self {
        Self {
            user: user.into(),
            fs,
        }
    }

    /// Load the filesystem behind `access`.
    pub async fn open(access: &AccessConfig) -> Result<Self, LoadError> {
        let fs = load_fs(access).await?;
        tracing::info!(user = %access.user, backend = fs.name(), "access loaded");
        Ok(Self::new(access.user.clone(), fs))
    }

    pub fn fs(&self) -> &dyn VfsOps {
        self.fs.as_ref()
    }

    /// One-line health summary: backend name and what `/` looks like.
    pub async fn check(&self) -> VfsResult<String> {
        let root = self.fs.stat("/").await?;
        let entries = self.fs.read_dir("/").await?;
        Ok(format!(
            "{}: {} backend, / is {} with {} entries",
            self.user,
            self.fs.name(),
            mode_string(&root),
            entries.len()
        ))
    }

    /// Directory entries in the order the backend returns them.
    pub async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        self.fs.read_dir(path).await
    }

    pub async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.fs.stat(path).await
    }

    pub async fn read(&self, path: &str) -> VfsResult<Vec<u8>> {
        self.fs.read_to_end(path).await
    }

    pub async fn mkdir(&self, path: &str, parents: bool) -> VfsResult<()> {
        if parents {
            self.fs.mkdir_all(path, 0o755).await
        } else {
            self.fs.mkdir(path, 0o755).await
        }
    }

    pub async fn remove(&self, path: &str, recursive: bool) -> VfsResult<()> {
        if recursive {
            self.fs.remove_all(path).await
        } else {
            self.fs.remove(path).await
        }
    }

    pub async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.fs.rename(from, to).await
    }

    pub async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.fs.chmod(path, mode).await
    }
}

/// `ls -l` style type and permission column, e.g. `drwxr-xr-x`.
pub fn mode_string(attr: &FileAttr) -> String {
    let kind = match attr.kind {
        FileType::Directory => 'd',
        FileType::Symlink => 'l',
        FileType::File => '-',
    };
    let mut out = String::with_capacity(10);
    out.push(kind);
    for shift in [6, 3, 0] {
        let bits = (attr.perm >> shift) & 0o7;
        out.push(if bits & 0o4 != 0 { 'r' } else { '-' });
        out.push(if bits & 0o2 != 0 { 'w' } else { '-' });
        out.push(if bits & 0o1 != 0 { 'x' } else { '-' });
    }
    out
}

/// A listing line: mode, size, name.
pub fn format_entry(entry: &DirEntry) -> String {
    format!("{} {:>10} {}", mode_string(&entry.attr), entry.attr.size, entry.name)
}

/// Parse an octal permission string such as `755` or `0640`.
pub fn parse_mode(raw: &str) -> Result<u32, String> {
    let digits = raw.trim_start_matches("0o");
    match u32::from_str_radix(digits, 8) {
        Ok(mode) if mode <= 0o7777 => Ok(mode),
        Ok(_) => Err(format!("mode {raw} out of range")),
        Err(e) => Err(format!("invalid octal mode {raw}: {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sftpgate_vfs::{MemoryBackend, VfsError};

    async fn gateway() -> Gateway {
        let fs = MemoryBackend::new();
        fs.mkdir("/pub", 0o755).await.unwrap();
        let mut f = fs.create("/pub/readme.txt").await.unwrap();
        f.write_str("hello").await.unwrap();
        f.close().await.unwrap();
        Gateway::new("test", Arc::new(fs))
    }

    #[tokio::test]
    async fn test_check_summary() {
        let gw = gateway().await;
        let summary = gw.check().await.unwrap();
        assert!(summary.starts_with("test: memory backend"), "{summary}");
        assert!(summary.ends_with("1 entries"), "{summary}");
    }

    #[tokio::test]
    async fn test_list_read_and_stat() {
        let gw = gateway().await;
        let names: Vec<_> = gw
            .list("/pub")
            .await
            .unwrap()
            .into_iter()
            .map(|e| e.name)
            .collect();
        assert_eq!(names, vec!["readme.txt"]);
        assert_eq!(gw.read("/pub/readme.txt").await.unwrap(), b"hello");
        assert_eq!(gw.stat("/pub/readme.txt").await.unwrap().size, 5);
    }

    #[tokio::test]
    async fn test_mkdir_rename_remove() {
        let gw = gateway().await;

        assert!(gw.mkdir("/a/b", false).await.is_err());
        gw.mkdir("/a/b", true).await.unwrap();
        gw.rename("/pub/readme.txt", "/a/b/readme.txt").await.unwrap();
        gw.chmod("/a/b/readme.txt", 0o600).await.unwrap();
        assert_eq!(gw.stat("/a/b/readme.txt").await.unwrap().perm, 0o600);

        let err = gw.remove("/a", false).await.unwrap_err();
        assert!(matches!(err, VfsError::DirectoryNotEmpty(_)));
        gw.remove("/a", true).await.unwrap();
        assert!(!gw.fs().exists("/a").await);
    }

    #[test]
    fn test_mode_string() {
        assert_eq!(mode_string(&FileAttr::directory(0o755)), "drwxr-xr-x");
        assert_eq!(mode_string(&FileAttr::file(0, 0o640)), "-rw-r-----");
    }

    #[test]
    fn test_parse_mode() {
        assert_eq!(parse_mode("755"), Ok(0o755));
        assert_eq!(parse_mode("0640"), Ok(0o640));
        assert_eq!(parse_mode("0o600"), Ok(0o600));
        assert!(parse_mode("9").is_err());
        assert!(parse_mode("77777").is_err());
    }

    #[test]
    fn test_format_entry() {
        let entry = DirEntry::new("notes.txt", FileAttr::file(42, 0o644));
        assert_eq!(format_entry(&entry), "-rw-r--r--         42 notes.txt");
    }
}
