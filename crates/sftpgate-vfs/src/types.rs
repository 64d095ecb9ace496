//! Metadata and open-mode types shared by every backend.
//!
//! SFTP, local and memory backends all describe entries with the same
//! [`FileAttr`], so callers never branch on where a path lives.

use serde::{Deserialize, Serialize};
use std::time::SystemTime;

/// What kind of node a path names.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FileType {
    File,
    Directory,
    Symlink,
}

impl FileType {
    pub fn is_file(&self) -> bool {
        *self == FileType::File
    }

    pub fn is_dir(&self) -> bool {
        *self == FileType::Directory
    }

    pub fn is_symlink(&self) -> bool {
        *self == FileType::Symlink
    }
}

/// Attributes as a backend reports them.
///
/// `perm` carries only the low twelve mode bits; the node kind lives in
/// `kind`. Fields the remote side may omit are optional.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileAttr {
    pub size: u64,
    pub kind: FileType,
    pub perm: u32,
    pub mtime: SystemTime,
    pub atime: Option<SystemTime>,
    pub uid: Option<u32>,
    pub gid: Option<u32>,
}

impl FileAttr {
    fn fresh(kind: FileType, size: u64, perm: u32) -> Self {
        let now = SystemTime::now();
        Self {
            size,
            kind,
            perm,
            mtime: now,
            atime: Some(now),
            uid: None,
            gid: None,
        }
    }

    /// Attributes for a regular file created just now.
    pub fn file(size: u64, perm: u32) -> Self {
        Self::fresh(FileType::File, size, perm)
    }

    /// Attributes for an empty directory created just now.
    pub fn directory(perm: u32) -> Self {
        Self::fresh(FileType::Directory, 0, perm)
    }

    pub fn is_file(&self) -> bool {
        self.kind.is_file()
    }

    pub fn is_dir(&self) -> bool {
        self.kind.is_dir()
    }

    pub fn is_symlink(&self) -> bool {
        self.kind.is_symlink()
    }
}

/// One listing row: the bare entry name and what the listing said about it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DirEntry {
    pub name: String,
    pub attr: FileAttr,
}

impl DirEntry {
    pub fn new(name: impl Into<String>, attr: FileAttr) -> Self {
        Self {
            name: name.into(),
            attr,
        }
    }

    pub fn kind(&self) -> FileType {
        self.attr.kind
    }
}

/// How [`open_file`](crate::VfsOps::open_file) should open a path.
///
/// Backends translate these into their own mode bits (`O_*` locally,
/// `SSH_FXF_*` over SFTP). The default is read-only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpenFlags {
    pub read: bool,
    pub write: bool,
    /// Every write lands at the current end of file.
    pub append: bool,
    pub create: bool,
    pub truncate: bool,
    /// With `create`: fail when the path already exists.
    pub exclusive: bool,
}

impl Default for OpenFlags {
    fn default() -> Self {
        Self::read()
    }
}

impl OpenFlags {
    pub const fn read() -> Self {
        Self {
            read: true,
            write: false,
            append: false,
            create: false,
            truncate: false,
            exclusive: false,
        }
    }

    /// Read-write on an existing file.
    pub const fn write() -> Self {
        Self {
            write: true,
            ..Self::read()
        }
    }

    /// Write-only, appending to an existing file.
    pub const fn append() -> Self {
        Self {
            read: false,
            write: true,
            append: true,
            ..Self::read()
        }
    }

    /// Read-write, creating the file and failing if it is already there.
    pub const fn create_exclusive() -> Self {
        Self {
            create: true,
            exclusive: true,
            ..Self::write()
        }
    }

    /// Read-write, creating the file or emptying an existing one. `create`
    /// on every backend opens with these.
    pub const fn create_truncate() -> Self {
        Self {
            create: true,
            truncate: true,
            ..Self::write()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kind_predicates() {
        let dir = FileAttr::directory(0o750);
        assert!(dir.is_dir() && !dir.is_file() && !dir.is_symlink());
        assert_eq!(dir.size, 0);
        assert_eq!(dir.perm, 0o750);

        let file = FileAttr::file(12, 0o600);
        assert!(file.is_file());
        assert_eq!(file.size, 12);
        assert!(FileType::Symlink.is_symlink());
    }

    #[test]
    fn test_dir_entry_kind_follows_attr() {
        let entry = DirEntry::new("notes", FileAttr::directory(0o755));
        assert_eq!(entry.name, "notes");
        assert_eq!(entry.kind(), FileType::Directory);
    }

    #[test]
    fn test_open_flag_presets() {
        assert_eq!(OpenFlags::default(), OpenFlags::read());
        assert!(!OpenFlags::read().write);

        let rw = OpenFlags::write();
        assert!(rw.read && rw.write && !rw.create);

        let excl = OpenFlags::create_exclusive();
        assert!(excl.read && excl.write && excl.create && excl.exclusive);
        assert!(!excl.truncate);

        let trunc = OpenFlags::create_truncate();
        assert!(trunc.create && trunc.truncate && !trunc.exclusive);

        let append = OpenFlags::append();
        assert!(append.append && append.write && !append.read);
    }
}
