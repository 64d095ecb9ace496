//! Live SFTP session shared by every handle of one filesystem.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use russh::client::Handle;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, StatusCode};
use sftpgate_vfs::{DirEntry, DirLister, FileAttr, FileType, VfsError, VfsResult};

use crate::connect::ClientHandler;
use crate::root::RemoteDirs;

/// An SFTP session plus the SSH connection carrying it.
///
/// The SSH handle is held only to keep the transport alive for as long as
/// any filesystem handle exists; the connection closes when the last `Arc`
/// goes away.
pub struct SftpClient {
    sftp: SftpSession,
    _ssh: Handle<ClientHandler>,
}

impl SftpClient {
    pub(crate) fn new(sftp: SftpSession, ssh: Handle<ClientHandler>) -> Self {
        Self { sftp, _ssh: ssh }
    }

    pub fn session(&self) -> &SftpSession {
        &self.sftp
    }
}

/// Wrap a protocol error without changing it.
pub(crate) fn remote_error(err: SftpError) -> VfsError {
    VfsError::backend(err)
}

/// True when `err` is the server saying the path does not exist.
pub fn is_not_found(err: &VfsError) -> bool {
    match err {
        VfsError::NotFound(_) => true,
        VfsError::Backend(inner) => matches!(
            inner.downcast_ref::<SftpError>(),
            Some(SftpError::Status(s)) if s.status_code == StatusCode::NoSuchFile
        ),
        _ => false,
    }
}

fn epoch(secs: u32) -> SystemTime {
    UNIX_EPOCH + Duration::from_secs(u64::from(secs))
}

pub(crate) fn epoch_secs(t: SystemTime) -> u32 {
    t.duration_since(UNIX_EPOCH)
        .map(|d| u32::try_from(d.as_secs()).unwrap_or(u32::MAX))
        .unwrap_or(0)
}

/// Convert wire attributes to VFS attributes.
pub(crate) fn to_attr(meta: &FileAttributes) -> FileAttr {
    let file_type = meta.file_type();
    let kind = if file_type.is_dir() {
        FileType::Directory
    } else if file_type.is_symlink() {
        FileType::Symlink
    } else {
        FileType::File
    };

    FileAttr {
        size: meta.size.unwrap_or(0),
        kind,
        perm: meta.permissions.unwrap_or(0) & 0o7777,
        mtime: meta.mtime.map(epoch).unwrap_or(UNIX_EPOCH),
        atime: meta.atime.map(epoch),
        uid: meta.uid,
        gid: meta.gid,
    }
}

#[async_trait]
impl DirLister for SftpClient {
    async fn list(&self, path: &str) -> VfsResult<Vec<DirEntry>> {
        let entries = self.sftp.read_dir(path).await.map_err(remote_error)?;
        Ok(entries
            .filter(|e| {
                let name = e.file_name();
                name != "." && name != ".."
            })
            .map(|e| DirEntry::new(e.file_name(), to_attr(&e.metadata())))
            .collect())
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let meta = self.sftp.metadata(path).await.map_err(remote_error)?;
        Ok(to_attr(&meta))
    }
}

#[async_trait]
impl RemoteDirs for SftpClient {
    // The protocol has no dedicated getcwd; the empty path resolves to it.
    async fn working_dir(&self) -> VfsResult<String> {
        self.sftp.canonicalize("").await.map_err(remote_error)
    }

    async fn canonicalize(&self, path: &str) -> VfsResult<String> {
        self.sftp.canonicalize(path).await.map_err(remote_error)
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        DirLister::stat(self, path).await
    }
}
