//! Raw SFTP backend.
//!
//! Maps each VFS operation onto one or a few protocol requests against the
//! live session, with paths passed through exactly as given. Errors from the
//! server come back unchanged inside [`VfsError::Backend`].

use std::io::SeekFrom;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use russh_sftp::client::error::Error as SftpError;
use russh_sftp::client::fs::File;
use russh_sftp::client::SftpSession;
use russh_sftp::protocol::{FileAttributes, OpenFlags as WireFlags, StatusCode};
use sftpgate_vfs::{
    DirEntry, DirLister, DirListing, FileAttr, FileHandle, OpenFlags, VfsError, VfsFile, VfsOps,
    VfsResult,
};
use tokio::io::{AsyncReadExt, AsyncSeekExt, AsyncWriteExt};

use crate::client::{epoch_secs, is_not_found, remote_error, to_attr, SftpClient};

/// VFS operations over an SFTP session, without any root anchoring.
#[derive(Clone)]
pub struct SftpBackend {
    client: Arc<SftpClient>,
}

impl SftpBackend {
    pub fn new(client: Arc<SftpClient>) -> Self {
        Self { client }
    }

    fn sftp(&self) -> &SftpSession {
        self.client.session()
    }

    async fn set_attrs(&self, path: &str, attrs: FileAttributes) -> VfsResult<()> {
        self.sftp()
            .set_metadata(path, attrs)
            .await
            .map_err(remote_error)
    }
}

fn wire_flags(flags: OpenFlags) -> WireFlags {
    let mut wire = WireFlags::empty();
    if flags.read {
        wire |= WireFlags::READ;
    }
    if flags.write || flags.append {
        wire |= WireFlags::WRITE;
    }
    if flags.append {
        wire |= WireFlags::APPEND;
    }
    if flags.create {
        wire |= WireFlags::CREATE;
    }
    if flags.truncate {
        wire |= WireFlags::TRUNCATE;
    }
    if flags.exclusive {
        wire |= WireFlags::EXCLUDE;
    }
    wire
}

/// Servers answer an unlink of a directory with a generic failure or a
/// permission error; only those are worth a second try as rmdir.
fn may_be_directory(err: &SftpError) -> bool {
    matches!(
        err,
        SftpError::Status(status)
            if matches!(status.status_code, StatusCode::Failure | StatusCode::PermissionDenied)
    )
}

fn child_path(dir: &str, name: &str) -> String {
    if dir.ends_with('/') {
        format!("{dir}{name}")
    } else {
        format!("{dir}/{name}")
    }
}

#[async_trait]
impl VfsOps for SftpBackend {
    fn name(&self) -> &str {
        "sftp-raw"
    }

    async fn create(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::create_truncate(), 0o666).await
    }

    async fn open(&self, path: &str) -> VfsResult<FileHandle> {
        self.open_file(path, OpenFlags::read(), 0).await
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> VfsResult<FileHandle> {
        let mut attrs = FileAttributes::empty();
        if flags.create && perm != 0 {
            attrs.permissions = Some(perm);
        }
        let file = self
            .sftp()
            .open_with_flags_and_attributes(path, wire_flags(flags), attrs)
            .await
            .map_err(remote_error)?;

        Ok(FileHandle::regular(SftpFile {
            name: path.to_string(),
            file,
            client: self.client.clone(),
            listing: None,
        }))
    }

    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()> {
        self.sftp().create_dir(path).await.map_err(remote_error)?;
        self.chmod(path, perm).await
    }

    async fn mkdir_all(&self, path: &str, perm: u32) -> VfsResult<()> {
        match self.stat(path).await {
            Ok(attr) if attr.is_dir() => return Ok(()),
            Ok(_) => return Err(VfsError::not_a_directory(path)),
            Err(_) => {}
        }

        let mut current = String::new();
        for component in path.split('/') {
            if component.is_empty() {
                if current.is_empty() {
                    current.push('/');
                }
                continue;
            }
            if current.is_empty() || current == "/" {
                current = format!("{current}{component}");
            } else {
                current = format!("{current}/{component}");
            }

            match self.stat(&current).await {
                Ok(attr) if attr.is_dir() => continue,
                Ok(_) => return Err(VfsError::not_a_directory(current)),
                Err(_) => {}
            }
            if let Err(e) = self.mkdir(&current, perm).await {
                // Lost a race with another creator; fine as long as it is a directory now.
                match self.stat(&current).await {
                    Ok(attr) if attr.is_dir() => {}
                    _ => return Err(e),
                }
            }
        }
        Ok(())
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        match self.sftp().remove_file(path).await {
            Ok(()) => Ok(()),
            Err(err) if may_be_directory(&err) => {
                self.sftp().remove_dir(path).await.map_err(remote_error)
            }
            Err(err) => Err(remote_error(err)),
        }
    }

    async fn remove_all(&self, path: &str) -> VfsResult<()> {
        // lstat: a link to a directory is removed as a link, never walked.
        let top = match self.sftp().symlink_metadata(path).await {
            Ok(meta) => to_attr(&meta),
            Err(e) => {
                let e = remote_error(e);
                return if is_not_found(&e) { Ok(()) } else { Err(e) };
            }
        };
        if !top.is_dir() {
            return self.sftp().remove_file(path).await.map_err(remote_error);
        }

        // Depth-first; a directory is revisited for removal once its children are gone.
        let mut stack = vec![(path.to_string(), false)];
        while let Some((dir, emptied)) = stack.pop() {
            if emptied {
                self.sftp().remove_dir(&dir).await.map_err(remote_error)?;
                continue;
            }
            stack.push((dir.clone(), true));
            for entry in self.client.list(&dir).await? {
                let child = child_path(&dir, &entry.name);
                if entry.attr.is_dir() {
                    stack.push((child, false));
                } else {
                    self.sftp().remove_file(&child).await.map_err(remote_error)?;
                }
            }
        }
        Ok(())
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.sftp().rename(from, to).await.map_err(remote_error)
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        let meta = self.sftp().metadata(path).await.map_err(remote_error)?;
        Ok(to_attr(&meta))
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        let attrs = FileAttributes {
            permissions: Some(mode & 0o7777),
            ..FileAttributes::empty()
        };
        self.set_attrs(path, attrs).await
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        let attrs = FileAttributes {
            uid: Some(uid),
            gid: Some(gid),
            ..FileAttributes::empty()
        };
        self.set_attrs(path, attrs).await
    }

    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        let attrs = FileAttributes {
            atime: Some(epoch_secs(atime)),
            mtime: Some(epoch_secs(mtime)),
            ..FileAttributes::empty()
        };
        self.set_attrs(path, attrs).await
    }
}

/// Open remote file.
///
/// Servers that do open directories through the generic request hand back
/// a regular handle; `readdir` on it lists through a [`DirListing`] over the
/// same path.
pub struct SftpFile {
    name: String,
    file: File,
    client: Arc<SftpClient>,
    listing: Option<DirListing>,
}

#[async_trait]
impl VfsFile for SftpFile {
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
        self.file.flush().await?;
        let attrs = FileAttributes {
            size: Some(size),
            ..FileAttributes::empty()
        };
        self.client
            .session()
            .set_metadata(self.name.as_str(), attrs)
            .await
            .map_err(remote_error)
    }

    async fn sync(&mut self) -> VfsResult<()> {
        self.file.flush().await.map_err(VfsError::from)
    }

    async fn close(&mut self) -> VfsResult<()> {
        self.file.shutdown().await.map_err(VfsError::from)
    }

    async fn stat(&mut self) -> VfsResult<FileAttr> {
        self.file.flush().await?;
        self.client.stat(&self.name).await
    }

    async fn readdir(&mut self, count: isize) -> VfsResult<Vec<DirEntry>> {
        let listing = self.listing.get_or_insert_with(|| {
            let lister: Arc<dyn DirLister> = self.client.clone();
            DirListing::new(lister, self.name.clone())
        });
        listing.readdir(count).await
    }
}
