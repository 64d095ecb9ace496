//! Turns an access into a filesystem.

use std::path::PathBuf;
use std::sync::Arc;

use sftpgate_sftp::{AccessDescriptor, ConnectError};
use sftpgate_vfs::{LocalBackend, MemoryBackend, VfsOps};

use crate::config::{AccessConfig, FsKind};

#[derive(Debug, thiserror::Error)]
pub enum LoadError {
    #[error(transparent)]
    Connect(#[from] ConnectError),

    #[error("access {user:?}: {fs:?} filesystem needs the {param:?} parameter")]
    MissingParam {
        user: String,
        fs: FsKind,
        param: &'static str,
    },

    #[error("access {user:?}: base path {path} is not a directory")]
    NotADirectory { user: String, path: PathBuf },
}

/// Build the filesystem an access describes.
///
/// `sftp` dials and authenticates here; `os` and `memory` are local and
/// cannot fail past parameter checks.
pub async fn load_fs(access: &AccessConfig) -> Result<Arc<dyn VfsOps>, LoadError> {
    match access.fs {
        FsKind::Sftp => {
            let desc = AccessDescriptor::from_params(&access.params);
            tracing::debug!(user = %access.user, ?desc, "connecting sftp access");
            let fs = sftpgate_sftp::connect(&desc).await?;
            tracing::info!(user = %access.user, root = fs.root(), "sftp access rooted");
            Ok(Arc::new(fs))
        }
        FsKind::Os => {
            let base = access
                .param("basePath")
                .ok_or_else(|| LoadError::MissingParam {
                    user: access.user.clone(),
                    fs: access.fs,
                    param: "basePath",
                })?;
            let path = PathBuf::from(base);
            if !path.is_dir() {
                return Err(LoadError::NotADirectory {
                    user: access.user.clone(),
                    path,
                });
            }
            tracing::debug!(user = %access.user, path = %path.display(), "local access");
            Ok(Arc::new(LocalBackend::new(path)))
        }
        FsKind::Memory => Ok(Arc::new(MemoryBackend::new())),
    }
}
