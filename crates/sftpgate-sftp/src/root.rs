//! Root path resolution.
//!
//! The root is the remote directory every client path is anchored under. It
//! comes from exactly one of three places, in priority order:
//!
//! 1. `basePath` as given, when a stat of it succeeds;
//! 2. `basePath` joined under the home directory, taken on trust;
//! 3. the home directory itself, when there is no `basePath`.

use async_trait::async_trait;
use sftpgate_vfs::{FileAttr, VfsResult};

use crate::error::ConnectError;

/// The remote queries root resolution needs.
#[async_trait]
pub trait RemoteDirs: Send + Sync {
    /// The server's notion of the session's current directory.
    async fn working_dir(&self) -> VfsResult<String>;

    /// Canonical absolute form of `path`.
    async fn canonicalize(&self, path: &str) -> VfsResult<String>;

    async fn stat(&self, path: &str) -> VfsResult<FileAttr>;
}

/// Ask the server for the home directory.
///
/// Tries the working-directory query first and falls back to canonicalizing
/// `.` when that fails.
pub async fn resolve_home(remote: &dyn RemoteDirs) -> Result<String, ConnectError> {
    match remote.working_dir().await {
        Ok(dir) if !dir.is_empty() => return Ok(dir),
        Ok(_) => tracing::debug!("server reported an empty working directory"),
        Err(e) => tracing::debug!(error = %e, "working directory query failed, canonicalizing ."),
    }
    remote
        .canonicalize(".")
        .await
        .map_err(|e| ConnectError::HomeDirectory(e.to_string()))
}

/// Pick the root for a session.
pub async fn resolve_root(
    remote: &dyn RemoteDirs,
    base_path: Option<&str>,
) -> Result<String, ConnectError> {
    let home = resolve_home(remote).await?;

    let Some(base) = base_path.filter(|b| !b.is_empty()) else {
        tracing::debug!(root = %home, "no base path, rooting at home directory");
        return Ok(home);
    };

    match remote.stat(base).await {
        Ok(_) => {
            tracing::debug!(root = %base, "base path exists");
            Ok(base.to_string())
        }
        Err(e) => {
            let root = join_under(&home, base);
            tracing::debug!(base = %base, root = %root, error = %e, "base path not found, using it relative to home");
            Ok(root)
        }
    }
}

/// `home` + `/` + `base` with the leading slashes of `base` dropped.
pub fn join_under(home: &str, base: &str) -> String {
    let home = home.trim_end_matches('/');
    let base = base.trim_start_matches('/');
    format!("{home}/{base}")
}
