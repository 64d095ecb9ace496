//! Root-anchored filesystem.
//!
//! [`RootPathFs`] turns client paths (absolute, `/`-separated, rooted at the
//! user's own `/`) into remote paths under the resolved root, then hands the
//! call to the wrapped filesystem as-is. Results and errors come back
//! untouched.

use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use sftpgate_vfs::{
    DirLister, DirListing, FileAttr, FileHandle, OpenFlags, VfsOps, VfsResult,
};

/// Map a client path onto the remote tree rooted at `root`.
///
/// `/` and the empty path name the root itself. Everything else has one
/// leading slash dropped and is joined under the root. A root of `/` is
/// expressed relative to the session directory (`.` and `./…`).
pub fn translate_path(root: &str, path: &str) -> String {
    if path == "/" || path.is_empty() {
        if root == "/" {
            ".".to_string()
        } else {
            root.to_string()
        }
    } else {
        let relative = path.strip_prefix('/').unwrap_or(path);
        if root == "/" {
            format!("./{relative}")
        } else {
            format!("{root}/{relative}")
        }
    }
}

/// Filesystem view anchored at a remote root directory.
pub struct RootPathFs {
    source: Arc<dyn VfsOps>,
    root: String,
    lister: Option<Arc<dyn DirLister>>,
}

impl std::fmt::Debug for RootPathFs {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RootPathFs")
            .field("source", &self.source.name())
            .field("root", &self.root)
            .field("directory_fallback", &self.lister.is_some())
            .finish()
    }
}

impl RootPathFs {
    /// Wrap `source` under `root`.
    ///
    /// With a `lister`, a failed [`open`](VfsOps::open) is answered with a
    /// listing-only directory handle instead of the error. Some servers refuse
    /// to open directories through the generic open request but will list
    /// them. The catch is that a real not-found or permission error is then
    /// only reported by the first listing or stat on that handle.
    pub fn new(
        source: Arc<dyn VfsOps>,
        root: impl Into<String>,
        lister: Option<Arc<dyn DirLister>>,
    ) -> Self {
        Self {
            source,
            root: root.into(),
            lister,
        }
    }

    /// The resolved remote root.
    pub fn root(&self) -> &str {
        &self.root
    }

    pub fn translate(&self, path: &str) -> String {
        translate_path(&self.root, path)
    }
}

#[async_trait]
impl VfsOps for RootPathFs {
    fn name(&self) -> &str {
        "sftp"
    }

    async fn create(&self, path: &str) -> VfsResult<FileHandle> {
        self.source.create(&self.translate(path)).await
    }

    async fn open(&self, path: &str) -> VfsResult<FileHandle> {
        let remote = self.translate(path);
        match self.source.open(&remote).await {
            Ok(handle) => Ok(handle),
            Err(err) => match &self.lister {
                Some(lister) => {
                    tracing::debug!(path = %remote, error = %err, "open failed, treating as directory");
                    Ok(FileHandle::Directory(DirListing::new(lister.clone(), remote)))
                }
                None => Err(err),
            },
        }
    }

    async fn open_file(&self, path: &str, flags: OpenFlags, perm: u32) -> VfsResult<FileHandle> {
        self.source
            .open_file(&self.translate(path), flags, perm)
            .await
    }

    async fn mkdir(&self, path: &str, perm: u32) -> VfsResult<()> {
        self.source.mkdir(&self.translate(path), perm).await
    }

    async fn mkdir_all(&self, path: &str, perm: u32) -> VfsResult<()> {
        self.source.mkdir_all(&self.translate(path), perm).await
    }

    async fn remove(&self, path: &str) -> VfsResult<()> {
        self.source.remove(&self.translate(path)).await
    }

    async fn remove_all(&self, path: &str) -> VfsResult<()> {
        self.source.remove_all(&self.translate(path)).await
    }

    async fn rename(&self, from: &str, to: &str) -> VfsResult<()> {
        self.source
            .rename(&self.translate(from), &self.translate(to))
            .await
    }

    async fn stat(&self, path: &str) -> VfsResult<FileAttr> {
        self.source.stat(&self.translate(path)).await
    }

    async fn chmod(&self, path: &str, mode: u32) -> VfsResult<()> {
        self.source.chmod(&self.translate(path), mode).await
    }

    async fn chown(&self, path: &str, uid: u32, gid: u32) -> VfsResult<()> {
        self.source.chown(&self.translate(path), uid, gid).await
    }

    async fn chtimes(&self, path: &str, atime: SystemTime, mtime: SystemTime) -> VfsResult<()> {
        self.source
            .chtimes(&self.translate(path), atime, mtime)
            .await
    }
}
