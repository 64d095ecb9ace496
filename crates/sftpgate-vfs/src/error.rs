//! Errors surfaced by filesystem operations.
//!
//! Local and memory backends describe failures with the path-carrying
//! variants. Remote backends hand their own protocol error through
//! [`VfsError::Backend`] so callers see exactly what the server said.

use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum VfsError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("permission denied: {0}")]
    PermissionDenied(String),

    #[error("not a directory: {0}")]
    NotADirectory(String),

    #[error("is a directory: {0}")]
    IsADirectory(String),

    #[error("directory not empty: {0}")]
    DirectoryNotEmpty(String),

    /// A path resolved outside the backend's root.
    #[error("path escapes root: {0}")]
    PathEscapesRoot(String),

    #[error("invalid path: {0}")]
    InvalidPath(String),

    /// Byte-level operation attempted on a listing-only directory handle.
    #[error("{op} not supported on a directory: {path}")]
    Unsupported { op: &'static str, path: String },

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// The backend's transport error, unchanged. `downcast_ref` the box to
    /// inspect it.
    #[error(transparent)]
    Backend(Box<dyn std::error::Error + Send + Sync + 'static>),

    #[error("{0}")]
    Other(String),
}

impl VfsError {
    pub fn not_found(path: impl Into<String>) -> Self {
        Self::NotFound(path.into())
    }

    pub fn already_exists(path: impl Into<String>) -> Self {
        Self::AlreadyExists(path.into())
    }

    pub fn permission_denied(path: impl Into<String>) -> Self {
        Self::PermissionDenied(path.into())
    }

    pub fn not_a_directory(path: impl Into<String>) -> Self {
        Self::NotADirectory(path.into())
    }

    pub fn is_a_directory(path: impl Into<String>) -> Self {
        Self::IsADirectory(path.into())
    }

    pub fn directory_not_empty(path: impl Into<String>) -> Self {
        Self::DirectoryNotEmpty(path.into())
    }

    pub fn path_escapes_root(path: impl Into<String>) -> Self {
        Self::PathEscapesRoot(path.into())
    }

    pub fn invalid_path(path: impl Into<String>) -> Self {
        Self::InvalidPath(path.into())
    }

    pub fn unsupported(op: &'static str, path: impl Into<String>) -> Self {
        Self::Unsupported {
            op,
            path: path.into(),
        }
    }

    pub fn backend(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Backend(Box::new(err))
    }

    pub fn other(msg: impl Into<String>) -> Self {
        Self::Other(msg.into())
    }

    pub fn is_unsupported(&self) -> bool {
        matches!(self, Self::Unsupported { .. })
    }

    /// Closest `std::io` classification. Escapes count as permission
    /// failures; backend errors are opaque.
    pub fn io_kind(&self) -> io::ErrorKind {
        use io::ErrorKind as K;
        match self {
            Self::NotFound(_) => K::NotFound,
            Self::AlreadyExists(_) => K::AlreadyExists,
            Self::PermissionDenied(_) | Self::PathEscapesRoot(_) => K::PermissionDenied,
            Self::NotADirectory(_) => K::NotADirectory,
            Self::IsADirectory(_) => K::IsADirectory,
            Self::DirectoryNotEmpty(_) => K::DirectoryNotEmpty,
            Self::InvalidPath(_) => K::InvalidInput,
            Self::Unsupported { .. } => K::Unsupported,
            Self::Io(e) => e.kind(),
            Self::Backend(_) | Self::Other(_) => K::Other,
        }
    }
}

impl From<VfsError> for io::Error {
    fn from(e: VfsError) -> Self {
        match e {
            VfsError::Io(inner) => inner,
            VfsError::Backend(inner) => io::Error::other(inner),
            other => io::Error::new(other.io_kind(), other.to_string()),
        }
    }
}

pub type VfsResult<T> = Result<T, VfsError>;
