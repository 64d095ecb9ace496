//! # sftpgate-vfs
//!
//! Path-based filesystem abstraction shared by every sftpgate storage backend.
//! Key components:
//!
//! - [`VfsOps`] - The capability set a protocol engine drives
//! - [`FileHandle`] - Regular file or listing-only directory, one method set
//! - [`DirListing`] - Cursor over a directory listing fetched in one round trip
//! - [`LocalBackend`] - Local filesystem access (with path security)
//! - [`MemoryBackend`] - In-memory filesystem (for testing)
//!
//! ## Design Decisions
//!
//! - **Paths are strings**: backends may be remote, so paths are `/`-separated
//!   strings rather than host `Path`s.
//! - **Directory handles are a variant, not a stub**: byte-level operations on
//!   [`FileHandle::Directory`] fail with [`VfsError::Unsupported`] in one place.

pub mod backends;
mod error;
mod file;
mod listing;
mod ops;
mod types;

pub use backends::{LocalBackend, MemoryBackend};
pub use error::{VfsError, VfsResult};
pub use file::{FileHandle, VfsFile};
pub use listing::{DirListing, DirLister};
pub use ops::VfsOps;
pub use types::{DirEntry, FileAttr, FileType, OpenFlags};
