//! VFS backends.
//!
//! Backends implement [`VfsOps`](crate::VfsOps) for different storage types.
//! The SFTP backend lives in its own crate because of its transport stack.

mod local;
mod memory;

pub use local::LocalBackend;
pub use memory::MemoryBackend;
