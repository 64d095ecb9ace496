//! SFTP-backed filesystem for sftpgate.
//!
//! [`connect`] turns an [`AccessDescriptor`] into a [`RootPathFs`]: a
//! [`VfsOps`](sftpgate_vfs::VfsOps) implementation whose `/` is the resolved
//! root directory on the remote server.
//!
//! # Layers
//!
//! - [`SftpClient`]: the live SSH connection and SFTP session.
//! - [`SftpBackend`]: VFS operations mapped one-to-one onto SFTP requests.
//! - [`RootPathFs`]: path translation in front of any backend, plus the
//!   directory-open fallback for servers that cannot open directories.

pub mod constants;

mod backend;
mod client;
mod connect;
mod descriptor;
mod error;
mod pathfs;
mod root;

pub use backend::{SftpBackend, SftpFile};
pub use client::{is_not_found, SftpClient};
pub use connect::{connect, load_credentials, load_host_key, Credentials, HostKeyPolicy};
pub use descriptor::{AccessDescriptor, AuthMethod};
pub use error::ConnectError;
pub use pathfs::{translate_path, RootPathFs};
pub use root::{join_under, resolve_home, resolve_root, RemoteDirs};
