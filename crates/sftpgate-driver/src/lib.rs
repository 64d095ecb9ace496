//! sftpgate driver: everything around the filesystem core.
//!
//! - [`config`]: the JSON configuration file and its accesses
//! - [`loader`]: access to `Arc<dyn VfsOps>`
//! - [`gateway`]: one loaded filesystem plus the operations the CLI runs
//! - [`logging`]: tracing subscriber setup

pub mod config;
pub mod gateway;
pub mod loader;
pub mod logging;

pub use config::{AccessConfig, Config, ConfigError, FsKind, LoggingConfig};
pub use gateway::Gateway;
pub use loader::{load_fs, LoadError};
