//! SFTP session constants.
//!
//! Centralizes hardcoded values for easier configuration and documentation.

use std::time::Duration;

/// Port used when an access descriptor's hostname carries none.
pub const DEFAULT_SFTP_PORT: u16 = 22;

/// SSH inactivity timeout.
pub const SSH_INACTIVITY_TIMEOUT: Duration = Duration::from_secs(300);

/// SSH keep-alive interval.
pub const SSH_KEEPALIVE_INTERVAL: Duration = Duration::from_secs(30);

/// SSH keep-alive max retries.
pub const SSH_KEEPALIVE_MAX: usize = 3;

/// Name of the SSH subsystem carrying the file-transfer protocol.
pub const SFTP_SUBSYSTEM: &str = "sftp";
