//! Connection errors.
//!
//! Every failure on the way from an access descriptor to a usable filesystem
//! surfaces as a [`ConnectError`]. All messages share one prefix so callers
//! can tell bootstrap failures apart from later filesystem errors.

use std::path::PathBuf;

#[derive(Debug, Clone, thiserror::Error)]
pub enum ConnectError {
    #[error("could not connect to SFTP host: no hostname configured")]
    MissingHostname,

    #[error("could not connect to SFTP host: reading host key {path}: {reason}")]
    ReadHostKey { path: PathBuf, reason: String },

    #[error("could not connect to SFTP host: parsing host key {path}: {reason}")]
    ParseHostKey { path: PathBuf, reason: String },

    #[error("could not connect to SFTP host: reading private key {path}: {reason}")]
    ReadPrivateKey { path: PathBuf, reason: String },

    #[error("could not connect to SFTP host: parsing private key {path}: {reason}")]
    ParsePrivateKey { path: PathBuf, reason: String },

    #[error("could not connect to SFTP host: unsupported auth method {0:?}")]
    UnsupportedAuthMethod(String),

    #[error("could not connect to SFTP host: {addr}: {reason}")]
    Handshake { addr: String, reason: String },

    #[error("could not connect to SFTP host: {addr}: authentication rejected for {user}")]
    AuthRejected { addr: String, user: String },

    #[error("could not connect to SFTP host: opening session channel: {0}")]
    Channel(String),

    #[error("could not connect to SFTP host: starting sftp subsystem: {0}")]
    Subsystem(String),

    #[error("could not connect to SFTP host: determining home directory: {0}")]
    HomeDirectory(String),
}

impl ConnectError {
    pub(crate) fn handshake(addr: &str, err: impl std::fmt::Display) -> Self {
        ConnectError::Handshake {
            addr: addr.to_string(),
            reason: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_messages_share_prefix() {
        let errors = [
            ConnectError::MissingHostname,
            ConnectError::UnsupportedAuthMethod("kerberos".into()),
            ConnectError::handshake("example.com:22", "connection refused"),
            ConnectError::HomeDirectory("permission denied".into()),
            ConnectError::ParsePrivateKey {
                path: PathBuf::from("/keys/id"),
                reason: "bad base64".into(),
            },
        ];
        for err in errors {
            assert!(
                err.to_string().starts_with("could not connect to SFTP host"),
                "{err}"
            );
        }
    }

    #[test]
    fn test_message_carries_context() {
        let err = ConnectError::AuthRejected {
            addr: "10.0.0.5:22".into(),
            user: "alice".into(),
        };
        let msg = err.to_string();
        assert!(msg.contains("10.0.0.5:22"));
        assert!(msg.contains("alice"));
    }
}
