//! Access descriptors: the per-user connection parameters.

use std::collections::HashMap;
use std::fmt;
use std::net::{IpAddr, SocketAddr};
use std::path::PathBuf;

use crate::constants::DEFAULT_SFTP_PORT;
use crate::error::ConnectError;

/// How the client proves its identity to the server.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMethod {
    Password,
    PublicKey,
}

impl AuthMethod {
    /// Parse a method name, case-insensitively. Empty means password.
    pub fn parse(raw: &str) -> Result<Self, ConnectError> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "" | "password" => Ok(AuthMethod::Password),
            "publickey" => Ok(AuthMethod::PublicKey),
            _ => Err(ConnectError::UnsupportedAuthMethod(raw.to_string())),
        }
    }
}

/// Connection parameters for one gateway user.
///
/// Built from the string map carried in the configuration file. Absent and
/// empty values are the same thing here.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct AccessDescriptor {
    pub hostname: String,
    pub username: String,
    pub auth_method: Option<String>,
    pub password: Option<String>,
    pub private_key: Option<PathBuf>,
    pub private_key_passphrase: Option<String>,
    pub host_key: Option<PathBuf>,
    pub base_path: Option<String>,
}

// Secrets stay out of logs.
impl fmt::Debug for AccessDescriptor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccessDescriptor")
            .field("hostname", &self.hostname)
            .field("username", &self.username)
            .field("auth_method", &self.auth_method)
            .field("password", &self.password.as_ref().map(|_| "<redacted>"))
            .field("private_key", &self.private_key)
            .field(
                "private_key_passphrase",
                &self.private_key_passphrase.as_ref().map(|_| "<redacted>"),
            )
            .field("host_key", &self.host_key)
            .field("base_path", &self.base_path)
            .finish()
    }
}

impl AccessDescriptor {
    /// Read the descriptor keys out of a parameter map.
    ///
    /// The method key is `method`, with `authMethod` accepted as an alias.
    /// Key file paths get `~` expanded.
    pub fn from_params(params: &HashMap<String, String>) -> Self {
        let get = |key: &str| {
            params
                .get(key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(str::to_string)
        };
        let path = |key: &str| get(key).map(|v| PathBuf::from(shellexpand::tilde(&v).into_owned()));

        Self {
            hostname: get("hostname").unwrap_or_default(),
            username: get("username").unwrap_or_default(),
            auth_method: get("method").or_else(|| get("authMethod")),
            password: params.get("password").filter(|v| !v.is_empty()).cloned(),
            private_key: path("privateKey"),
            private_key_passphrase: params
                .get("privateKeyPassphrase")
                .filter(|v| !v.is_empty())
                .cloned(),
            host_key: path("hostKey"),
            base_path: get("basePath"),
        }
    }

    pub fn auth_method(&self) -> Result<AuthMethod, ConnectError> {
        AuthMethod::parse(self.auth_method.as_deref().unwrap_or_default())
    }

    /// `host:port` to dial, with the default SSH port filled in.
    pub fn dial_addr(&self) -> Result<String, ConnectError> {
        let host = self.hostname.trim();
        if host.is_empty() {
            return Err(ConnectError::MissingHostname);
        }
        Ok(with_default_port(host))
    }
}

fn with_default_port(host: &str) -> String {
    if host.parse::<SocketAddr>().is_ok() {
        return host.to_string();
    }
    if let Ok(ip) = host.parse::<IpAddr>() {
        return SocketAddr::new(ip, DEFAULT_SFTP_PORT).to_string();
    }
    match host.rsplit_once(':') {
        Some((name, port)) if !name.is_empty() && port.parse::<u16>().is_ok() => host.to_string(),
        _ => format!("{host}:{DEFAULT_SFTP_PORT}"),
    }
}
