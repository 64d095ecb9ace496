//! Configuration file.
//!
//! ```json
//! {
//!   "version": 1,
//!   "logging": { "file": "/var/log/sftpgate.log" },
//!   "accesses": [
//!     { "user": "alice", "fs": "sftp",
//!       "params": { "hostname": "files.example.com", "username": "alice",
//!                   "method": "password", "password": "secret" } }
//!   ]
//! }
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Configuration file used when none is named on the command line.
pub const DEFAULT_CONFIG_FILE: &str = "sftpgate.json";

/// The only configuration format version understood.
pub const CONFIG_VERSION: u32 = 1;

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("reading config {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("parsing config {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("writing config {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("unsupported config version {0}, expected {CONFIG_VERSION}")]
    Version(u32),

    #[error("access {0:?} is defined more than once")]
    DuplicateUser(String),

    #[error("no access named {0:?}")]
    UnknownUser(String),
}

/// Which backend serves an access.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FsKind {
    /// Remote directory over SFTP.
    Sftp,
    /// Local directory.
    Os,
    /// Ephemeral in-memory tree.
    Memory,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Append log lines to this file as well as stderr.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<PathBuf>,
}

/// One gateway user and the filesystem behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessConfig {
    pub user: String,
    pub fs: FsKind,
    #[serde(default)]
    pub params: HashMap<String, String>,
}

impl AccessConfig {
    /// Non-empty parameter value.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params
            .get(key)
            .map(String::as_str)
            .filter(|v| !v.is_empty())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Config {
    pub version: u32,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub accesses: Vec<AccessConfig>,
}

impl Config {
    /// Parse and validate a configuration document.
    pub fn from_json(path: &Path, text: &str) -> Result<Self, ConfigError> {
        let config: Config = serde_json::from_str(text).map_err(|source| ConfigError::Parse {
            path: path.to_path_buf(),
            source,
        })?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(path, &text)
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.version != CONFIG_VERSION {
            return Err(ConfigError::Version(self.version));
        }
        let mut seen = std::collections::HashSet::new();
        for access in &self.accesses {
            if !seen.insert(access.user.as_str()) {
                return Err(ConfigError::DuplicateUser(access.user.clone()));
            }
        }
        Ok(())
    }

    pub fn access(&self, user: &str) -> Result<&AccessConfig, ConfigError> {
        self.accesses
            .iter()
            .find(|a| a.user == user)
            .ok_or_else(|| ConfigError::UnknownUser(user.to_string()))
    }

    /// Starter configuration: one local access rooted at the temp directory.
    pub fn sample() -> Self {
        let params = HashMap::from([(
            "basePath".to_string(),
            std::env::temp_dir().to_string_lossy().into_owned(),
        )]);
        Self {
            version: CONFIG_VERSION,
            logging: LoggingConfig::default(),
            accesses: vec![AccessConfig {
                user: "test".into(),
                fs: FsKind::Os,
                params,
            }],
        }
    }

    /// Write [`sample`](Self::sample) to `path` unless a file is already there.
    ///
    /// Returns whether a file was written. The file is created owner-only
    /// since real configurations hold credentials.
    pub fn create_default(path: &Path) -> Result<bool, ConfigError> {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let write_err = |source: std::io::Error| ConfigError::Write {
            path: path.to_path_buf(),
            source,
        };

        let text = serde_json::to_string_pretty(&Self::sample()).map_err(|e| write_err(e.into()))?;
        let mut file = match std::fs::OpenOptions::new()
            .write(true)
            .create_new(true)
            .mode(0o600)
            .open(path)
        {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => return Ok(false),
            Err(e) => return Err(write_err(e)),
        };
        file.write_all(text.as_bytes()).map_err(write_err)?;
        file.write_all(b"\n").map_err(write_err)?;
        Ok(true)
    }
}
