//! Runtime configuration, loaded from TOML.
//!
//! ```toml
//! auto_assign_on_first_response = true
//!
//! [storage]
//! backend = "file"
//! dir = "/var/lib/relief"
//!
//! [logging]
//! level = "info"
//! format = "json"
//! ```
//!
//! Every section is optional; missing fields take their defaults.

use std::path::{Path, PathBuf};

use relief_core::{ReliefError, ReliefResult};
use serde::{Deserialize, Serialize};

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReliefConfig {
    pub storage: StorageConfig,
    /// Assign a `pending` resource to the first user who responds to it.
    pub auto_assign_on_first_response: bool,
    pub logging: LoggingConfig,
}

impl Default for ReliefConfig {
    fn default() -> Self {
        Self {
            storage: StorageConfig::Memory,
            auto_assign_on_first_response: true,
            logging: LoggingConfig::default(),
        }
    }
}

impl ReliefConfig {
    pub fn from_toml_str(raw: &str) -> ReliefResult<Self> {
        toml::from_str(raw).map_err(|e| ReliefError::Config(format!("invalid config: {e}")))
    }

    pub fn load(path: impl AsRef<Path>) -> ReliefResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ReliefError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "backend", rename_all = "lowercase")]
pub enum StorageConfig {
    #[default]
    Memory,
    File {
        dir: PathBuf,
    },
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// `EnvFilter` directive, overridden by `RUST_LOG` when set.
    pub level: String,
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: LogFormat::Plain,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Plain,
    Json,
}
