//! Configuration types for mockline.
//!
//! Configuration is read from a YAML file. Every section is optional and
//! falls back to defaults, so an empty file is a valid configuration:
//!
//! ```yaml
//! listen:
//!   host: 0.0.0.0
//!   port: 8080
//! storage:
//!   backend: file
//!   path: ./stubs.json
//! regex_cache:
//!   max_entries: 5000
//! logging:
//!   level: info
//!   json: false
//! seed: ./seed-stubs.json
//! ```

mod listen;
mod storage;

use std::net::SocketAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

pub use listen::{ListenConfig, LoggingConfig};
pub use storage::{RegexCacheConfig, StorageBackend, StorageConfig};

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct Config {
    #[serde(default)]
    pub listen: ListenConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub regex_cache: RegexCacheConfig,

    #[serde(default)]
    pub logging: LoggingConfig,

    /// JSON array of stubs created at startup, skipping method+URL
    /// duplicates of already stored stubs.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub seed: Option<PathBuf>,
}

impl Config {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = if contents.trim().is_empty() {
            Config::default()
        } else {
            serde_yaml::from_str(&contents)?
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.host.trim().is_empty() {
            anyhow::bail!("listen.host must not be empty");
        }

        if self.storage.backend == StorageBackend::File
            && self.storage.path.as_os_str().is_empty()
        {
            anyhow::bail!("storage.path is required when storage.backend is 'file'");
        }

        if self.regex_cache.max_entries == Some(0) {
            anyhow::bail!(
                "regex_cache.max_entries must be greater than zero; omit it for an unbounded cache"
            );
        }

        if let Some(seed) = &self.seed {
            if !seed.exists() {
                anyhow::bail!("Seed file '{}' does not exist", seed.display());
            }
        }

        Ok(())
    }

    /// Socket address the server binds to.
    pub fn socket_addr(&self) -> Result<SocketAddr, anyhow::Error> {
        let addr = format!("{}:{}", self.listen.host, self.listen.port);
        addr.parse()
            .map_err(|e| anyhow::anyhow!("Invalid listen address '{addr}': {e}"))
    }
}
