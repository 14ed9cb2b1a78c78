//! Configuration for a mocked session.

use crate::error::{MockError, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::{Path, PathBuf};

pub const DEFAULT_RECV_BUFFER_SIZE: usize = 1024;

pub const ENV_NAMESPACE: &str = "MOCKWIRE_NAMESPACE";
pub const ENV_RECORDING_DIR: &str = "MOCKWIRE_RECORDING_DIR";
pub const ENV_ALLOW_NETWORK: &str = "MOCKWIRE_ALLOW_NETWORK";

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MockConfig {
    /// Session namespace; a process-derived one is used when omitted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,

    /// Directory holding one `<namespace>.json` session file per namespace
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub recording_dir: Option<PathBuf>,

    /// Forward unmatched, unrecorded traffic to the real network
    #[serde(default = "default_allow_network")]
    pub allow_network: bool,

    /// Chunk size used when reading a real response
    #[serde(default = "default_recv_buffer_size")]
    pub recv_buffer_size: usize,
}

fn default_allow_network() -> bool {
    true
}

fn default_recv_buffer_size() -> usize {
    DEFAULT_RECV_BUFFER_SIZE
}

impl Default for MockConfig {
    fn default() -> Self {
        Self {
            namespace: None,
            recording_dir: None,
            allow_network: default_allow_network(),
            recv_buffer_size: default_recv_buffer_size(),
        }
    }
}

impl MockConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: MockConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Build configuration from `MOCKWIRE_*` environment variables.
    ///
    /// An empty `MOCKWIRE_RECORDING_DIR` counts as unset.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        if let Ok(namespace) = env::var(ENV_NAMESPACE) {
            if !namespace.is_empty() {
                config.namespace = Some(namespace);
            }
        }
        if let Ok(dir) = env::var(ENV_RECORDING_DIR) {
            if !dir.is_empty() {
                config.recording_dir = Some(PathBuf::from(dir));
            }
        }
        if let Ok(allow) = env::var(ENV_ALLOW_NETWORK) {
            config.allow_network = !matches!(
                allow.trim().to_ascii_lowercase().as_str(),
                "0" | "false" | "no" | "off"
            );
        }

        config
    }

    pub fn validate(&self) -> Result<()> {
        if let Some(ref dir) = self.recording_dir {
            if !dir.is_dir() {
                return Err(MockError::InvalidRecordingDir(dir.clone()));
            }
        }
        if self.recv_buffer_size == 0 {
            return Err(MockError::Unsupported("recv_buffer_size must be non-zero"));
        }
        Ok(())
    }
}
