//! Configuration for the replay engine

use crate::merkle::DEFAULT_MAX_HISTORY_LEN;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Replay-engine configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path of the ledger file
    pub ledger_path: PathBuf,

    /// Directory for snapshot and witness files
    pub snapshot_dir: PathBuf,

    /// Merkle retention window
    pub max_history_len: u64,

    /// Tables materialized during iteration
    pub tables: Vec<String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            ledger_path: PathBuf::from("0.ledger"),
            snapshot_dir: PathBuf::from("."),
            max_history_len: DEFAULT_MAX_HISTORY_LEN,
            tables: vec!["histories".to_string()],
        }
    }
}

impl Config {
    /// Load from file
    pub fn from_file(path: impl AsRef<std::path::Path>) -> crate::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&content)
            .map_err(|e| crate::Error::Config(format!("Failed to parse config: {}", e)))?;
        Ok(config)
    }

    /// Load from environment variables
    pub fn from_env() -> crate::Result<Self> {
        let mut config = Config::default();

        if let Ok(path) = std::env::var("REPLAY_LEDGER_PATH") {
            config.ledger_path = PathBuf::from(path);
        }

        if let Ok(dir) = std::env::var("REPLAY_SNAPSHOT_DIR") {
            config.snapshot_dir = PathBuf::from(dir);
        }

        if let Ok(len) = std::env::var("REPLAY_MAX_HISTORY_LEN") {
            config.max_history_len = len
                .parse()
                .map_err(|e| crate::Error::Config(format!("Invalid max_history_len: {}", e)))?;
        }

        Ok(config)
    }
}
