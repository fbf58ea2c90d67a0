//! Configuration files.

use fathom_primitives::{BlockNumber, B256, MAXIMUM_EXTRA_DATA_SIZE};
use serde::{Deserialize, Serialize};
use std::{fmt, path::Path, time::Duration};

/// Errors when loading or storing the configuration file.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The file could not be read, written or parsed.
    #[error("failed to access config file: {0}")]
    Confy(#[from] confy::ConfyError),
    /// The values were read but do not make sense together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Configuration for the fathom node.
#[derive(Debug, Clone, Default, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct Config {
    /// Configuration of the synchronizer.
    pub sync: SynchronizerConfig,
    /// Configuration of the engine API payload handling.
    pub engine: EngineConfig,
}

impl Config {
    /// Loads the configuration from the given TOML file, writing the defaults to it first if it
    /// does not exist yet.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let config: Self = confy::load_path(path.as_ref())?;
        config.validate()?;
        Ok(config)
    }

    /// Writes the configuration to the given TOML file.
    pub fn save(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        confy::store_path(path.as_ref(), self)?;
        Ok(())
    }

    /// Checks values that depend on each other.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.sync.sync_mode == SyncMode::Checkpoint && self.sync.checkpoint.is_none() {
            return Err(ConfigError::Invalid(
                "checkpoint sync requires a [sync.checkpoint] section".to_string(),
            ))
        }
        if self.sync.min_peers_for_pivot == 0 {
            return Err(ConfigError::Invalid("min_peers_for_pivot must be positive".to_string()))
        }
        Ok(())
    }
}

/// How the node catches up with the network before it follows the chain block by block.
#[derive(Debug, Clone, Copy, Default, Deserialize, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncMode {
    /// Import and execute every block from genesis.
    Full,
    /// Download blocks and receipts up to a pivot and the state at the pivot.
    Fast,
    /// Like fast sync, but the state is fetched as flat ranges and healed afterwards.
    #[default]
    Snap,
    /// Snap sync starting from a trusted checkpoint instead of genesis.
    Checkpoint,
}

impl SyncMode {
    /// Returns `true` for modes that download the world state at a pivot block.
    pub const fn is_pivoted(&self) -> bool {
        !matches!(self, Self::Full)
    }
}

impl fmt::Display for SyncMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Full => f.write_str("full"),
            Self::Fast => f.write_str("fast"),
            Self::Snap => f.write_str("snap"),
            Self::Checkpoint => f.write_str("checkpoint"),
        }
    }
}

/// Configuration of the synchronizer.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct SynchronizerConfig {
    /// The catch-up strategy.
    pub sync_mode: SyncMode,
    /// How far behind the best peer's head the pivot block is chosen.
    pub pivot_distance: u64,
    /// Number of peers that must report a head before a pivot is chosen.
    pub min_peers_for_pivot: usize,
    /// How long to wait for enough peers before pivot selection gives up.
    #[serde(with = "humantime_serde")]
    pub pivot_selection_timeout: Duration,
    /// Maximum number of peers allowed to trail the pivot. Unrestricted when unset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_trailing_peers: Option<usize>,
    /// Number of blocks the local head may trail the best known block and still count as in
    /// sync.
    pub in_sync_tolerance: u64,
    /// Trusted starting point for checkpoint sync.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub checkpoint: Option<CheckpointConfig>,
}

impl Default for SynchronizerConfig {
    fn default() -> Self {
        Self {
            sync_mode: SyncMode::default(),
            pivot_distance: 50,
            min_peers_for_pivot: 5,
            pivot_selection_timeout: Duration::from_secs(30),
            max_trailing_peers: None,
            in_sync_tolerance: 5,
            checkpoint: None,
        }
    }
}

/// A trusted block to start checkpoint sync from.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
pub struct CheckpointConfig {
    /// Checkpoint block number.
    pub number: BlockNumber,
    /// Checkpoint block hash.
    pub hash: B256,
}

/// Configuration of the engine API payload handling.
#[derive(Debug, Clone, Copy, Deserialize, PartialEq, Eq, Serialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Payloads with a longer `extraData` are rejected as invalid.
    pub max_extra_data_size: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self { max_extra_data_size: MAXIMUM_EXTRA_DATA_SIZE }
    }
}
