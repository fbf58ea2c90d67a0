//! Standalone crate for fathom configuration types.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

pub mod config;
pub use config::{CheckpointConfig, Config, ConfigError, EngineConfig, SyncMode, SynchronizerConfig};
