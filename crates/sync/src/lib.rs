//! Synchronizer for the execution layer.
//!
//! The [`Synchronizer`] catches the node up with the network using one of the configured
//! strategies (full, fast, snap or checkpoint sync), then follows the chain block by block.
//! Progress is published through the shared [`SyncState`].

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod builder;
pub mod downloader;
mod error;
mod metrics;
mod peers;
pub mod pivot;
mod state;
mod synchronizer;
pub mod traits;

pub use builder::SynchronizerBuilder;
pub use error::{PivotSelectionError, SyncError, SynchronizerError};
pub use peers::TrailingPeerRequirements;
pub use state::{SubscriptionId, SyncState, SyncStatus, DEFAULT_IN_SYNC_TOLERANCE};
pub use synchronizer::Synchronizer;

#[cfg(test)]
mod test_utils;
