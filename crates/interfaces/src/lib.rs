//! Fathom interface bindings
//!
//! Traits for everything the payload admission path and the synchronizer talk to but do not own:
//! the block store, the ancestor resolver, the block processor, backward sync and the listeners
//! that observe engine traffic.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// Ancestry and forkchoice traits.
pub mod consensus;

/// Block processing traits.
pub mod executor;

/// Infrastructure faults.
mod error;
pub use error::{FaultKind, InfrastructureFault};

/// Block store traits and errors.
pub mod provider;

/// Syncing related traits.
pub mod sync;

#[cfg(any(test, feature = "test-utils"))]
/// Common test helpers for mocking out the block store, block processor and backward sync.
pub mod test_utils;
