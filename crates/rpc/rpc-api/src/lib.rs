//! Fathom RPC interface definitions
//!
//! Provides the `engine_` namespace the consensus layer talks to.
//!
//! ## Feature Flags
//!
//! - `client`: Enables JSON-RPC client support.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod engine;

/// re-export of all server traits
pub use servers::*;

/// Aggregates all server traits.
pub mod servers {
    pub use crate::engine::EngineApiServer;
}

/// re-export of all client traits
#[cfg(feature = "client")]
pub use clients::*;

/// Aggregates all client traits.
#[cfg(feature = "client")]
pub mod clients {
    pub use crate::engine::EngineApiClient;
}
