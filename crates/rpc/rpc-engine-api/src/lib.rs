//! The implementation of Engine API.
//! [Read more](https://github.com/ethereum/execution-apis/tree/main/src/engine).

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

/// The Engine API implementation.
mod engine_api;

/// Engine API error.
mod error;

/// Engine API metrics.
mod metrics;

pub use engine_api::*;
pub use error::*;
