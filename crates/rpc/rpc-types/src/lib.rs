//! Fathom RPC type definitions
//!
//! Provides the request and response types of the `engine_` namespace.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod eth;

pub use eth::*;
