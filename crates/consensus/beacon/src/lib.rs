//! Engine API payload admission for the execution layer.
//!
//! [`BeaconConsensusEngine`] decides, for every payload the consensus layer hands over, whether
//! it is valid, invalid, or cannot be judged yet because the node is still catching up.

#![cfg_attr(not(test), warn(unused_crate_dependencies))]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]

mod engine;
pub use engine::*;
