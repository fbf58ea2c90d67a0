//! Ethereum related types

pub mod engine;
