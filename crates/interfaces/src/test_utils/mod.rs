#![allow(unreachable_pub)]

mod generators;
mod mocks;

pub use generators::*;
pub use mocks::*;
