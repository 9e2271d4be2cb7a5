//! Core types used across the X402 workspace.

mod amount;
mod common;

pub use amount::*;
pub use common::*;
