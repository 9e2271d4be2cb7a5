//! Payment scheme implementations.

pub mod exact_evm;
