//! X402 core library.
//!
//! Wire-level types shared by every participant of the X402 pay-to-access protocol: the
//! "payment required" terms a resource server answers with, the payment payload a buyer sends
//! back, and the settlement receipt returned once the payment went through.
//!
//! Nothing in this crate performs I/O.

pub mod errors;
pub mod transport;
pub mod types;
