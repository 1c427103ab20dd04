//! STRAND Test Harness - Replication under impaired networks
//!
//! This crate provides:
//! - Lossy channel simulation (loss, bursts, jitter, reordering, duplication)
//! - In-order reliable delivery rebuilt over lossy links
//! - Writer/relay session simulation with retransmission from the ledger
//! - Record fuzzing
//! - End-to-end brush stroke replication

pub mod channel;
pub mod fuzzer;
pub mod integration;
pub mod logging;
pub mod ordered;
pub mod session;

#[cfg(test)]
mod properties;

pub use channel::*;
pub use fuzzer::*;
pub use integration::*;
pub use logging::*;
pub use ordered::*;
pub use session::*;
