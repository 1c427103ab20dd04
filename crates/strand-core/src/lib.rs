//! STRAND Core - Fundamental types and primitives
//!
//! This crate defines the core types used throughout STRAND:
//! - Identifiers (PropertyId, UpdateId)
//! - Math values carried by replicated properties (Vector3, Quaternion)
//! - Stream context flags supplied by the session layer
//! - Replication configuration
//! - The shared error type

pub mod id;
pub mod math;
pub mod context;
pub mod config;
pub mod error;

pub use id::*;
pub use math::*;
pub use context::*;
pub use config::*;
pub use error::*;
