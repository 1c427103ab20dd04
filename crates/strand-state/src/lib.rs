//! STRAND State Engine - Replicated records
//!
//! This crate implements the replication core:
//! - Schema tables (static property declarations per record type)
//! - Property cache (pending local writes)
//! - In-flight ledger (reliable deltas awaiting retirement)
//! - Delta codec (full snapshot and delta encodings)
//! - Replicated records and ordered record collections
//! - Ribbon point and brush stroke models

pub mod cache;
pub mod codec;
pub mod collection;
pub mod ledger;
pub mod models;
pub mod record;
pub mod schema;
pub mod shared;

pub use cache::*;
pub use codec::*;
pub use collection::*;
pub use ledger::*;
pub use models::*;
pub use record::*;
pub use schema::*;
pub use shared::*;
