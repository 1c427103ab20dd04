//! STRAND Wire Protocol - Property stream format
//!
//! A record message is a flat sequence of tagged properties:
//! - Property id (LEB128 varint)
//! - Payload length (u32, LE)
//! - Payload bytes
//!
//! There is no count field. Readers consume entries until the input is
//! exhausted, and skip ids they do not know by their declared length.

pub mod stream;
pub mod value;
pub mod varint;

pub use stream::*;
pub use value::*;
pub use varint::*;
