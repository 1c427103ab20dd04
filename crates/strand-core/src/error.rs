//! Error types for STRAND

use thiserror::Error;

use crate::{PropertyId, UpdateId};

/// Core STRAND errors
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StrandError {
    // Wire errors
    #[error("Property {property}: declared length {declared} exceeds remaining {remaining} bytes")]
    MalformedLength {
        property: PropertyId,
        declared: usize,
        remaining: usize,
    },

    #[error("Truncated property header at offset {offset}")]
    TruncatedHeader { offset: usize },

    #[error("Varint overflow at offset {offset}")]
    VarintOverflow { offset: usize },

    #[error("Property {property}: payload is {actual} bytes, expected {expected}")]
    InvalidPayload {
        property: PropertyId,
        expected: usize,
        actual: usize,
    },

    #[error("Record index {index} leaves a gap after {len} records")]
    CollectionGap { index: u32, len: usize },

    // Encode invariants
    #[error("Encoded {actual} bytes but write length promised {expected}")]
    SizeMismatch { expected: usize, actual: usize },

    // Schema errors
    #[error("Unknown property: {0}")]
    UnknownProperty(PropertyId),

    #[error("Property {property} holds {expected}, got {actual}")]
    KindMismatch {
        property: PropertyId,
        expected: &'static str,
        actual: &'static str,
    },

    // Ledger errors
    #[error("Update id went backwards: last {last}, got {got}")]
    UpdateIdRegression { last: UpdateId, got: UpdateId },

    #[error("Update id space exhausted")]
    UpdateIdsExhausted,
}

/// Result type for STRAND operations
pub type StrandResult<T> = Result<T, StrandError>;
