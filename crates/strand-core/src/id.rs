//! Identity types for STRAND
//!
//! Property ids are small and schema-local; update ids are allocated by the
//! session layer and only need to be strictly increasing per writer.

use std::fmt;

use crate::{StrandError, StrandResult};

/// Property identity - unique within a record schema
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct PropertyId(pub u32);

impl PropertyId {
    #[inline]
    pub const fn new(id: u32) -> Self {
        PropertyId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Debug for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Prop({})", self.0)
    }
}

impl fmt::Display for PropertyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Update identity - correlates a reliable delta with its retirement
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct UpdateId(pub u32);

impl UpdateId {
    pub const ZERO: UpdateId = UpdateId(0);

    #[inline]
    pub const fn new(id: u32) -> Self {
        UpdateId(id)
    }

    #[inline]
    pub fn get(self) -> u32 {
        self.0
    }

    /// The id after this one, `None` at `u32::MAX`
    #[inline]
    pub fn next(self) -> Option<UpdateId> {
        self.0.checked_add(1).map(UpdateId)
    }
}

impl fmt::Debug for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Update({})", self.0)
    }
}

impl fmt::Display for UpdateId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Monotonic update id generator, owned by whoever drives the flush loop
#[derive(Clone, Debug)]
pub struct UpdateIdSequence {
    next: u32,
}

impl UpdateIdSequence {
    pub fn new() -> Self {
        UpdateIdSequence { next: 1 }
    }

    /// Start allocating at a specific id
    pub fn starting_at(first: UpdateId) -> Self {
        UpdateIdSequence { next: first.0 }
    }

    /// Allocate the next id. Never returns the same id twice.
    /// `u32::MAX` is never handed out; once the ids below it are used up every
    /// call fails with `UpdateIdsExhausted`.
    pub fn next_id(&mut self) -> StrandResult<UpdateId> {
        if self.next == u32::MAX {
            return Err(StrandError::UpdateIdsExhausted);
        }
        let id = UpdateId(self.next);
        self.next += 1;
        Ok(id)
    }

    /// Peek at the id the next call will return
    pub fn peek(&self) -> UpdateId {
        UpdateId(self.next)
    }
}

impl Default for UpdateIdSequence {
    fn default() -> Self {
        Self::new()
    }
}
