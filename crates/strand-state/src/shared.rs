//! Shared record - serialized access when decode runs off the owning thread
//!
//! A `ReplicatedRecord` has no internal locking. When the transport delivers
//! on a different thread than the one mutating the record, wrap it here so
//! writes, flushes and applies never interleave.

use std::sync::Arc;

use bytes::Bytes;
use parking_lot::{Mutex, MutexGuard};
use strand_core::{PropertyId, StrandResult, StreamContext, UpdateId};
use strand_wire::PropertyValue;

use crate::{ReadResult, ReplicatedRecord, Schema};

/// Cloneable handle to a lock-guarded record
pub struct SharedRecord<S: Schema> {
    inner: Arc<Mutex<ReplicatedRecord<S>>>,
}

impl<S: Schema> SharedRecord<S> {
    pub fn new(record: ReplicatedRecord<S>) -> Self {
        SharedRecord {
            inner: Arc::new(Mutex::new(record)),
        }
    }

    /// Hold the lock across several operations
    pub fn lock(&self) -> MutexGuard<'_, ReplicatedRecord<S>> {
        self.inner.lock()
    }

    pub fn get(&self, id: PropertyId) -> Option<PropertyValue> {
        self.inner.lock().get(id)
    }

    pub fn set(&self, id: PropertyId, value: impl Into<PropertyValue>) -> StrandResult<bool> {
        self.inner.lock().set(id, value)
    }

    pub fn encode(&self, ctx: &StreamContext) -> StrandResult<Bytes> {
        self.inner.lock().encode(ctx)
    }

    pub fn read(&self, bytes: &[u8], ctx: &StreamContext) -> StrandResult<ReadResult> {
        self.inner.lock().read(bytes, ctx)
    }

    pub fn retire(&self, update_id: UpdateId) -> bool {
        self.inner.lock().retire(update_id)
    }
}

impl<S: Schema> Clone for SharedRecord<S> {
    fn clone(&self) -> Self {
        SharedRecord {
            inner: Arc::clone(&self.inner),
        }
    }
}

impl<S: Schema> Default for SharedRecord<S> {
    fn default() -> Self {
        SharedRecord::new(ReplicatedRecord::new())
    }
}
