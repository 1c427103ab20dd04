//! Replicated record - cache, ledger and codec composed per record
//!
//! Property lifecycle:
//! - Clean -> Dirty on a local `set` with a differing value
//! - Dirty -> InFlight on a reliable delta flush
//! - InFlight -> Clean when the update id is retired
//! - Dirty -> Clean on a full snapshot or an unreliable flush
//!
//! Reads resolve pending -> newest in-flight -> canonical, so the local writer
//! always sees its own most recent write.

use std::collections::BTreeMap;
use std::marker::PhantomData;

use bytes::Bytes;
use strand_core::{
    PropertyId, ReplicationConfig, StrandError, StrandResult, StreamContext, UnreliablePolicy,
    UpdateId,
};
use strand_wire::{PropertyValue, WriteStream};
use tracing::{debug, error, trace, warn};

use crate::{codec, DirtySet, InFlightLedger, PropertyCache, PropertyDescriptor, Schema};

/// Replication state of one property, as seen by the local writer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PropertyState {
    Clean,
    Dirty,
    InFlight(UpdateId),
}

/// Outcome of applying one incoming message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ReadResult {
    /// Recognized properties written to canonical state
    pub applied: u32,
    /// Unknown properties skipped
    pub skipped: u32,
    /// An in-flight entry was retired by this message
    pub retired: bool,
    /// Properties whose canonical value actually changed
    pub changed: Vec<PropertyId>,
}

/// A fully parsed incoming message, ready to apply
#[derive(Clone, Debug, PartialEq)]
pub struct StagedRead {
    message: codec::DecodedMessage,
    ctx: StreamContext,
}

impl StagedRead {
    pub fn message(&self) -> &codec::DecodedMessage {
        &self.message
    }
}

/// One replicated record of schema `S`
#[derive(Clone, Debug)]
pub struct ReplicatedRecord<S: Schema> {
    canonical: BTreeMap<PropertyId, PropertyValue>,
    cache: PropertyCache,
    in_flight: InFlightLedger,
    config: ReplicationConfig,
    _schema: PhantomData<fn() -> S>,
}

impl<S: Schema> ReplicatedRecord<S> {
    pub fn new() -> Self {
        Self::with_config(ReplicationConfig::default())
    }

    pub fn with_config(config: ReplicationConfig) -> Self {
        debug_assert!(S::is_well_formed(), "{} property table is malformed", S::NAME);

        ReplicatedRecord {
            canonical: S::PROPERTIES.iter().map(|p| (p.id, p.default)).collect(),
            cache: PropertyCache::new(),
            in_flight: InFlightLedger::new(config.max_in_flight),
            config,
            _schema: PhantomData,
        }
    }

    /// Instantiate a remote record from an incoming full snapshot
    pub fn from_snapshot(bytes: &[u8], config: ReplicationConfig) -> StrandResult<Self> {
        let mut record = Self::with_config(config);
        record.read(bytes, &StreamContext::full_snapshot())?;
        Ok(record)
    }

    // Property access

    /// Visible value: pending, then newest in-flight, then canonical.
    /// `None` only for ids outside the schema.
    pub fn get(&self, id: PropertyId) -> Option<PropertyValue> {
        self.cache
            .get(id)
            .or_else(|| self.in_flight.latest(id))
            .or_else(|| self.canonical.get(&id))
            .copied()
    }

    /// Last settled value (remote applies, full snapshots, unreliable flushes)
    pub fn canonical(&self, id: PropertyId) -> Option<PropertyValue> {
        self.canonical.get(&id).copied()
    }

    /// Stage a local write.
    /// Returns true if the property is now dirty, false if the value was
    /// already visible.
    pub fn set(&mut self, id: PropertyId, value: impl Into<PropertyValue>) -> StrandResult<bool> {
        let value = value.into();
        let descriptor = S::descriptor(id).ok_or(StrandError::UnknownProperty(id))?;

        if value.kind() != descriptor.kind {
            return Err(StrandError::KindMismatch {
                property: id,
                expected: descriptor.kind.name(),
                actual: value.kind().name(),
            });
        }

        Ok(self.stage_write(descriptor, value))
    }

    /// Typed-accessor path for ids known to be in the table
    pub(crate) fn set_known(&mut self, id: PropertyId, value: PropertyValue) -> bool {
        match S::descriptor(id) {
            Some(descriptor) if descriptor.kind == value.kind() => self.stage_write(descriptor, value),
            _ => {
                debug_assert!(false, "{} has no {:?} property {}", S::NAME, value.kind(), id);
                false
            }
        }
    }

    fn stage_write(&mut self, descriptor: &PropertyDescriptor, value: PropertyValue) -> bool {
        let visible = self.get(descriptor.id).unwrap_or(descriptor.default);
        self.cache.stage(descriptor.id, value, &visible)
    }

    pub fn property_state(&self, id: PropertyId) -> Option<PropertyState> {
        S::descriptor(id)?;

        if self.cache.is_dirty(id) {
            Some(PropertyState::Dirty)
        } else if let Some(update_id) = self.in_flight.latest_update(id) {
            Some(PropertyState::InFlight(update_id))
        } else {
            Some(PropertyState::Clean)
        }
    }

    /// Any property has a pending local write
    pub fn is_dirty(&self) -> bool {
        !self.cache.is_empty()
    }

    pub fn in_flight(&self) -> &InFlightLedger {
        &self.in_flight
    }

    pub fn config(&self) -> &ReplicationConfig {
        &self.config
    }

    /// Retire a reliable delta confirmed consumed and fold its values into
    /// canonical state. Idempotent. Confirmations must arrive in update id
    /// order.
    pub fn retire(&mut self, update_id: UpdateId) -> bool {
        match self.in_flight.retire(update_id) {
            Some(entry) => {
                self.canonical.extend(entry);
                true
            }
            None => false,
        }
    }

    /// Fold every visible value into canonical state and drop the cache and
    /// the in-flight history.
    pub fn settle(&mut self) {
        for descriptor in S::PROPERTIES {
            if let Some(value) = self.get(descriptor.id) {
                self.canonical.insert(descriptor.id, value);
            }
        }
        self.cache.clear();
        self.in_flight.clear();
    }

    // Encoding

    /// Exact byte count `write` will produce for `ctx` if called next
    pub fn write_length(&self, ctx: &StreamContext) -> usize {
        if ctx.full_model {
            codec::full_length::<S>()
        } else if ctx.reliable_channel {
            codec::entries_length(self.cache.iter().filter(|(id, _)| S::is_reliable(**id)))
        } else {
            codec::entries_length(self.unreliable_selection().iter())
        }
    }

    /// Write this record's entries for `ctx`.
    ///
    /// Full snapshots settle first. Reliable deltas move the dirty reliable set
    /// into the ledger under `ctx.update_id` before writing it. Unreliable
    /// flushes settle what they write and never touch the ledger.
    pub fn write(&mut self, stream: &mut WriteStream, ctx: &StreamContext) -> StrandResult<()> {
        if ctx.full_model {
            self.settle();
            codec::write_entries(stream, self.canonical.iter());
            return Ok(());
        }

        if ctx.reliable_channel {
            return self.write_reliable_delta(stream, ctx.update_id);
        }

        let selection = self.unreliable_selection();
        self.cache.take(|id| !S::is_reliable(id));
        codec::write_entries(stream, selection.iter());
        self.canonical.extend(selection);
        Ok(())
    }

    fn write_reliable_delta(&mut self, stream: &mut WriteStream, update_id: UpdateId) -> StrandResult<()> {
        if !self.cache.iter().any(|(id, _)| S::is_reliable(*id)) {
            return Ok(());
        }

        self.in_flight.ensure_next(update_id)?;
        let dirty = self.cache.take(S::is_reliable);

        if let Some((evicted_id, evicted)) = self.in_flight.push(update_id, dirty)? {
            debug!(schema = S::NAME, update = %evicted_id, "folding evicted delta into canonical state");
            self.canonical.extend(evicted);
        }

        if let Some(entry) = self.in_flight.get(update_id) {
            codec::write_entries(stream, entry.iter());
        }
        Ok(())
    }

    fn unreliable_selection(&self) -> DirtySet {
        S::PROPERTIES
            .iter()
            .filter(|p| !p.reliable)
            .filter(|p| match self.config.unreliable_policy {
                UnreliablePolicy::EveryTick => true,
                UnreliablePolicy::WhenDirty => self.cache.is_dirty(p.id),
            })
            .filter_map(|p| self.get(p.id).map(|value| (p.id, value)))
            .collect()
    }

    /// Length-checked encode into a fresh buffer.
    /// Fails with `SizeMismatch` instead of returning bytes that disagree with
    /// `write_length`.
    pub fn encode(&mut self, ctx: &StreamContext) -> StrandResult<Bytes> {
        let expected = self.write_length(ctx);
        let mut stream = WriteStream::with_capacity(expected);
        self.write(&mut stream, ctx)?;

        if stream.len() != expected {
            error!(schema = S::NAME, expected, actual = stream.len(), "record encode size mismatch");
            return Err(StrandError::SizeMismatch {
                expected,
                actual: stream.len(),
            });
        }

        Ok(stream.freeze())
    }

    /// Re-encode the delta last sent under `update_id`, for retransmission
    pub fn rewrite_in_flight(&self, update_id: UpdateId) -> Option<Bytes> {
        let entry = self.in_flight.get(update_id)?;
        let mut stream = WriteStream::with_capacity(codec::entries_length(entry.iter()));
        codec::write_entries(&mut stream, entry.iter());
        Some(stream.freeze())
    }

    // Decoding

    /// Apply an incoming message.
    ///
    /// The body is parsed in full before anything changes, so a malformed
    /// message leaves canonical state and the in-flight ledger untouched.
    /// Echoed reliable deltas then retire their update id. Echoes of deltas
    /// the ledger already dropped (evicted, or settled by a full snapshot) are
    /// parsed but not applied.
    pub fn read(&mut self, bytes: &[u8], ctx: &StreamContext) -> StrandResult<ReadResult> {
        let staged = Self::stage(bytes, ctx)?;
        Ok(self.apply(staged))
    }

    /// Parse a message without touching any record
    pub fn stage(bytes: &[u8], ctx: &StreamContext) -> StrandResult<StagedRead> {
        let message = codec::decode::<S>(bytes).map_err(|e| {
            warn!(schema = S::NAME, error = %e, "dropping malformed record message");
            e
        })?;
        Ok(StagedRead { message, ctx: *ctx })
    }

    /// Apply a message parsed by [`Self::stage`]. Cannot fail.
    pub fn apply(&mut self, staged: StagedRead) -> ReadResult {
        let StagedRead { message, ctx } = staged;
        let mut result = ReadResult {
            skipped: message.skipped,
            ..Default::default()
        };

        if ctx.retires_update() {
            let superseded = self.in_flight.is_superseded(ctx.update_id);
            // The echoed body carries the same values
            result.retired = self.in_flight.retire(ctx.update_id).is_some();
            if superseded {
                // Local state already holds these values or newer ones
                trace!(schema = S::NAME, update = %ctx.update_id, "superseded echo not applied");
                return result;
            }
        }

        for (id, value) in message.values {
            result.applied += 1;
            let previous = self.canonical.insert(id, value);
            if previous != Some(value) && !result.changed.contains(&id) {
                result.changed.push(id);
            }
        }

        result
    }
}

impl<S: Schema> Default for ReplicatedRecord<S> {
    fn default() -> Self {
        Self::new()
    }
}
