//! Ordered record collection
//!
//! Each record is one entry in the collection's own property stream:
//! entry id = record index, payload = that record's message. Records appended
//! since the last flush travel as full snapshots; announced records travel as
//! their own deltas and are omitted when they have nothing to say.

use bytes::Bytes;
use strand_core::{PropertyId, ReplicationConfig, StrandError, StrandResult, StreamContext};
use strand_wire::{entry_len, ReadStream, WriteStream};
use tracing::{debug, error};

use crate::{ReplicatedRecord, Schema, StagedRead};

/// Where an appended record came from
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Origin {
    Local,
    Remote,
}

/// Explicitly registered listener for collection changes
pub trait CollectionObserver<S: Schema>: Send {
    fn record_appended(&mut self, index: usize, record: &ReplicatedRecord<S>, origin: Origin);

    fn record_changed(&mut self, _index: usize, _record: &ReplicatedRecord<S>, _changed: &[PropertyId]) {}
}

/// Outcome of applying one incoming collection message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CollectionReadResult {
    /// Indices of records created by this message
    pub appended: Vec<usize>,
    /// Indices of existing records whose canonical state changed
    pub changed: Vec<usize>,
    /// Existing records that retired an in-flight entry
    pub retired: u32,
}

enum StagedEntry<S: Schema> {
    Update(usize, StagedRead),
    Append(ReplicatedRecord<S>),
}

/// A fully parsed collection message, ready to apply
pub struct StagedCollection<S: Schema> {
    entries: Vec<StagedEntry<S>>,
}

impl<S: Schema> StagedCollection<S> {
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Ordered container of replicated records
pub struct RecordCollection<S: Schema> {
    records: Vec<ReplicatedRecord<S>>,
    observers: Vec<Box<dyn CollectionObserver<S>>>,
    /// Records below this index are known to peers
    announced: usize,
    config: ReplicationConfig,
}

impl<S: Schema> RecordCollection<S> {
    pub fn new() -> Self {
        Self::with_config(ReplicationConfig::default())
    }

    pub fn with_config(config: ReplicationConfig) -> Self {
        RecordCollection {
            records: Vec::new(),
            observers: Vec::new(),
            announced: 0,
            config,
        }
    }

    pub fn with_observer(mut self, observer: Box<dyn CollectionObserver<S>>) -> Self {
        self.observers.push(observer);
        self
    }

    pub fn add_observer(&mut self, observer: Box<dyn CollectionObserver<S>>) {
        self.observers.push(observer);
    }

    /// Append a locally created record and notify observers
    pub fn append(&mut self, record: ReplicatedRecord<S>) -> usize {
        let index = self.records.len();
        self.records.push(record);
        self.notify_appended(index, Origin::Local);
        index
    }

    /// Append a record configured like the rest of the collection
    pub fn append_new(&mut self, init: impl FnOnce(&mut ReplicatedRecord<S>)) -> usize {
        let mut record = ReplicatedRecord::with_config(self.config.clone());
        init(&mut record);
        self.append(record)
    }

    fn notify_appended(&mut self, index: usize, origin: Origin) {
        let record = &self.records[index];
        for observer in &mut self.observers {
            observer.record_appended(index, record, origin);
        }
    }

    pub fn get(&self, index: usize) -> Option<&ReplicatedRecord<S>> {
        self.records.get(index)
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut ReplicatedRecord<S>> {
        self.records.get_mut(index)
    }

    pub fn last(&self) -> Option<&ReplicatedRecord<S>> {
        self.records.last()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ReplicatedRecord<S>> {
        self.records.iter()
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Records appended locally but not yet flushed to peers
    pub fn unannounced(&self) -> usize {
        self.records.len() - self.announced
    }

    // Encoding

    fn record_context(&self, index: usize, ctx: &StreamContext) -> Option<StreamContext> {
        if ctx.full_model || index >= self.announced {
            // New records only ride the reliable channel
            (ctx.full_model || ctx.reliable_channel).then(StreamContext::full_snapshot)
        } else {
            Some(*ctx)
        }
    }

    /// Exact byte count `write` will produce for `ctx` if called next
    pub fn write_length(&self, ctx: &StreamContext) -> usize {
        self.records
            .iter()
            .enumerate()
            .filter_map(|(index, record)| {
                let record_ctx = self.record_context(index, ctx)?;
                let len = record.write_length(&record_ctx);
                (len > 0).then(|| entry_len(PropertyId::new(index as u32), len))
            })
            .sum()
    }

    pub fn write(&mut self, stream: &mut WriteStream, ctx: &StreamContext) -> StrandResult<()> {
        for index in 0..self.records.len() {
            let Some(record_ctx) = self.record_context(index, ctx) else {
                continue;
            };
            let record = &mut self.records[index];
            if record.write_length(&record_ctx) == 0 {
                continue;
            }
            let nested = record.encode(&record_ctx)?;
            stream.write_bytes(PropertyId::new(index as u32), &nested);
        }

        if ctx.full_model || ctx.reliable_channel {
            self.announced = self.records.len();
        }
        Ok(())
    }

    /// Length-checked encode into a fresh buffer
    pub fn encode(&mut self, ctx: &StreamContext) -> StrandResult<Bytes> {
        let expected = self.write_length(ctx);
        let mut stream = WriteStream::with_capacity(expected);
        self.write(&mut stream, ctx)?;

        if stream.len() != expected {
            error!(schema = S::NAME, expected, actual = stream.len(), "collection encode size mismatch");
            return Err(StrandError::SizeMismatch {
                expected,
                actual: stream.len(),
            });
        }

        Ok(stream.freeze())
    }

    // Decoding

    /// Apply an incoming collection message.
    /// Entries for unknown indices must extend the collection contiguously.
    /// Every nested payload is parsed before any record is touched.
    pub fn read(&mut self, bytes: &[u8], ctx: &StreamContext) -> StrandResult<CollectionReadResult> {
        let staged = self.stage(bytes, ctx)?;
        Ok(self.apply(staged))
    }

    /// Parse a collection message against the current length without
    /// touching any record
    pub fn stage(&self, bytes: &[u8], ctx: &StreamContext) -> StrandResult<StagedCollection<S>> {
        let mut entries = Vec::new();
        let mut len = self.records.len();

        for entry in ReadStream::new(bytes) {
            let raw = entry?;
            let index = raw.id.get() as usize;

            if index < len {
                entries.push(StagedEntry::Update(index, ReplicatedRecord::<S>::stage(raw.payload, ctx)?));
            } else if index == len {
                let record = ReplicatedRecord::from_snapshot(raw.payload, self.config.clone())?;
                entries.push(StagedEntry::Append(record));
                len += 1;
            } else {
                return Err(StrandError::CollectionGap {
                    index: raw.id.get(),
                    len: self.records.len(),
                });
            }
        }

        Ok(StagedCollection { entries })
    }

    /// Apply a message parsed by [`Self::stage`] against the same collection
    pub fn apply(&mut self, staged: StagedCollection<S>) -> CollectionReadResult {
        let mut result = CollectionReadResult::default();

        for entry in staged.entries {
            match entry {
                StagedEntry::Update(index, read) => {
                    let Some(record) = self.records.get_mut(index) else {
                        continue;
                    };
                    let applied = record.apply(read);
                    if applied.retired {
                        result.retired += 1;
                    }
                    if !applied.changed.is_empty() {
                        if !result.changed.contains(&index) {
                            result.changed.push(index);
                        }
                        let record = &self.records[index];
                        for observer in &mut self.observers {
                            observer.record_changed(index, record, &applied.changed);
                        }
                    }
                }
                StagedEntry::Append(record) => {
                    let index = self.records.len();
                    self.records.push(record);
                    self.announced = self.announced.max(self.records.len());
                    debug!(schema = S::NAME, index, "remote record appended");
                    result.appended.push(index);
                    self.notify_appended(index, Origin::Remote);
                }
            }
        }

        result
    }
}

impl<S: Schema> Default for RecordCollection<S> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::RibbonPointSchema;
    use parking_lot::Mutex;
    use std::sync::Arc;
    use strand_core::{UpdateId, Vector3};
    use strand_wire::PropertyValue;

    struct Recorder {
        events: Arc<Mutex<Vec<(usize, Origin)>>>,
    }

    impl CollectionObserver<RibbonPointSchema> for Recorder {
        fn record_appended(
            &mut self,
            index: usize,
            _record: &ReplicatedRecord<RibbonPointSchema>,
            origin: Origin,
        ) {
            self.events.lock().push((index, origin));
        }
    }

    fn point_at(x: f32) -> ReplicatedRecord<RibbonPointSchema> {
        let mut record = ReplicatedRecord::new();
        record.set(RibbonPointSchema::POSITION, Vector3::new(x, 0.0, 0.0)).unwrap();
        record
    }

    #[test]
    fn test_append_notifies_local() {
        let events = Arc::new(Mutex::new(Vec::new()));
        let mut points = RecordCollection::<RibbonPointSchema>::new().with_observer(Box::new(Recorder {
            events: Arc::clone(&events),
        }));

        assert_eq!(points.append(point_at(1.0)), 0);
        assert_eq!(points.append(point_at(2.0)), 1);
        assert_eq!(*events.lock(), vec![(0, Origin::Local), (1, Origin::Local)]);
    }

    #[test]
    fn test_snapshot_bootstraps_remote_collection() {
        let mut local = RecordCollection::<RibbonPointSchema>::new();
        local.append(point_at(1.0));
        local.append(point_at(2.0));
        let bytes = local.encode(&StreamContext::full_snapshot()).unwrap();

        let events = Arc::new(Mutex::new(Vec::new()));
        let mut remote = RecordCollection::<RibbonPointSchema>::new().with_observer(Box::new(Recorder {
            events: Arc::clone(&events),
        }));
        let result = remote.read(&bytes, &StreamContext::full_snapshot()).unwrap();

        assert_eq!(result.appended, vec![0, 1]);
        assert_eq!(*events.lock(), vec![(0, Origin::Remote), (1, Origin::Remote)]);
        assert_eq!(
            remote.get(1).unwrap().get(RibbonPointSchema::POSITION),
            Some(PropertyValue::Vector3(Vector3::new(2.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn test_delta_carries_new_records_and_changed_ones_only() {
        let mut local = RecordCollection::<RibbonPointSchema>::new();
        local.append(point_at(1.0));
        local.append(point_at(2.0));
        let snapshot = local.encode(&StreamContext::full_snapshot()).unwrap();

        let mut remote = RecordCollection::<RibbonPointSchema>::new();
        remote.read(&snapshot, &StreamContext::full_snapshot()).unwrap();

        local
            .get_mut(0)
            .unwrap()
            .set(RibbonPointSchema::POSITION, Vector3::new(5.0, 0.0, 0.0))
            .unwrap();
        local.append(point_at(3.0));
        assert_eq!(local.unannounced(), 1);

        let ctx = StreamContext::reliable_delta(UpdateId::new(1));
        let delta = local.encode(&ctx).unwrap();
        assert_eq!(local.unannounced(), 0);

        let result = remote.read(&delta, &ctx).unwrap();
        assert_eq!(result.changed, vec![0]);
        assert_eq!(result.appended, vec![2]);
        assert_eq!(remote.len(), 3);
        assert_eq!(
            remote.get(0).unwrap().get(RibbonPointSchema::POSITION),
            Some(PropertyValue::Vector3(Vector3::new(5.0, 0.0, 0.0)))
        );
    }

    #[test]
    fn test_unreliable_flush_skips_unannounced_records() {
        let mut local = RecordCollection::<RibbonPointSchema>::new();
        local.append(point_at(1.0));

        let bytes = local.encode(&StreamContext::unreliable_delta()).unwrap();
        assert!(bytes.is_empty());
        assert_eq!(local.unannounced(), 1);
    }

    #[test]
    fn test_gap_rejected() {
        let mut stream = WriteStream::new();
        stream.write_bytes(PropertyId::new(3), &[]);

        let mut remote = RecordCollection::<RibbonPointSchema>::new();
        assert_eq!(
            remote.read(stream.as_slice(), &StreamContext::full_snapshot()),
            Err(StrandError::CollectionGap { index: 3, len: 0 })
        );
    }

    #[test]
    fn test_gap_after_valid_entries_applies_nothing() {
        let mut source = RecordCollection::<RibbonPointSchema>::new();
        source.append(point_at(1.0));
        let mut stream = WriteStream::new();
        let nested = source.get_mut(0).unwrap().encode(&StreamContext::full_snapshot()).unwrap();
        stream.write_bytes(PropertyId::new(0), &nested);
        stream.write_bytes(PropertyId::new(2), &nested);

        let mut remote = RecordCollection::<RibbonPointSchema>::new();
        assert_eq!(
            remote.read(stream.as_slice(), &StreamContext::full_snapshot()),
            Err(StrandError::CollectionGap { index: 2, len: 0 })
        );
        assert!(remote.is_empty());
    }

    #[test]
    fn test_bad_nested_payload_leaves_earlier_records_untouched() {
        let mut remote = RecordCollection::<RibbonPointSchema>::new();
        remote.append(point_at(1.0));
        remote.append(point_at(2.0));

        let mut first = WriteStream::new();
        first.write_value(RibbonPointSchema::POSITION, &PropertyValue::Vector3(Vector3::new(9.0, 9.0, 9.0)));
        let mut second = WriteStream::new();
        second.write_bytes(RibbonPointSchema::POSITION, &[0u8; 4]);

        let mut stream = WriteStream::new();
        stream.write_bytes(PropertyId::new(0), first.as_slice());
        stream.write_bytes(PropertyId::new(1), second.as_slice());

        assert_eq!(
            remote.read(stream.as_slice(), &StreamContext::reliable_delta(UpdateId::new(1))),
            Err(StrandError::InvalidPayload {
                property: RibbonPointSchema::POSITION,
                expected: 12,
                actual: 4,
            })
        );
        assert_eq!(remote.get(0).unwrap().position(), Vector3::new(1.0, 0.0, 0.0));
        assert_eq!(remote.get(1).unwrap().position(), Vector3::new(2.0, 0.0, 0.0));
    }

    #[test]
    fn test_bad_appended_snapshot_appends_nothing() {
        let mut source = RecordCollection::<RibbonPointSchema>::new();
        source.append(point_at(1.0));
        let nested = source.get_mut(0).unwrap().encode(&StreamContext::full_snapshot()).unwrap();

        let mut stream = WriteStream::new();
        stream.write_bytes(PropertyId::new(0), &nested);
        stream.write_bytes(PropertyId::new(1), &nested[..nested.len() - 1]);

        let mut remote = RecordCollection::<RibbonPointSchema>::new();
        assert!(remote.read(stream.as_slice(), &StreamContext::full_snapshot()).is_err());
        assert!(remote.is_empty());
    }
}
