//! Property-based checks over arbitrary write and flush sequences

use std::collections::BTreeSet;

use proptest::prelude::*;
use strand_core::{PropertyId, Quaternion, ReplicationConfig, StreamContext, UpdateId, UpdateIdSequence, Vector3};
use strand_state::{RecordCollection, ReplicatedRecord, RibbonPoint, RibbonPointSchema, Schema};
use strand_wire::{PropertyValue, ValueKind};

use crate::fuzzer::ProbeSchema;

type Probe = ReplicatedRecord<ProbeSchema>;

#[derive(Clone, Debug)]
enum Action {
    Set { index: usize, a: f32, b: f32, n: u32 },
    Flush(u8),
}

fn value_for(kind: ValueKind, a: f32, b: f32, n: u32) -> PropertyValue {
    match kind {
        ValueKind::Vector3 => Vector3::new(a, b, a - b).into(),
        ValueKind::Quaternion => Quaternion::from_yaw_degrees(a).into(),
        ValueKind::Bool => (n % 2 == 0).into(),
        ValueKind::Float => a.into(),
        ValueKind::UInt => n.into(),
    }
}

fn set_strategy() -> impl Strategy<Value = (usize, f32, f32, u32)> {
    (0..ProbeSchema::PROPERTIES.len(), -100.0f32..100.0, -100.0f32..100.0, 0u32..4)
}

fn action_strategy() -> impl Strategy<Value = Action> {
    prop_oneof![
        3 => set_strategy().prop_map(|(index, a, b, n)| Action::Set { index, a, b, n }),
        1 => (0u8..3).prop_map(Action::Flush),
    ]
}

fn apply_set(record: &mut Probe, index: usize, a: f32, b: f32, n: u32) -> (bool, PropertyValue) {
    let descriptor = &ProbeSchema::PROPERTIES[index];
    let value = value_for(descriptor.kind, a, b, n);
    let was_visible = record.get(descriptor.id) == Some(value);
    let dirty = record.set(descriptor.id, value).unwrap();
    (dirty == !was_visible, value)
}

fn context(mode: u8, sequence: &mut UpdateIdSequence) -> StreamContext {
    match mode {
        0 => StreamContext::full_snapshot(),
        1 => StreamContext::reliable_delta(sequence.next_id().unwrap()),
        _ => StreamContext::unreliable_delta(),
    }
}

fn record_state(record: &Probe) -> (Vec<Option<PropertyValue>>, Vec<Option<PropertyValue>>, usize) {
    let visible = ProbeSchema::PROPERTIES.iter().map(|p| record.get(p.id)).collect();
    let canonical = ProbeSchema::PROPERTIES.iter().map(|p| record.canonical(p.id)).collect();
    (visible, canonical, record.in_flight().len())
}

/// Record with update id 1 in flight and a pending write on top
fn seeded_record() -> Probe {
    let mut record = Probe::new();
    record.set(PropertyId::new(1), Vector3::new(1.0, 2.0, 3.0)).unwrap();
    record.encode(&StreamContext::reliable_delta(UpdateId::new(1))).unwrap();
    record.set(PropertyId::new(4), 9u32).unwrap();
    record
}

fn seeded_points() -> RecordCollection<RibbonPointSchema> {
    let mut points = RecordCollection::new();
    points.append(RibbonPoint::at(Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY));
    points.append(RibbonPoint::at(Vector3::new(2.0, 0.0, 0.0), Quaternion::IDENTITY));
    points.encode(&StreamContext::reliable_delta(UpdateId::new(1))).unwrap();
    points
}

fn points_state(points: &RecordCollection<RibbonPointSchema>) -> Vec<(Vector3, Quaternion)> {
    points.iter().map(|p| (p.position(), p.rotation())).collect()
}

fn read_context(mode: u8) -> StreamContext {
    match mode {
        0 => StreamContext::full_snapshot(),
        1 => StreamContext::reliable_delta(UpdateId::new(2)),
        2 => StreamContext::reliable_echo(UpdateId::new(1)),
        _ => StreamContext::unreliable_delta(),
    }
}

proptest! {
    #[test]
    fn prop_rejected_message_changes_nothing(
        bytes in proptest::collection::vec(any::<u8>(), 0..48),
        mode in 0u8..4,
    ) {
        let ctx = read_context(mode);

        let mut record = seeded_record();
        let before = record_state(&record);
        if record.read(&bytes, &ctx).is_err() {
            prop_assert_eq!(record_state(&record), before);
        }

        let mut points = seeded_points();
        let before = points_state(&points);
        if points.read(&bytes, &ctx).is_err() {
            prop_assert_eq!(points_state(&points), before);
        }
    }

    #[test]
    fn prop_read_your_writes_and_dedup(sets in proptest::collection::vec(set_strategy(), 0..64)) {
        let mut record = Probe::new();
        for (index, a, b, n) in sets {
            let (dedup_ok, value) = apply_set(&mut record, index, a, b, n);
            prop_assert!(dedup_ok);
            prop_assert_eq!(record.get(ProbeSchema::PROPERTIES[index].id), Some(value));
        }
    }

    #[test]
    fn prop_write_length_matches_encoding(actions in proptest::collection::vec(action_strategy(), 0..96)) {
        let mut record = Probe::new();
        let mut sequence = UpdateIdSequence::new();

        for action in actions {
            match action {
                Action::Set { index, a, b, n } => {
                    apply_set(&mut record, index, a, b, n);
                }
                Action::Flush(mode) => {
                    let ctx = context(mode, &mut sequence);
                    let expected = record.write_length(&ctx);
                    let bytes = record.encode(&ctx).unwrap();
                    prop_assert_eq!(bytes.len(), expected);
                }
            }
        }
    }

    #[test]
    fn prop_snapshot_reproduces_every_property(actions in proptest::collection::vec(action_strategy(), 0..64)) {
        let mut record = Probe::new();
        let mut sequence = UpdateIdSequence::new();
        for action in actions {
            match action {
                Action::Set { index, a, b, n } => {
                    apply_set(&mut record, index, a, b, n);
                }
                Action::Flush(mode) => {
                    record.encode(&context(mode, &mut sequence)).unwrap();
                }
            }
        }

        let visible: Vec<_> = ProbeSchema::PROPERTIES.iter().map(|p| record.get(p.id)).collect();
        let snapshot = record.encode(&StreamContext::full_snapshot()).unwrap();
        let remote = Probe::from_snapshot(&snapshot, ReplicationConfig::default()).unwrap();

        for (descriptor, value) in ProbeSchema::PROPERTIES.iter().zip(visible) {
            prop_assert_eq!(remote.canonical(descriptor.id), value);
        }
    }

    #[test]
    fn prop_deltas_reach_an_in_sync_peer(
        base in proptest::collection::vec(set_strategy(), 0..16),
        changes in proptest::collection::vec(set_strategy(), 0..16),
    ) {
        let mut writer = Probe::new();
        for (index, a, b, n) in base {
            apply_set(&mut writer, index, a, b, n);
        }
        let snapshot = writer.encode(&StreamContext::full_snapshot()).unwrap();
        let mut remote = Probe::from_snapshot(&snapshot, ReplicationConfig::default()).unwrap();

        for (index, a, b, n) in changes {
            apply_set(&mut writer, index, a, b, n);
        }
        for ctx in [StreamContext::reliable_delta(UpdateId::new(1)), StreamContext::unreliable_delta()] {
            let bytes = writer.encode(&ctx).unwrap();
            remote.read(&bytes, &ctx).unwrap();
        }

        for descriptor in ProbeSchema::PROPERTIES {
            prop_assert_eq!(remote.canonical(descriptor.id), writer.get(descriptor.id));
        }
    }

    #[test]
    fn prop_retire_is_idempotent(count in 1u32..20, ids in proptest::collection::vec(1u32..24, 0..24)) {
        let mut record = ReplicatedRecord::<RibbonPointSchema>::new();
        for i in 1..=count {
            record.set_position(Vector3::new(i as f32, 0.0, 0.0));
            record.encode(&StreamContext::reliable_delta(UpdateId::new(i))).unwrap();
        }

        let mut retired = BTreeSet::new();
        for id in ids {
            let update_id = UpdateId::new(id);
            let expected = id <= count && retired.insert(id);
            prop_assert_eq!(record.retire(update_id), expected);
            prop_assert!(!record.retire(update_id));
        }
        prop_assert_eq!(record.in_flight().len(), (count as usize) - retired.len());
    }
}

#[test]
fn test_position_reaches_reader_and_retires() {
    let mut writer = ReplicatedRecord::<RibbonPointSchema>::new();
    writer.set_position(Vector3::new(1.0, 2.0, 3.0));
    writer.set_rotation(Quaternion::IDENTITY);

    let ctx = StreamContext::reliable_delta(UpdateId::new(7));
    let bytes = writer.encode(&ctx).unwrap();
    assert!(writer.in_flight().contains(UpdateId::new(7)));

    let mut reader = ReplicatedRecord::<RibbonPointSchema>::new();
    reader.read(&bytes, &ctx).unwrap();
    assert_eq!(reader.position(), Vector3::new(1.0, 2.0, 3.0));
    assert_eq!(reader.rotation(), Quaternion::IDENTITY);

    assert!(writer.retire(UpdateId::new(7)));
    assert!(writer.in_flight().is_empty());
    assert!(!writer.retire(UpdateId::new(7)));
    assert_eq!(writer.position(), Vector3::new(1.0, 2.0, 3.0));
}
