//! Record fuzzer - randomized operation sequences against one replicated record
//!
//! Checks:
//! - Read-your-writes after every local write
//! - Flushes and echoes never change what the writer sees
//! - Encoded size always equals the promised write length
//! - A mirror fed every outgoing message ends up identical to the writer

use std::collections::VecDeque;

use bytes::Bytes;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use strand_core::{
    PropertyId, Quaternion, ReplicationConfig, StreamContext, UnreliablePolicy, UpdateId,
    UpdateIdSequence, Vector3,
};
use strand_state::{PropertyDescriptor, ReplicatedRecord, Schema};
use strand_wire::{PropertyValue, ValueKind};
use tracing::debug;

/// Mixed-kind schema exercising every value kind and both channels
#[derive(Clone, Copy, Debug, Default)]
pub struct ProbeSchema;

impl Schema for ProbeSchema {
    const NAME: &'static str = "Probe";
    const PROPERTIES: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::reliable(1, "position", PropertyValue::Vector3(Vector3::ZERO)),
        PropertyDescriptor::reliable(2, "rotation", PropertyValue::Quaternion(Quaternion::IDENTITY)),
        PropertyDescriptor::unreliable(3, "pressure", PropertyValue::Float(0.0)),
        PropertyDescriptor::reliable(4, "color", PropertyValue::UInt(0)),
        PropertyDescriptor::reliable(5, "visible", PropertyValue::Bool(true)),
        PropertyDescriptor::unreliable(200, "cursor", PropertyValue::Vector3(Vector3::ZERO)),
    ];
}

/// Fuzzer configuration
#[derive(Clone, Debug)]
pub struct FuzzerConfig {
    /// Number of operations to run
    pub operation_count: usize,
    /// Probability an operation is a local write
    pub write_prob: f64,
    /// Probability a flush is a full snapshot
    pub snapshot_prob: f64,
    /// Probability the oldest outstanding delta is echoed back
    pub echo_prob: f64,
    /// Distinct values drawn per property (small = many duplicate writes)
    pub value_range: u32,
    pub replication: ReplicationConfig,
    /// Random seed
    pub seed: u64,
}

impl Default for FuzzerConfig {
    fn default() -> Self {
        FuzzerConfig {
            operation_count: 1000,
            write_prob: 0.6,
            snapshot_prob: 0.02,
            echo_prob: 0.3,
            value_range: 8,
            replication: ReplicationConfig::default(),
            seed: 42,
        }
    }
}

impl FuzzerConfig {
    /// Light fuzzing for quick tests
    pub fn light() -> Self {
        FuzzerConfig {
            operation_count: 200,
            ..Default::default()
        }
    }

    /// Heavy fuzzing with a tiny ledger so eviction happens constantly
    pub fn heavy() -> Self {
        FuzzerConfig {
            operation_count: 20_000,
            echo_prob: 0.05,
            value_range: 64,
            replication: ReplicationConfig::default()
                .with_max_in_flight(4)
                .with_unreliable_policy(UnreliablePolicy::WhenDirty),
            ..Default::default()
        }
    }
}

/// Fuzzing result
#[derive(Debug, Default)]
pub struct FuzzResult {
    pub operations: usize,
    pub messages: usize,
    pub read_your_writes_violations: u32,
    pub visibility_violations: u32,
    pub length_violations: u32,
    pub divergent: Vec<PropertyId>,
}

impl FuzzResult {
    pub fn is_valid(&self) -> bool {
        self.read_your_writes_violations == 0
            && self.visibility_violations == 0
            && self.length_violations == 0
            && self.divergent.is_empty()
    }
}

/// Record fuzzer
pub struct RecordFuzzer {
    config: FuzzerConfig,
    rng: StdRng,
    writer: ReplicatedRecord<ProbeSchema>,
    mirror: ReplicatedRecord<ProbeSchema>,
    sequence: UpdateIdSequence,
    /// Sent reliable deltas not yet echoed, oldest first
    outstanding: VecDeque<(UpdateId, Bytes)>,
    result: FuzzResult,
}

impl RecordFuzzer {
    pub fn new(config: FuzzerConfig) -> Self {
        RecordFuzzer {
            rng: StdRng::seed_from_u64(config.seed),
            writer: ReplicatedRecord::with_config(config.replication.clone()),
            mirror: ReplicatedRecord::with_config(config.replication.clone()),
            sequence: UpdateIdSequence::new(),
            outstanding: VecDeque::new(),
            result: FuzzResult::default(),
            config,
        }
    }

    fn random_value(&mut self, kind: ValueKind) -> PropertyValue {
        let n = self.rng.gen_range(0..self.config.value_range);
        match kind {
            ValueKind::Vector3 => Vector3::new(n as f32, 0.5, -(n as f32)).into(),
            ValueKind::Quaternion => Quaternion::from_yaw_degrees(n as f32 * 15.0).into(),
            ValueKind::Bool => (n % 2 == 0).into(),
            ValueKind::Float => (n as f32 * 0.25).into(),
            ValueKind::UInt => n.into(),
        }
    }

    fn visible(&self) -> Vec<Option<PropertyValue>> {
        ProbeSchema::PROPERTIES
            .iter()
            .map(|p| self.writer.get(p.id))
            .collect()
    }

    fn write(&mut self) {
        let index = self.rng.gen_range(0..ProbeSchema::PROPERTIES.len());
        let descriptor = &ProbeSchema::PROPERTIES[index];
        let value = self.random_value(descriptor.kind);

        if self.writer.set(descriptor.id, value).is_err() || self.writer.get(descriptor.id) != Some(value) {
            self.result.read_your_writes_violations += 1;
        }
    }

    fn flush(&mut self) {
        let before = self.visible();
        let roll: f64 = self.rng.gen();

        let (ctx, reliable) = if roll < self.config.snapshot_prob {
            (StreamContext::full_snapshot(), false)
        } else if roll < 0.5 {
            (StreamContext::reliable_delta(self.sequence.peek()), true)
        } else {
            (StreamContext::unreliable_delta(), false)
        };

        let expected = self.writer.write_length(&ctx);
        if reliable && expected == 0 {
            return;
        }
        let ctx = if reliable {
            match self.sequence.next_id() {
                Ok(update_id) => StreamContext::reliable_delta(update_id),
                Err(_) => return,
            }
        } else {
            ctx
        };

        let bytes = match self.writer.encode(&ctx) {
            Ok(bytes) => bytes,
            Err(_) => {
                self.result.length_violations += 1;
                return;
            }
        };
        if bytes.len() != expected {
            self.result.length_violations += 1;
        }

        // Echoes of deltas settled by a snapshot still arrive and must be harmless
        if reliable {
            self.outstanding.push_back((ctx.update_id, bytes.clone()));
        }

        self.result.messages += 1;
        if self.mirror.read(&bytes, &ctx).is_err() {
            self.result.length_violations += 1;
        }

        if self.visible() != before {
            self.result.visibility_violations += 1;
        }
    }

    fn echo(&mut self) {
        let Some((update_id, bytes)) = self.outstanding.pop_front() else {
            return;
        };
        let before = self.visible();
        if self.writer.read(&bytes, &StreamContext::reliable_echo(update_id)).is_err() || self.visible() != before {
            self.result.visibility_violations += 1;
        }
    }

    /// Run the fuzzer
    pub fn run(mut self) -> FuzzResult {
        for _ in 0..self.config.operation_count {
            self.result.operations += 1;
            if self.rng.gen::<f64>() < self.config.write_prob {
                self.write();
            } else if self.rng.gen::<f64>() < self.config.echo_prob {
                self.echo();
            } else {
                self.flush();
            }
        }

        self.finish();
        debug!(
            operations = self.result.operations,
            messages = self.result.messages,
            valid = self.result.is_valid(),
            "record fuzz run finished"
        );
        self.result
    }

    /// Drain: flush everything on both channels, echo everything, compare
    fn finish(&mut self) {
        if let Ok(update_id) = self.sequence.next_id() {
            let ctx = StreamContext::reliable_delta(update_id);
            if let Ok(bytes) = self.writer.encode(&ctx) {
                if !bytes.is_empty() {
                    self.outstanding.push_back((ctx.update_id, bytes.clone()));
                    let _ = self.mirror.read(&bytes, &ctx);
                }
            }
        }

        let ctx = StreamContext::unreliable_delta();
        if let Ok(bytes) = self.writer.encode(&ctx) {
            let _ = self.mirror.read(&bytes, &ctx);
        }

        while !self.outstanding.is_empty() {
            self.echo();
        }

        self.result.divergent = ProbeSchema::PROPERTIES
            .iter()
            .filter(|p| self.mirror.canonical(p.id) != self.writer.get(p.id))
            .map(|p| p.id)
            .collect();
    }
}
