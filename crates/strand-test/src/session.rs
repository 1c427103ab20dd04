//! Relay session simulator
//!
//! One writer, one relay, two lossy channels:
//! - uplink: writer -> relay, reliable deltas and unreliable flushes
//! - downlink: relay -> writer, echoes of consumed reliable deltas
//!
//! Reliable delivery is rebuilt on top of the lossy channels the way a
//! session layer would: in-order release by update id on both ends, and
//! retransmission from the writer's in-flight ledger until the echo arrives.

use std::collections::BTreeMap;
use std::time::Duration;

use bytes::Bytes;
use strand_core::{
    PropertyId, ReplicationConfig, StrandResult, StreamContext, UpdateId, UpdateIdSequence,
};
use strand_state::{ReplicatedRecord, Schema};
use tracing::{debug, trace, warn};

use crate::channel::{ChannelConfig, LossyChannel};
use crate::ordered::OrderedReceiver;

/// Message on a simulated link
#[derive(Clone, Debug)]
pub enum Packet {
    Reliable { update_id: UpdateId, payload: Bytes },
    Unreliable { payload: Bytes },
}

/// Session configuration
#[derive(Clone, Debug)]
pub struct SessionConfig {
    pub uplink: ChannelConfig,
    pub downlink: ChannelConfig,
    /// Simulated time per step
    pub tick: Duration,
    /// Resend an un-echoed reliable delta after this long
    pub retransmit_after: Duration,
    pub replication: ReplicationConfig,
    pub seed: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        SessionConfig {
            uplink: ChannelConfig::lossy(),
            downlink: ChannelConfig::lossy(),
            tick: Duration::from_millis(10),
            retransmit_after: Duration::from_millis(250),
            replication: ReplicationConfig::lossy(),
            seed: 42,
        }
    }
}

impl SessionConfig {
    pub fn perfect() -> Self {
        SessionConfig {
            uplink: ChannelConfig::perfect(),
            downlink: ChannelConfig::perfect(),
            ..Default::default()
        }
    }

    pub fn hostile() -> Self {
        SessionConfig {
            uplink: ChannelConfig::hostile(),
            downlink: ChannelConfig::hostile(),
            retransmit_after: Duration::from_millis(600),
            ..Default::default()
        }
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = seed;
        self
    }
}

/// Session statistics
#[derive(Clone, Debug, Default)]
pub struct SessionStats {
    pub deltas_sent: u64,
    pub retransmissions: u64,
    pub echoes_applied: u64,
    pub unreliable_applied: u64,
    /// Deltas evicted from the ledger before their echo arrived
    pub evicted: u64,
    pub decode_errors: u64,
}

/// Writer and relay copies of one record, connected by lossy links
pub struct RelaySession<S: Schema> {
    config: SessionConfig,
    writer: ReplicatedRecord<S>,
    relay: ReplicatedRecord<S>,
    sequence: UpdateIdSequence,
    /// Un-echoed update ids and when they were last sent
    unacked: BTreeMap<UpdateId, Duration>,
    uplink: LossyChannel<Packet>,
    downlink: LossyChannel<Packet>,
    relay_rx: OrderedReceiver<Bytes>,
    echo_rx: OrderedReceiver<Bytes>,
    now: Duration,
    stats: SessionStats,
}

impl<S: Schema> RelaySession<S> {
    /// Start a session; the relay joins from a full snapshot of a fresh writer
    pub fn new(config: SessionConfig) -> StrandResult<Self> {
        let mut writer = ReplicatedRecord::with_config(config.replication.clone());
        let snapshot = writer.encode(&StreamContext::full_snapshot())?;
        let relay = ReplicatedRecord::from_snapshot(&snapshot, config.replication.clone())?;
        let sequence = UpdateIdSequence::new();
        let first = sequence.peek();

        Ok(RelaySession {
            uplink: LossyChannel::new(config.uplink.clone(), config.seed),
            downlink: LossyChannel::new(config.downlink.clone(), config.seed.wrapping_add(1)),
            config,
            writer,
            relay,
            sequence,
            unacked: BTreeMap::new(),
            relay_rx: OrderedReceiver::new(first),
            echo_rx: OrderedReceiver::new(first),
            now: Duration::ZERO,
            stats: SessionStats::default(),
        })
    }

    pub fn writer(&self) -> &ReplicatedRecord<S> {
        &self.writer
    }

    pub fn writer_mut(&mut self) -> &mut ReplicatedRecord<S> {
        &mut self.writer
    }

    pub fn relay(&self) -> &ReplicatedRecord<S> {
        &self.relay
    }

    pub fn stats(&self) -> &SessionStats {
        &self.stats
    }

    pub fn now(&self) -> Duration {
        self.now
    }

    /// Reliable deltas still waiting for their echo
    pub fn unacked(&self) -> usize {
        self.unacked.len()
    }

    /// Advance one tick: flush, retransmit, deliver both directions
    pub fn step(&mut self) -> StrandResult<()> {
        self.now += self.config.tick;
        self.flush()?;
        self.retransmit();

        for packet in self.uplink.tick(self.config.tick) {
            self.relay_receive(packet);
        }
        for packet in self.downlink.tick(self.config.tick) {
            self.writer_receive(packet);
        }
        Ok(())
    }

    fn flush(&mut self) -> StrandResult<()> {
        let ctx = StreamContext::reliable_delta(self.sequence.peek());
        if self.writer.write_length(&ctx) > 0 {
            let update_id = self.sequence.next_id()?;
            let payload = self.writer.encode(&StreamContext::reliable_delta(update_id))?;
            trace!(update = %update_id, len = payload.len(), "reliable delta sent");
            self.unacked.insert(update_id, self.now);
            self.uplink.send(Packet::Reliable { update_id, payload });
            self.stats.deltas_sent += 1;
        }

        let payload = self.writer.encode(&StreamContext::unreliable_delta())?;
        if !payload.is_empty() {
            self.uplink.send(Packet::Unreliable { payload });
        }
        Ok(())
    }

    fn retransmit(&mut self) {
        let due: Vec<UpdateId> = self
            .unacked
            .iter()
            .filter(|(_, sent)| self.now.saturating_sub(**sent) >= self.config.retransmit_after)
            .map(|(id, _)| *id)
            .collect();

        for update_id in due {
            let payload = match self.writer.rewrite_in_flight(update_id) {
                Some(payload) => payload,
                None => {
                    // Keep the stream moving; the values already live in canonical state
                    warn!(update = %update_id, "in-flight delta evicted before echo");
                    self.stats.evicted += 1;
                    Bytes::new()
                }
            };
            self.unacked.insert(update_id, self.now);
            self.uplink.send(Packet::Reliable { update_id, payload });
            self.stats.retransmissions += 1;
        }
    }

    fn relay_receive(&mut self, packet: Packet) {
        match packet {
            Packet::Reliable { update_id, payload } => {
                if self.relay_rx.has_released(update_id) {
                    // Consumed already; the echo must have been lost
                    self.downlink.send(Packet::Reliable { update_id, payload });
                    return;
                }
                for (update_id, payload) in self.relay_rx.accept(update_id, payload) {
                    if let Err(e) = self.relay.read(&payload, &StreamContext::reliable_delta(update_id)) {
                        warn!(update = %update_id, error = %e, "relay dropped reliable delta");
                        self.stats.decode_errors += 1;
                    }
                    self.downlink.send(Packet::Reliable { update_id, payload });
                }
            }
            Packet::Unreliable { payload } => {
                match self.relay.read(&payload, &StreamContext::unreliable_delta()) {
                    Ok(_) => self.stats.unreliable_applied += 1,
                    Err(e) => {
                        warn!(error = %e, "relay dropped unreliable flush");
                        self.stats.decode_errors += 1;
                    }
                }
            }
        }
    }

    fn writer_receive(&mut self, packet: Packet) {
        let Packet::Reliable { update_id, payload } = packet else {
            return;
        };

        for (update_id, payload) in self.echo_rx.accept(update_id, payload) {
            if let Err(e) = self.writer.read(&payload, &StreamContext::reliable_echo(update_id)) {
                warn!(update = %update_id, error = %e, "writer dropped echo");
                self.stats.decode_errors += 1;
            }
            self.unacked.remove(&update_id);
            self.stats.echoes_applied += 1;
        }
    }

    /// Step until every reliable delta is echoed or `max_steps` runs out
    pub fn run_until_settled(&mut self, max_steps: usize) -> StrandResult<bool> {
        for _ in 0..max_steps {
            self.step()?;
            if self.unacked.is_empty() && self.writer.in_flight().is_empty() {
                debug!(now_ms = self.now.as_millis() as u64, "session settled");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Properties whose relay copy differs from what the writer sees
    pub fn diverging(&self, include_unreliable: bool) -> Vec<PropertyId> {
        S::PROPERTIES
            .iter()
            .filter(|p| include_unreliable || p.reliable)
            .filter(|p| self.relay.canonical(p.id) != self.writer.get(p.id))
            .map(|p| p.id)
            .collect()
    }
}
