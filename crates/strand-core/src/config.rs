//! Replication configuration

/// How unreliable properties are flushed on the unreliable channel
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum UnreliablePolicy {
    /// Write every unreliable property on every flush (latest wins, may be dropped)
    #[default]
    EveryTick,
    /// Write an unreliable property only when it was set since the last flush
    WhenDirty,
}

/// Per-record replication configuration
#[derive(Clone, Debug)]
pub struct ReplicationConfig {
    /// Maximum un-retired reliable deltas kept per record.
    /// The oldest entry is evicted when a push would exceed it.
    pub max_in_flight: usize,
    /// Unreliable channel flush policy
    pub unreliable_policy: UnreliablePolicy,
}

impl Default for ReplicationConfig {
    fn default() -> Self {
        ReplicationConfig {
            max_in_flight: 64,
            unreliable_policy: UnreliablePolicy::EveryTick,
        }
    }
}

impl ReplicationConfig {
    /// Deep ledger for links with long retransmission tails
    pub fn lossy() -> Self {
        ReplicationConfig {
            max_in_flight: 512,
            unreliable_policy: UnreliablePolicy::EveryTick,
        }
    }

    pub fn with_max_in_flight(mut self, max_in_flight: usize) -> Self {
        self.max_in_flight = max_in_flight.max(1);
        self
    }

    pub fn with_unreliable_policy(mut self, policy: UnreliablePolicy) -> Self {
        self.unreliable_policy = policy;
        self
    }
}
