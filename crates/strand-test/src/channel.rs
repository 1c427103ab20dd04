//! Lossy channel simulation
//!
//! Models the conditions record messages travel through:
//! - Latency with jitter
//! - Random and burst loss
//! - Reordering
//! - Duplication

use std::collections::VecDeque;
use std::time::Duration;

use rand::distributions::{Distribution, Uniform};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

/// Jitter distribution type
#[derive(Clone, Debug)]
pub enum JitterDistribution {
    /// No jitter
    None,
    /// Uniform distribution
    Uniform { min_ms: u32, max_ms: u32 },
    /// Pareto distribution (heavy tail)
    Pareto { scale_ms: f64, shape: f64 },
}

impl JitterDistribution {
    /// Sample a jitter value
    pub fn sample(&self, rng: &mut StdRng) -> Duration {
        match self {
            JitterDistribution::None => Duration::ZERO,
            JitterDistribution::Uniform { min_ms, max_ms } => {
                if max_ms <= min_ms {
                    return Duration::from_millis(*min_ms as u64);
                }
                let dist = Uniform::new(*min_ms, *max_ms);
                Duration::from_millis(dist.sample(rng) as u64)
            }
            JitterDistribution::Pareto { scale_ms, shape } => {
                let u: f64 = rng.gen_range(f64::EPSILON..1.0);
                let value = scale_ms / u.powf(1.0 / shape);
                Duration::from_millis(value.min(1000.0) as u64) // Cap at 1 second
            }
        }
    }
}

/// Channel impairment configuration
#[derive(Clone, Debug)]
pub struct ChannelConfig {
    /// Base latency
    pub base_latency: Duration,
    /// Jitter distribution
    pub jitter: JitterDistribution,
    /// Packet loss rate (0.0 - 1.0)
    pub loss_rate: f64,
    /// Burst loss probability
    pub burst_loss_prob: f64,
    /// Burst loss length range
    pub burst_length: (u32, u32),
    /// Reorder probability
    pub reorder_prob: f64,
    /// Reorder depth (max packets to jump)
    pub reorder_depth: u32,
    /// Duplicate probability
    pub duplicate_prob: f64,
}

impl Default for ChannelConfig {
    fn default() -> Self {
        ChannelConfig::lossy()
    }
}

impl ChannelConfig {
    /// Lossless, in-order, fixed latency
    pub fn perfect() -> Self {
        ChannelConfig {
            base_latency: Duration::from_millis(20),
            jitter: JitterDistribution::None,
            loss_rate: 0.0,
            burst_loss_prob: 0.0,
            burst_length: (0, 0),
            reorder_prob: 0.0,
            reorder_depth: 0,
            duplicate_prob: 0.0,
        }
    }

    /// Everyday wireless link
    pub fn lossy() -> Self {
        ChannelConfig {
            base_latency: Duration::from_millis(50),
            jitter: JitterDistribution::Uniform {
                min_ms: 0,
                max_ms: 50,
            },
            loss_rate: 0.05,
            burst_loss_prob: 0.02,
            burst_length: (2, 5),
            reorder_prob: 0.05,
            reorder_depth: 3,
            duplicate_prob: 0.02,
        }
    }

    /// Hostile conditions
    pub fn hostile() -> Self {
        ChannelConfig {
            base_latency: Duration::from_millis(150),
            jitter: JitterDistribution::Pareto {
                scale_ms: 50.0,
                shape: 1.5,
            },
            loss_rate: 0.2,
            burst_loss_prob: 0.05,
            burst_length: (3, 8),
            reorder_prob: 0.2,
            reorder_depth: 8,
            duplicate_prob: 0.05,
        }
    }
}

#[derive(Clone, Debug)]
struct InFlight<T> {
    payload: T,
    delivery_time: Duration,
    send_time: Duration,
}

/// Channel statistics
#[derive(Clone, Debug, Default)]
pub struct ChannelStats {
    pub packets_sent: u64,
    pub packets_delivered: u64,
    pub packets_lost: u64,
    pub packets_reordered: u64,
    pub packets_duplicated: u64,
    pub total_latency_ms: u64,
    pub max_latency_ms: u64,
}

impl ChannelStats {
    pub fn loss_rate(&self) -> f64 {
        if self.packets_sent == 0 {
            0.0
        } else {
            self.packets_lost as f64 / self.packets_sent as f64
        }
    }

    pub fn avg_latency_ms(&self) -> f64 {
        if self.packets_delivered == 0 {
            0.0
        } else {
            self.total_latency_ms as f64 / self.packets_delivered as f64
        }
    }
}

/// One-way impaired channel carrying `T`
pub struct LossyChannel<T> {
    config: ChannelConfig,
    rng: StdRng,
    in_flight: VecDeque<InFlight<T>>,
    current_time: Duration,
    burst_remaining: u32,
    stats: ChannelStats,
}

impl<T: Clone> LossyChannel<T> {
    /// Create a channel with a deterministic seed
    pub fn new(config: ChannelConfig, seed: u64) -> Self {
        LossyChannel {
            config,
            rng: StdRng::seed_from_u64(seed),
            in_flight: VecDeque::new(),
            current_time: Duration::ZERO,
            burst_remaining: 0,
            stats: ChannelStats::default(),
        }
    }

    pub fn send(&mut self, payload: T) {
        self.stats.packets_sent += 1;

        if self.should_drop() {
            self.stats.packets_lost += 1;
            return;
        }

        let jitter = self.config.jitter.sample(&mut self.rng);
        let delivery_time = self.current_time + self.config.base_latency + jitter;

        if self.rng.gen::<f64>() < self.config.duplicate_prob {
            let extra = self.config.jitter.sample(&mut self.rng);
            self.enqueue(InFlight {
                payload: payload.clone(),
                delivery_time: delivery_time + extra,
                send_time: self.current_time,
            });
            self.stats.packets_duplicated += 1;
        }

        let packet = InFlight {
            payload,
            delivery_time,
            send_time: self.current_time,
        };

        if self.rng.gen::<f64>() < self.config.reorder_prob && !self.in_flight.is_empty() {
            // Jump ahead of up to `reorder_depth` queued packets
            let depth = self.config.reorder_depth.min(self.in_flight.len() as u32);
            let jump = self.rng.gen_range(0..=depth) as usize;
            let pos = self.in_flight.len().saturating_sub(jump);
            self.in_flight.insert(pos, packet);
            self.stats.packets_reordered += 1;
        } else {
            self.enqueue(packet);
        }
    }

    fn enqueue(&mut self, packet: InFlight<T>) {
        self.in_flight.push_back(packet);
    }

    fn should_drop(&mut self) -> bool {
        if self.burst_remaining > 0 {
            self.burst_remaining -= 1;
            return true;
        }

        if self.config.burst_loss_prob > 0.0 && self.rng.gen::<f64>() < self.config.burst_loss_prob {
            let (min, max) = self.config.burst_length;
            self.burst_remaining = self.rng.gen_range(min..=max.max(min));
            return true;
        }

        self.config.loss_rate > 0.0 && self.rng.gen::<f64>() < self.config.loss_rate
    }

    /// Advance time and collect everything due.
    /// Delivery is in queue order; a late packet holds back the ones behind it.
    pub fn tick(&mut self, dt: Duration) -> Vec<T> {
        self.current_time += dt;

        let mut delivered = Vec::new();
        while self
            .in_flight
            .front()
            .is_some_and(|p| p.delivery_time <= self.current_time)
        {
            let Some(packet) = self.in_flight.pop_front() else {
                break;
            };
            let latency = (self.current_time - packet.send_time).as_millis() as u64;

            self.stats.packets_delivered += 1;
            self.stats.total_latency_ms += latency;
            self.stats.max_latency_ms = self.stats.max_latency_ms.max(latency);

            delivered.push(packet.payload);
        }

        delivered
    }

    /// Packets queued but not yet delivered
    pub fn pending(&self) -> usize {
        self.in_flight.len()
    }

    pub fn stats(&self) -> &ChannelStats {
        &self.stats
    }

    pub fn current_time(&self) -> Duration {
        self.current_time
    }
}
