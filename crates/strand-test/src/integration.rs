//! End-to-end brush stroke replication
//!
//! A local stroke is drawn along a path while a remote copy follows it:
//! - Reliable deltas travel in order without loss and are echoed back
//! - Unreliable brush tip flushes travel over an impaired channel
//! - Joining observers bootstrap from a full snapshot

use std::time::Duration;

use bytes::Bytes;
use strand_core::{Quaternion, ReplicationConfig, StrandResult, StreamContext, UpdateId, UpdateIdSequence, Vector3};
use strand_state::{BrushStroke, StrokeObserver};
use tracing::debug;

use crate::channel::{ChannelConfig, LossyChannel};

/// Local stroke, remote stroke and the links between them
pub struct StrokeSession {
    local: BrushStroke,
    remote: BrushStroke,
    sequence: UpdateIdSequence,
    reliable: LossyChannel<(UpdateId, Bytes)>,
    echo: LossyChannel<(UpdateId, Bytes)>,
    unreliable: LossyChannel<Bytes>,
    tick: Duration,
}

impl StrokeSession {
    /// Start a stroke at `position`; the remote joins from a full snapshot
    pub fn begin(
        position: Vector3,
        rotation: Quaternion,
        unreliable: ChannelConfig,
        seed: u64,
    ) -> StrandResult<Self> {
        let mut local = BrushStroke::with_config(ReplicationConfig::default());
        local.begin(position, rotation);
        let snapshot = local.encode(&StreamContext::full_snapshot())?;
        let remote = BrushStroke::from_snapshot(&snapshot, ReplicationConfig::default())?;

        Ok(StrokeSession {
            local,
            remote,
            sequence: UpdateIdSequence::new(),
            reliable: LossyChannel::new(ChannelConfig::perfect(), seed),
            echo: LossyChannel::new(ChannelConfig::perfect(), seed.wrapping_add(1)),
            unreliable: LossyChannel::new(unreliable, seed.wrapping_add(2)),
            tick: Duration::from_millis(10),
        })
    }

    pub fn local(&self) -> &BrushStroke {
        &self.local
    }

    pub fn remote(&self) -> &BrushStroke {
        &self.remote
    }

    /// Register a renderer on the remote side
    pub fn observe_remote(&mut self, observer: Box<dyn StrokeObserver>) {
        self.remote.add_observer(observer);
    }

    pub fn move_tip(&mut self, position: Vector3, rotation: Quaternion) {
        self.local.move_tip(position, rotation);
    }

    pub fn end(&mut self, position: Vector3, rotation: Quaternion) {
        self.local.end(position, rotation);
    }

    /// Advance both strokes by one tick and exchange messages
    pub fn step(&mut self) -> StrandResult<()> {
        let dt = self.tick.as_secs_f32();
        self.local.tick(dt);

        let ctx = StreamContext::reliable_delta(self.sequence.peek());
        if self.local.write_length(&ctx) > 0 {
            let update_id = self.sequence.next_id()?;
            let payload = self.local.encode(&StreamContext::reliable_delta(update_id))?;
            self.reliable.send((update_id, payload));
        }
        let payload = self.local.encode(&StreamContext::unreliable_delta())?;
        if !payload.is_empty() {
            self.unreliable.send(payload);
        }

        for (update_id, payload) in self.reliable.tick(self.tick) {
            self.remote.read(&payload, &StreamContext::reliable_delta(update_id))?;
            self.echo.send((update_id, payload));
        }
        for payload in self.unreliable.tick(self.tick) {
            self.remote.read(&payload, &StreamContext::unreliable_delta())?;
        }
        for (update_id, payload) in self.echo.tick(self.tick) {
            self.local.read(&payload, &StreamContext::reliable_echo(update_id))?;
        }

        self.remote.tick(dt);
        Ok(())
    }

    /// Step until every reliable delta has been delivered and echoed.
    /// Brush tip flushes never stop, so the unreliable link is not waited on.
    pub fn drain(&mut self, max_steps: usize) -> StrandResult<bool> {
        for _ in 0..max_steps {
            self.step()?;
            if self.reliable.pending() == 0 && self.echo.pending() == 0 {
                debug!(points = self.remote.ribbon_points().len(), "stroke session drained");
                return Ok(true);
            }
        }
        Ok(false)
    }

    /// Local ribbon points the remote does not hold identically
    pub fn mismatched_points(&self) -> Vec<usize> {
        let local = self.local.ribbon_points();
        let remote = self.remote.ribbon_points();
        (0..local.len().max(remote.len()))
            .filter(|&i| match (local.get(i), remote.get(i)) {
                (Some(a), Some(b)) => a.position() != b.position() || a.rotation() != b.rotation(),
                _ => true,
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logging::init_test_logging;
    use parking_lot::Mutex;
    use std::sync::Arc;

    struct PointLog {
        points: Arc<Mutex<Vec<(usize, Vector3)>>>,
        finalized: Arc<Mutex<bool>>,
    }

    impl StrokeObserver for PointLog {
        fn point_inserted(&mut self, index: usize, position: Vector3, _rotation: Quaternion) {
            self.points.lock().push((index, position));
        }

        fn last_point_updated(&mut self, _position: Vector3, _rotation: Quaternion) {}

        fn stroke_finalized(&mut self) {
            *self.finalized.lock() = true;
        }
    }

    fn draw_line(session: &mut StrokeSession, steps: usize) {
        for i in 1..=steps {
            let position = Vector3::new(i as f32 * 0.02, 0.0, 0.0);
            session.move_tip(position, Quaternion::from_yaw_degrees(i as f32));
            session.step().unwrap();
        }
    }

    #[test]
    fn test_remote_stroke_matches_local() {
        init_test_logging();
        let mut session =
            StrokeSession::begin(Vector3::ZERO, Quaternion::IDENTITY, ChannelConfig::perfect(), 1).unwrap();

        let points = Arc::new(Mutex::new(Vec::new()));
        let finalized = Arc::new(Mutex::new(false));
        session.observe_remote(Box::new(PointLog {
            points: Arc::clone(&points),
            finalized: Arc::clone(&finalized),
        }));

        draw_line(&mut session, 50);
        session.end(Vector3::new(1.1, 0.0, 0.0), Quaternion::IDENTITY);
        assert!(session.drain(100).unwrap());

        assert!(session.local().ribbon_points().len() > 10);
        assert!(session.mismatched_points().is_empty());
        assert!(session.remote().is_finalized());
        assert!(*finalized.lock());

        let indices: Vec<usize> = points.lock().iter().map(|(i, _)| *i).collect();
        assert_eq!(indices, (0..session.remote().ribbon_points().len()).collect::<Vec<_>>());

        // every reliable delta was echoed
        assert!(session.local().model().in_flight().is_empty());
        assert!(session
            .local()
            .ribbon_points()
            .iter()
            .all(|point| point.in_flight().is_empty()));
    }

    #[test]
    fn test_lossy_tip_channel_still_converges_points() {
        let mut session =
            StrokeSession::begin(Vector3::ZERO, Quaternion::IDENTITY, ChannelConfig::hostile(), 9).unwrap();

        draw_line(&mut session, 80);
        session.end(Vector3::new(1.7, 0.0, 0.0), Quaternion::IDENTITY);
        assert!(session.drain(1_000).unwrap());

        // ribbon points ride the reliable path; only the tip is exposed to loss
        assert!(session.mismatched_points().is_empty());
        assert!(session.remote().is_finalized());
    }
}
