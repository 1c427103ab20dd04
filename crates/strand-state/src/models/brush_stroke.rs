//! Brush stroke - a replicated brush tip plus its growing ribbon of points
//!
//! The stroke's message is itself a property stream with two entries:
//! - entry 1: the stroke model (brush tip and finalized flag)
//! - entry 2: the ribbon point collection
//!
//! Only the owning side adds ribbon points. Both sides animate the end of the
//! ribbon towards the replicated brush tip on every tick.

use bytes::Bytes;
use strand_core::{
    PropertyId, Quaternion, ReplicationConfig, StrandError, StrandResult, StreamContext, Vector3,
};
use strand_wire::{entry_len, PropertyValue, ReadStream, WriteStream};
use tracing::{debug, error, trace};

use crate::{PropertyDescriptor, RecordCollection, ReplicatedRecord, RibbonPointSchema, Schema};

/// Stroke message entry holding the stroke model
pub const MODEL_ENTRY: PropertyId = PropertyId::new(1);
/// Stroke message entry holding the ribbon point collection
pub const RIBBON_POINTS_ENTRY: PropertyId = PropertyId::new(2);

/// Minimum ribbon end travel before a new point is laid down
pub const POINT_SPACING: f32 = 0.01;
/// Minimum ribbon end rotation (degrees) before a new point is laid down
pub const POINT_ANGLE_DEGREES: f32 = 10.0;
/// Ribbon end catch-up rate, per second
const RIBBON_END_RATE: f32 = 25.0;
const SETTLED_DISTANCE: f32 = 0.0001;
const SETTLED_ANGLE_DEGREES: f32 = 0.01;

/// Property table for the stroke model
#[derive(Clone, Copy, Debug, Default)]
pub struct BrushStrokeSchema;

impl BrushStrokeSchema {
    pub const BRUSH_TIP_POSITION: PropertyId = PropertyId::new(1);
    pub const BRUSH_TIP_ROTATION: PropertyId = PropertyId::new(2);
    pub const FINALIZED: PropertyId = PropertyId::new(3);
}

impl Schema for BrushStrokeSchema {
    const NAME: &'static str = "BrushStroke";
    const PROPERTIES: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::unreliable(1, "brush_tip_position", PropertyValue::Vector3(Vector3::ZERO)),
        PropertyDescriptor::unreliable(
            2,
            "brush_tip_rotation",
            PropertyValue::Quaternion(Quaternion::IDENTITY),
        ),
        PropertyDescriptor::reliable(3, "finalized", PropertyValue::Bool(false)),
    ];
}

impl ReplicatedRecord<BrushStrokeSchema> {
    pub fn brush_tip_position(&self) -> Vector3 {
        self.get(BrushStrokeSchema::BRUSH_TIP_POSITION)
            .and_then(|v| v.as_vector3())
            .unwrap_or(Vector3::ZERO)
    }

    pub fn brush_tip_rotation(&self) -> Quaternion {
        self.get(BrushStrokeSchema::BRUSH_TIP_ROTATION)
            .and_then(|v| v.as_quaternion())
            .unwrap_or(Quaternion::IDENTITY)
    }

    pub fn set_brush_tip(&mut self, position: Vector3, rotation: Quaternion) {
        self.set_known(BrushStrokeSchema::BRUSH_TIP_POSITION, position.into());
        self.set_known(BrushStrokeSchema::BRUSH_TIP_ROTATION, rotation.into());
    }

    pub fn is_finalized(&self) -> bool {
        self.get(BrushStrokeSchema::FINALIZED)
            .and_then(|v| v.as_bool())
            .unwrap_or(false)
    }

    pub fn set_finalized(&mut self, finalized: bool) -> bool {
        self.set_known(BrushStrokeSchema::FINALIZED, finalized.into())
    }
}

/// Renderer-facing stroke events
pub trait StrokeObserver: Send {
    /// A ribbon point was added at `index`
    fn point_inserted(&mut self, index: usize, position: Vector3, rotation: Quaternion);

    /// The animated end of the ribbon moved
    fn last_point_updated(&mut self, position: Vector3, rotation: Quaternion);

    /// The stroke will not grow any further; the animated end should be hidden
    fn stroke_finalized(&mut self) {}
}

/// Outcome of applying one incoming stroke message
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct StrokeReadResult {
    /// Stroke model properties whose canonical value changed
    pub model_changed: Vec<PropertyId>,
    /// Ribbon points created by this message
    pub points_appended: Vec<usize>,
    /// Existing ribbon points whose canonical state changed
    pub points_changed: Vec<usize>,
    /// Reliable entries retired by this message
    pub retired: u32,
}

/// One brush stroke, local or remote
pub struct BrushStroke {
    model: ReplicatedRecord<BrushStrokeSchema>,
    ribbon_points: RecordCollection<RibbonPointSchema>,
    owned_locally: bool,
    ribbon_end_position: Vector3,
    ribbon_end_rotation: Quaternion,
    previous_point_position: Vector3,
    previous_point_rotation: Quaternion,
    observers: Vec<Box<dyn StrokeObserver>>,
}

impl BrushStroke {
    /// A stroke drawn by the local client
    pub fn new() -> Self {
        Self::with_config(ReplicationConfig::default())
    }

    pub fn with_config(config: ReplicationConfig) -> Self {
        BrushStroke {
            model: ReplicatedRecord::with_config(config.clone()),
            ribbon_points: RecordCollection::with_config(config),
            owned_locally: true,
            ribbon_end_position: Vector3::ZERO,
            ribbon_end_rotation: Quaternion::IDENTITY,
            previous_point_position: Vector3::ZERO,
            previous_point_rotation: Quaternion::IDENTITY,
            observers: Vec::new(),
        }
    }

    /// A stroke drawn by a peer, bootstrapped from its full snapshot
    pub fn from_snapshot(bytes: &[u8], config: ReplicationConfig) -> StrandResult<Self> {
        let mut stroke = Self::with_config(config);
        stroke.owned_locally = false;
        stroke.read(bytes, &StreamContext::full_snapshot())?;
        stroke.ribbon_end_position = stroke.model.brush_tip_position();
        stroke.ribbon_end_rotation = stroke.model.brush_tip_rotation();
        Ok(stroke)
    }

    pub fn with_observer(mut self, observer: Box<dyn StrokeObserver>) -> Self {
        self.add_observer(observer);
        self
    }

    /// Register an observer and replay the current ribbon to it
    pub fn add_observer(&mut self, mut observer: Box<dyn StrokeObserver>) {
        for (index, point) in self.ribbon_points.iter().enumerate() {
            observer.point_inserted(index, point.position(), point.rotation());
        }
        observer.last_point_updated(self.ribbon_end_position, self.ribbon_end_rotation);
        if self.is_finalized() {
            observer.stroke_finalized();
        }
        self.observers.push(observer);
    }

    pub fn model(&self) -> &ReplicatedRecord<BrushStrokeSchema> {
        &self.model
    }

    pub fn ribbon_points(&self) -> &RecordCollection<RibbonPointSchema> {
        &self.ribbon_points
    }

    pub fn is_owned_locally(&self) -> bool {
        self.owned_locally
    }

    pub fn is_finalized(&self) -> bool {
        self.model.is_finalized()
    }

    pub fn ribbon_end(&self) -> (Vector3, Quaternion) {
        (self.ribbon_end_position, self.ribbon_end_rotation)
    }

    // Drawing

    /// Start drawing: the ribbon end jumps straight to the brush tip
    pub fn begin(&mut self, position: Vector3, rotation: Quaternion) {
        self.model.set_brush_tip(position, rotation);
        self.ribbon_end_position = position;
        self.ribbon_end_rotation = rotation;
        self.notify_last_point_updated();
    }

    pub fn move_tip(&mut self, position: Vector3, rotation: Quaternion) {
        self.model.set_brush_tip(position, rotation);
    }

    /// Lay down a final point and mark the stroke finalized
    pub fn end(&mut self, position: Vector3, rotation: Quaternion) {
        if self.is_finalized() {
            debug!("brush stroke already finalized");
            return;
        }
        self.add_ribbon_point(position, rotation);
        self.model.set_finalized(true);
        for observer in &mut self.observers {
            observer.stroke_finalized();
        }
    }

    /// Advance the stroke by `dt` seconds. Returns the index of a newly
    /// added ribbon point, if any.
    pub fn tick(&mut self, dt: f32) -> Option<usize> {
        self.animate_ribbon_end(dt);
        self.add_ribbon_point_if_needed()
    }

    fn animate_ribbon_end(&mut self, dt: f32) {
        if self.is_finalized() {
            return;
        }

        let tip_position = self.model.brush_tip_position();
        let tip_rotation = self.model.brush_tip_rotation();
        if self.ribbon_end_position.distance(tip_position) <= SETTLED_DISTANCE
            && self.ribbon_end_rotation.angle(tip_rotation) <= SETTLED_ANGLE_DEGREES
        {
            return;
        }

        let t = RIBBON_END_RATE * dt;
        self.ribbon_end_position = self.ribbon_end_position.lerp(tip_position, t);
        self.ribbon_end_rotation = self.ribbon_end_rotation.slerp(tip_rotation, t);
        self.notify_last_point_updated();
    }

    /// Add a ribbon point at the ribbon end if it has moved or turned far
    /// enough since the previous point. Owner only, never after finalization.
    pub fn add_ribbon_point_if_needed(&mut self) -> Option<usize> {
        if !self.owned_locally || self.is_finalized() {
            return None;
        }

        let moved = self.ribbon_end_position.distance(self.previous_point_position) >= POINT_SPACING;
        let turned = self.ribbon_end_rotation.angle(self.previous_point_rotation) >= POINT_ANGLE_DEGREES;
        if !moved && !turned {
            return None;
        }

        let index = self.add_ribbon_point(self.ribbon_end_position, self.ribbon_end_rotation);
        self.previous_point_position = self.ribbon_end_position;
        self.previous_point_rotation = self.ribbon_end_rotation;
        Some(index)
    }

    fn add_ribbon_point(&mut self, position: Vector3, rotation: Quaternion) -> usize {
        let index = self.ribbon_points.append_new(|point| {
            point.set_position(position);
            point.set_rotation(rotation);
        });
        trace!(index, "ribbon point added");
        for observer in &mut self.observers {
            observer.point_inserted(index, position, rotation);
        }
        index
    }

    fn notify_last_point_updated(&mut self) {
        for observer in &mut self.observers {
            observer.last_point_updated(self.ribbon_end_position, self.ribbon_end_rotation);
        }
    }

    // Encoding

    fn include(ctx: &StreamContext, len: usize) -> bool {
        ctx.full_model || len > 0
    }

    /// Exact byte count `write` will produce for `ctx` if called next
    pub fn write_length(&self, ctx: &StreamContext) -> usize {
        [
            (MODEL_ENTRY, self.model.write_length(ctx)),
            (RIBBON_POINTS_ENTRY, self.ribbon_points.write_length(ctx)),
        ]
        .into_iter()
        .filter(|(_, len)| Self::include(ctx, *len))
        .map(|(id, len)| entry_len(id, len))
        .sum()
    }

    pub fn write(&mut self, stream: &mut WriteStream, ctx: &StreamContext) -> StrandResult<()> {
        if Self::include(ctx, self.model.write_length(ctx)) {
            let model = self.model.encode(ctx)?;
            stream.write_bytes(MODEL_ENTRY, &model);
        }
        if Self::include(ctx, self.ribbon_points.write_length(ctx)) {
            let points = self.ribbon_points.encode(ctx)?;
            stream.write_bytes(RIBBON_POINTS_ENTRY, &points);
        }
        Ok(())
    }

    /// Length-checked encode into a fresh buffer
    pub fn encode(&mut self, ctx: &StreamContext) -> StrandResult<Bytes> {
        let expected = self.write_length(ctx);
        let mut stream = WriteStream::with_capacity(expected);
        self.write(&mut stream, ctx)?;

        if stream.len() != expected {
            error!(expected, actual = stream.len(), "brush stroke encode size mismatch");
            return Err(StrandError::SizeMismatch {
                expected,
                actual: stream.len(),
            });
        }

        Ok(stream.freeze())
    }

    // Decoding

    /// Apply an incoming stroke message. Both entries are parsed in full
    /// before either is applied.
    pub fn read(&mut self, bytes: &[u8], ctx: &StreamContext) -> StrandResult<StrokeReadResult> {
        let mut model = None;
        let mut points = None;

        for entry in ReadStream::new(bytes) {
            let entry = entry?;
            if entry.id == MODEL_ENTRY {
                model = Some(ReplicatedRecord::<BrushStrokeSchema>::stage(entry.payload, ctx)?);
            } else if entry.id == RIBBON_POINTS_ENTRY {
                points = Some(self.ribbon_points.stage(entry.payload, ctx)?);
            } else {
                trace!(entry = %entry.id, "skipping unknown brush stroke entry");
            }
        }

        let was_finalized = self.is_finalized();
        let mut result = StrokeReadResult::default();

        if let Some(staged) = model {
            let applied = self.model.apply(staged);
            if applied.retired {
                result.retired += 1;
            }
            result.model_changed = applied.changed;
        }

        if let Some(staged) = points {
            let applied = self.ribbon_points.apply(staged);
            result.retired += applied.retired;
            for &index in &applied.appended {
                if let Some(point) = self.ribbon_points.get(index) {
                    let (position, rotation) = (point.position(), point.rotation());
                    for observer in &mut self.observers {
                        observer.point_inserted(index, position, rotation);
                    }
                }
            }
            result.points_appended = applied.appended;
            result.points_changed = applied.changed;
        }

        if !was_finalized && self.is_finalized() {
            for observer in &mut self.observers {
                observer.stroke_finalized();
            }
        }

        Ok(result)
    }
}

impl Default for BrushStroke {
    fn default() -> Self {
        Self::new()
    }
}
