#![no_main]

use libfuzzer_sys::fuzz_target;
use strand_core::{Quaternion, ReplicationConfig, StreamContext, UpdateId, Vector3};
use strand_state::{BrushStroke, RecordCollection, RibbonPoint, RibbonPointSchema};
use strand_wire::ReadStream;

type PointState = (Vector3, Quaternion, usize);

fn point_state(point: &RibbonPoint) -> PointState {
    (point.position(), point.rotation(), point.in_flight().len())
}

fn collection_state(points: &RecordCollection<RibbonPointSchema>) -> Vec<PointState> {
    points.iter().map(point_state).collect()
}

fn stroke_state(stroke: &BrushStroke) -> (bool, Vector3, Quaternion, usize, Vec<PointState>) {
    let model = stroke.model();
    (
        model.is_finalized(),
        model.brush_tip_position(),
        model.brush_tip_rotation(),
        model.in_flight().len(),
        collection_state(stroke.ribbon_points()),
    )
}

/// Point with one reliable delta in flight under update id 1
fn seeded_point() -> RibbonPoint {
    let mut point = RibbonPoint::new();
    point.set_position(Vector3::new(1.0, 2.0, 3.0));
    point
        .encode(&StreamContext::reliable_delta(UpdateId::new(1)))
        .expect("seeding point");
    point.set_rotation(Quaternion::from_yaw_degrees(45.0));
    point
}

fn seeded_collection() -> RecordCollection<RibbonPointSchema> {
    let mut points = RecordCollection::new();
    points.append(RibbonPoint::at(Vector3::new(1.0, 0.0, 0.0), Quaternion::IDENTITY));
    points.append(RibbonPoint::at(Vector3::new(2.0, 0.0, 0.0), Quaternion::IDENTITY));
    points
        .encode(&StreamContext::reliable_delta(UpdateId::new(1)))
        .expect("seeding collection");
    if let Some(point) = points.get_mut(0) {
        point.set_position(Vector3::new(5.0, 0.0, 0.0));
    }
    points
}

fn seeded_stroke() -> BrushStroke {
    let mut stroke = BrushStroke::new();
    stroke.begin(Vector3::new(0.5, 0.0, 0.0), Quaternion::IDENTITY);
    stroke.add_ribbon_point_if_needed();
    stroke
        .encode(&StreamContext::reliable_delta(UpdateId::new(1)))
        .expect("seeding stroke");
    stroke.move_tip(Vector3::new(0.8, 0.0, 0.0), Quaternion::IDENTITY);
    stroke.add_ribbon_point_if_needed();
    stroke
}

fuzz_target!(|data: &[u8]| {
    for _ in ReadStream::new(data) {}

    // Rejected messages apply nothing, in any mode and to any populated state
    for ctx in [
        StreamContext::full_snapshot(),
        StreamContext::reliable_delta(UpdateId::new(1)),
        StreamContext::reliable_echo(UpdateId::new(1)),
        StreamContext::unreliable_delta(),
    ] {
        let mut point = seeded_point();
        let before = point_state(&point);
        if point.read(data, &ctx).is_err() {
            assert_eq!(point_state(&point), before);
        }

        let mut points = seeded_collection();
        let before = collection_state(&points);
        if points.read(data, &ctx).is_err() {
            assert_eq!(collection_state(&points), before);
        }

        let mut stroke = seeded_stroke();
        let before = stroke_state(&stroke);
        if stroke.read(data, &ctx).is_err() {
            assert_eq!(stroke_state(&stroke), before);
        }
    }

    if let Ok(mut stroke) = BrushStroke::from_snapshot(data, ReplicationConfig::default()) {
        let expected = stroke.write_length(&StreamContext::full_snapshot());
        let bytes = stroke
            .encode(&StreamContext::full_snapshot())
            .expect("re-encoding a decoded stroke");
        assert_eq!(bytes.len(), expected);
    }
});
