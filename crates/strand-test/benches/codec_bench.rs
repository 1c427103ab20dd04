//! Benchmarks for record encoding and decoding

use criterion::{black_box, criterion_group, criterion_main, Criterion};

use strand_core::{Quaternion, StreamContext, UpdateId, Vector3};
use strand_state::{BrushStroke, RibbonPoint};

fn bench_point_snapshot(c: &mut Criterion) {
    let mut point = RibbonPoint::at(Vector3::new(1.0, 2.0, 3.0), Quaternion::from_yaw_degrees(30.0));

    c.bench_function("point_snapshot_encode", |b| {
        b.iter(|| point.encode(black_box(&StreamContext::full_snapshot())).unwrap())
    });
}

fn bench_point_delta_roundtrip(c: &mut Criterion) {
    let mut writer = RibbonPoint::new();
    let mut reader = RibbonPoint::new();
    let mut next = 1u32;

    c.bench_function("point_delta_roundtrip", |b| {
        b.iter(|| {
            writer.set_position(Vector3::new(next as f32, 0.0, 0.0));
            let ctx = StreamContext::reliable_delta(UpdateId::new(next));
            let bytes = writer.encode(&ctx).unwrap();
            reader.read(black_box(&bytes), &ctx).unwrap();
            writer.retire(ctx.update_id);
            next += 1;
        })
    });
}

fn bench_stroke_snapshot_decode(c: &mut Criterion) {
    let mut stroke = BrushStroke::new();
    for i in 1..=256 {
        stroke.begin(Vector3::new(i as f32 * 0.02, 0.0, 0.0), Quaternion::IDENTITY);
        stroke.add_ribbon_point_if_needed();
    }
    let snapshot = stroke.encode(&StreamContext::full_snapshot()).unwrap();

    c.bench_function("stroke_snapshot_decode_256", |b| {
        b.iter(|| {
            let remote = BrushStroke::from_snapshot(black_box(&snapshot), Default::default()).unwrap();
            black_box(remote)
        })
    });
}

criterion_group!(
    benches,
    bench_point_snapshot,
    bench_point_delta_roundtrip,
    bench_stroke_snapshot_decode
);
criterion_main!(benches);
