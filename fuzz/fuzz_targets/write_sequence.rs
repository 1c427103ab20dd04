#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;
use strand_core::{Quaternion, ReplicationConfig, StreamContext, UpdateId, Vector3};
use strand_state::RibbonPoint;

#[derive(Arbitrary, Debug)]
enum Op {
    SetPosition(f32, f32, f32),
    SetRotation(f32, f32, f32, f32),
    Snapshot,
    Reliable(u32),
    Unreliable,
    Retire(u32),
}

fuzz_target!(|input: (u8, Vec<Op>)| {
    let (ledger, ops) = input;
    let config = ReplicationConfig::default().with_max_in_flight(ledger as usize);
    let mut writer = RibbonPoint::with_config(config.clone());
    let mut mirror = RibbonPoint::with_config(config);

    for op in ops {
        match op {
            Op::SetPosition(x, y, z) => {
                let value = Vector3::new(x, y, z);
                writer.set_position(value);
                if !x.is_nan() && !y.is_nan() && !z.is_nan() {
                    assert_eq!(writer.position(), value);
                }
            }
            Op::SetRotation(x, y, z, w) => {
                writer.set_rotation(Quaternion::new(x, y, z, w));
            }
            Op::Snapshot => flush(&mut writer, &mut mirror, StreamContext::full_snapshot()),
            Op::Reliable(id) => flush(&mut writer, &mut mirror, StreamContext::reliable_delta(UpdateId::new(id))),
            Op::Unreliable => flush(&mut writer, &mut mirror, StreamContext::unreliable_delta()),
            Op::Retire(id) => {
                writer.retire(UpdateId::new(id));
            }
        }
    }
});

fn flush(writer: &mut RibbonPoint, mirror: &mut RibbonPoint, ctx: StreamContext) {
    let expected = writer.write_length(&ctx);
    match writer.encode(&ctx) {
        Ok(bytes) => {
            assert_eq!(bytes.len(), expected);
            mirror.read(&bytes, &ctx).expect("mirror rejected a well-formed message");
        }
        // Arbitrary ids may go backwards
        Err(e) => assert!(matches!(e, strand_core::StrandError::UpdateIdRegression { .. })),
    }
}
