//! Ribbon point - one replicated sample along a brush stroke

use strand_core::{PropertyId, Quaternion, Vector3};
use strand_wire::PropertyValue;

use crate::{PropertyDescriptor, ReplicatedRecord, Schema};

/// Property table for a ribbon point
#[derive(Clone, Copy, Debug, Default)]
pub struct RibbonPointSchema;

impl RibbonPointSchema {
    pub const POSITION: PropertyId = PropertyId::new(1);
    pub const ROTATION: PropertyId = PropertyId::new(2);
}

impl Schema for RibbonPointSchema {
    const NAME: &'static str = "RibbonPoint";
    const PROPERTIES: &'static [PropertyDescriptor] = &[
        PropertyDescriptor::reliable(1, "position", PropertyValue::Vector3(Vector3::ZERO)),
        PropertyDescriptor::reliable(2, "rotation", PropertyValue::Quaternion(Quaternion::IDENTITY)),
    ];
}

pub type RibbonPoint = ReplicatedRecord<RibbonPointSchema>;

impl ReplicatedRecord<RibbonPointSchema> {
    pub fn at(position: Vector3, rotation: Quaternion) -> Self {
        let mut point = Self::new();
        point.set_position(position);
        point.set_rotation(rotation);
        point
    }

    pub fn position(&self) -> Vector3 {
        self.get(RibbonPointSchema::POSITION)
            .and_then(|v| v.as_vector3())
            .unwrap_or(Vector3::ZERO)
    }

    pub fn set_position(&mut self, position: Vector3) -> bool {
        self.set_known(RibbonPointSchema::POSITION, position.into())
    }

    pub fn rotation(&self) -> Quaternion {
        self.get(RibbonPointSchema::ROTATION)
            .and_then(|v| v.as_quaternion())
            .unwrap_or(Quaternion::IDENTITY)
    }

    pub fn set_rotation(&mut self, rotation: Quaternion) -> bool {
        self.set_known(RibbonPointSchema::ROTATION, rotation.into())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::{StreamContext, UpdateId};

    #[test]
    fn test_table_is_well_formed() {
        assert!(RibbonPointSchema::is_well_formed());
    }

    #[test]
    fn test_new_point_defaults() {
        let point = RibbonPoint::new();
        assert_eq!(point.position(), Vector3::ZERO);
        assert_eq!(point.rotation(), Quaternion::IDENTITY);
        assert!(!point.is_dirty());
    }

    #[test]
    fn test_identity_rotation_is_not_a_change() {
        let mut point = RibbonPoint::new();
        assert!(point.set_position(Vector3::new(1.0, 2.0, 3.0)));
        assert!(!point.set_rotation(Quaternion::IDENTITY));

        let bytes = point.encode(&StreamContext::reliable_delta(UpdateId::new(1))).unwrap();
        assert_eq!(bytes.len(), 1 + 4 + 12);
    }

    #[test]
    fn test_snapshot_of_default_point_round_trips() {
        let mut point = RibbonPoint::new();
        let bytes = point.encode(&StreamContext::full_snapshot()).unwrap();

        let mut remote = RibbonPoint::new();
        remote.set_position(Vector3::new(7.0, 7.0, 7.0));
        remote.read(&bytes, &StreamContext::full_snapshot()).unwrap();

        assert_eq!(remote.canonical(RibbonPointSchema::POSITION), Some(PropertyValue::Vector3(Vector3::ZERO)));
        assert_eq!(
            remote.canonical(RibbonPointSchema::ROTATION),
            Some(PropertyValue::Quaternion(Quaternion::IDENTITY))
        );
    }
}
