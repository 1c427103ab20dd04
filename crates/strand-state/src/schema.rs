//! Static property tables
//!
//! Every record type declares its properties once, at compile time. The codec
//! and the record iterate the table instead of reflecting over fields.

use strand_core::PropertyId;
use strand_wire::{PropertyValue, ValueKind};

/// Declaration of one replicated property
#[derive(Clone, Copy, Debug)]
pub struct PropertyDescriptor {
    pub id: PropertyId,
    pub name: &'static str,
    pub kind: ValueKind,
    /// Rides the reliable channel and is tracked in flight
    pub reliable: bool,
    /// Value of a freshly created record
    pub default: PropertyValue,
}

impl PropertyDescriptor {
    pub const fn reliable(id: u32, name: &'static str, default: PropertyValue) -> Self {
        PropertyDescriptor {
            id: PropertyId::new(id),
            name,
            kind: kind_of(&default),
            reliable: true,
            default,
        }
    }

    pub const fn unreliable(id: u32, name: &'static str, default: PropertyValue) -> Self {
        PropertyDescriptor {
            id: PropertyId::new(id),
            name,
            kind: kind_of(&default),
            reliable: false,
            default,
        }
    }
}

const fn kind_of(value: &PropertyValue) -> ValueKind {
    match value {
        PropertyValue::Vector3(_) => ValueKind::Vector3,
        PropertyValue::Quaternion(_) => ValueKind::Quaternion,
        PropertyValue::Bool(_) => ValueKind::Bool,
        PropertyValue::Float(_) => ValueKind::Float,
        PropertyValue::UInt(_) => ValueKind::UInt,
    }
}

/// A record type's property table.
///
/// `PROPERTIES` must be sorted by ascending id; encoders rely on it for
/// deterministic property order within a message.
pub trait Schema: 'static {
    const NAME: &'static str;
    const PROPERTIES: &'static [PropertyDescriptor];

    fn descriptor(id: PropertyId) -> Option<&'static PropertyDescriptor> {
        Self::PROPERTIES.iter().find(|p| p.id == id)
    }

    fn is_reliable(id: PropertyId) -> bool {
        Self::descriptor(id).is_some_and(|p| p.reliable)
    }

    /// Check table ordering and default kinds
    fn is_well_formed() -> bool {
        Self::PROPERTIES.windows(2).all(|w| w[0].id < w[1].id)
            && Self::PROPERTIES.iter().all(|p| p.default.kind() == p.kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strand_core::Vector3;

    struct Unsorted;

    impl Schema for Unsorted {
        const NAME: &'static str = "Unsorted";
        const PROPERTIES: &'static [PropertyDescriptor] = &[
            PropertyDescriptor::reliable(2, "b", PropertyValue::Bool(false)),
            PropertyDescriptor::reliable(1, "a", PropertyValue::Bool(false)),
        ];
    }

    struct Pair;

    impl Schema for Pair {
        const NAME: &'static str = "Pair";
        const PROPERTIES: &'static [PropertyDescriptor] = &[
            PropertyDescriptor::reliable(1, "origin", PropertyValue::Vector3(Vector3::ZERO)),
            PropertyDescriptor::unreliable(4, "speed", PropertyValue::Float(0.0)),
        ];
    }

    #[test]
    fn test_descriptor_kind_follows_default() {
        let speed = Pair::descriptor(PropertyId::new(4)).unwrap();
        assert_eq!(speed.kind, ValueKind::Float);
        assert!(!speed.reliable);
        assert!(Pair::is_reliable(PropertyId::new(1)));
        assert!(!Pair::is_reliable(PropertyId::new(99)));
    }

    #[test]
    fn test_well_formed() {
        assert!(Pair::is_well_formed());
        assert!(!Unsorted::is_well_formed());
    }
}
