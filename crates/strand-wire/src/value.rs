//! Typed property values and their fixed-width encodings
//!
//! All numeric fields are little-endian. No quantization or compression:
//! - Vector3: x, y, z as f32 (12 bytes)
//! - Quaternion: x, y, z, w as f32 (16 bytes)
//! - Bool: 1 byte (0 or 1)
//! - Float: f32 (4 bytes)
//! - UInt: u32 (4 bytes)

use bytes::{Buf, BufMut};
use strand_core::{PropertyId, Quaternion, StrandError, StrandResult, Vector3};

/// Semantic type of a property
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValueKind {
    Vector3,
    Quaternion,
    Bool,
    Float,
    UInt,
}

impl ValueKind {
    /// Payload size on the wire
    #[inline]
    pub const fn encoded_len(self) -> usize {
        match self {
            ValueKind::Vector3 => 12,
            ValueKind::Quaternion => 16,
            ValueKind::Bool => 1,
            ValueKind::Float => 4,
            ValueKind::UInt => 4,
        }
    }

    pub const fn name(self) -> &'static str {
        match self {
            ValueKind::Vector3 => "Vector3",
            ValueKind::Quaternion => "Quaternion",
            ValueKind::Bool => "Bool",
            ValueKind::Float => "Float",
            ValueKind::UInt => "UInt",
        }
    }
}

/// Value of a single replicated property
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PropertyValue {
    Vector3(Vector3),
    Quaternion(Quaternion),
    Bool(bool),
    Float(f32),
    UInt(u32),
}

impl PropertyValue {
    pub fn kind(&self) -> ValueKind {
        match self {
            PropertyValue::Vector3(_) => ValueKind::Vector3,
            PropertyValue::Quaternion(_) => ValueKind::Quaternion,
            PropertyValue::Bool(_) => ValueKind::Bool,
            PropertyValue::Float(_) => ValueKind::Float,
            PropertyValue::UInt(_) => ValueKind::UInt,
        }
    }

    #[inline]
    pub fn encoded_len(&self) -> usize {
        self.kind().encoded_len()
    }

    /// Append the payload (no entry header)
    pub fn encode<B: BufMut>(&self, buf: &mut B) {
        match *self {
            PropertyValue::Vector3(v) => {
                buf.put_f32_le(v.x);
                buf.put_f32_le(v.y);
                buf.put_f32_le(v.z);
            }
            PropertyValue::Quaternion(q) => {
                buf.put_f32_le(q.x);
                buf.put_f32_le(q.y);
                buf.put_f32_le(q.z);
                buf.put_f32_le(q.w);
            }
            PropertyValue::Bool(b) => buf.put_u8(b as u8),
            PropertyValue::Float(f) => buf.put_f32_le(f),
            PropertyValue::UInt(u) => buf.put_u32_le(u),
        }
    }

    /// Decode a payload of `kind` for `property`.
    /// The payload must be exactly `kind.encoded_len()` bytes.
    pub fn decode(kind: ValueKind, property: PropertyId, mut payload: &[u8]) -> StrandResult<Self> {
        let expected = kind.encoded_len();
        if payload.len() != expected {
            return Err(StrandError::InvalidPayload {
                property,
                expected,
                actual: payload.len(),
            });
        }

        let value = match kind {
            ValueKind::Vector3 => PropertyValue::Vector3(Vector3::new(
                payload.get_f32_le(),
                payload.get_f32_le(),
                payload.get_f32_le(),
            )),
            ValueKind::Quaternion => PropertyValue::Quaternion(Quaternion::new(
                payload.get_f32_le(),
                payload.get_f32_le(),
                payload.get_f32_le(),
                payload.get_f32_le(),
            )),
            ValueKind::Bool => PropertyValue::Bool(payload.get_u8() != 0),
            ValueKind::Float => PropertyValue::Float(payload.get_f32_le()),
            ValueKind::UInt => PropertyValue::UInt(payload.get_u32_le()),
        };

        Ok(value)
    }

    pub fn as_vector3(&self) -> Option<Vector3> {
        match *self {
            PropertyValue::Vector3(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_quaternion(&self) -> Option<Quaternion> {
        match *self {
            PropertyValue::Quaternion(q) => Some(q),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match *self {
            PropertyValue::Bool(b) => Some(b),
            _ => None,
        }
    }

    pub fn as_float(&self) -> Option<f32> {
        match *self {
            PropertyValue::Float(f) => Some(f),
            _ => None,
        }
    }

    pub fn as_uint(&self) -> Option<u32> {
        match *self {
            PropertyValue::UInt(u) => Some(u),
            _ => None,
        }
    }
}

impl From<Vector3> for PropertyValue {
    fn from(v: Vector3) -> Self {
        PropertyValue::Vector3(v)
    }
}

impl From<Quaternion> for PropertyValue {
    fn from(q: Quaternion) -> Self {
        PropertyValue::Quaternion(q)
    }
}

impl From<bool> for PropertyValue {
    fn from(b: bool) -> Self {
        PropertyValue::Bool(b)
    }
}

impl From<f32> for PropertyValue {
    fn from(f: f32) -> Self {
        PropertyValue::Float(f)
    }
}

impl From<u32> for PropertyValue {
    fn from(u: u32) -> Self {
        PropertyValue::UInt(u)
    }
}
