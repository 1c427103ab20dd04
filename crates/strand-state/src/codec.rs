//! Delta codec - property table driven encode/decode
//!
//! Length functions mirror the writers exactly. A record computes its length
//! first, writes second, and the two must agree byte for byte.

use strand_core::{PropertyId, StrandResult};
use strand_wire::{entry_len, value_entry_len, PropertyValue, ReadStream, WriteStream};
use tracing::trace;

use crate::Schema;

/// Size of a full snapshot. Depends only on the table, never on values.
pub fn full_length<S: Schema>() -> usize {
    S::PROPERTIES
        .iter()
        .map(|p| entry_len(p.id, p.kind.encoded_len()))
        .sum()
}

/// Size of a run of entries
pub fn entries_length<'a, I>(entries: I) -> usize
where
    I: IntoIterator<Item = (&'a PropertyId, &'a PropertyValue)>,
{
    entries
        .into_iter()
        .map(|(id, value)| value_entry_len(*id, value))
        .sum()
}

/// Write a run of entries in iteration order
pub fn write_entries<'a, I>(stream: &mut WriteStream, entries: I)
where
    I: IntoIterator<Item = (&'a PropertyId, &'a PropertyValue)>,
{
    for (id, value) in entries {
        stream.write_value(*id, value);
    }
}

/// A fully parsed record message, not yet applied
#[derive(Clone, Debug, Default, PartialEq)]
pub struct DecodedMessage {
    /// Recognized properties in wire order
    pub values: Vec<(PropertyId, PropertyValue)>,
    /// Entries skipped because their id is not in the table
    pub skipped: u32,
}

/// Parse a record message against `S`'s table.
///
/// Unknown ids are skipped by their declared length. Any framing or payload
/// error fails the whole message; nothing is returned for partial input.
pub fn decode<S: Schema>(bytes: &[u8]) -> StrandResult<DecodedMessage> {
    let mut message = DecodedMessage::default();

    for entry in ReadStream::new(bytes) {
        let raw = entry?;
        match S::descriptor(raw.id) {
            Some(descriptor) => {
                let value = PropertyValue::decode(descriptor.kind, raw.id, raw.payload)?;
                message.values.push((raw.id, value));
            }
            None => {
                trace!(
                    schema = S::NAME,
                    property = %raw.id,
                    len = raw.payload.len(),
                    "skipping unknown property"
                );
                message.skipped += 1;
            }
        }
    }

    Ok(message)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::PropertyDescriptor;
    use strand_core::{Quaternion, StrandError, Vector3};

    struct Point;

    impl Schema for Point {
        const NAME: &'static str = "Point";
        const PROPERTIES: &'static [PropertyDescriptor] = &[
            PropertyDescriptor::reliable(1, "position", PropertyValue::Vector3(Vector3::ZERO)),
            PropertyDescriptor::reliable(2, "rotation", PropertyValue::Quaternion(Quaternion::IDENTITY)),
        ];
    }

    #[test]
    fn test_full_length() {
        // (1 + 4 + 12) + (1 + 4 + 16)
        assert_eq!(full_length::<Point>(), 38);
    }

    #[test]
    fn test_unknown_property_skipped_then_known_applied() {
        let mut stream = WriteStream::new();
        stream.write_bytes(PropertyId::new(99), &[0xDE, 0xAD, 0xBE, 0xEF]);
        stream.write_value(
            PropertyId::new(1),
            &PropertyValue::Vector3(Vector3::new(4.0, 5.0, 6.0)),
        );

        let message = decode::<Point>(stream.as_slice()).unwrap();

        assert_eq!(message.skipped, 1);
        assert_eq!(
            message.values,
            vec![(PropertyId::new(1), PropertyValue::Vector3(Vector3::new(4.0, 5.0, 6.0)))]
        );
    }

    #[test]
    fn test_known_property_with_wrong_size_fails() {
        let mut stream = WriteStream::new();
        stream.write_bytes(PropertyId::new(2), &[0u8; 12]);

        assert_eq!(
            decode::<Point>(stream.as_slice()),
            Err(StrandError::InvalidPayload {
                property: PropertyId::new(2),
                expected: 16,
                actual: 12,
            })
        );
    }

    #[test]
    fn test_entries_length_matches_write() {
        let entries = [
            (PropertyId::new(1), PropertyValue::Vector3(Vector3::new(1.0, 0.0, 0.0))),
            (PropertyId::new(300), PropertyValue::Bool(true)),
        ];
        let refs = entries.iter().map(|(id, v)| (id, v));

        let mut stream = WriteStream::new();
        write_entries(&mut stream, refs.clone());

        assert_eq!(stream.len(), entries_length(refs));
    }

    #[test]
    fn test_empty_input_decodes_to_nothing() {
        assert_eq!(decode::<Point>(&[]).unwrap(), DecodedMessage::default());
    }
}
