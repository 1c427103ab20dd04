//! LEB128 varint for property ids

use bytes::BufMut;
use strand_core::{StrandError, StrandResult};

/// Maximum encoded size of a u32 varint
pub const MAX_VARINT_LEN: usize = 5;

/// Encoded size of `value`
#[inline]
pub fn varint_len(value: u32) -> usize {
    match value {
        0..=0x7F => 1,
        0x80..=0x3FFF => 2,
        0x4000..=0x1F_FFFF => 3,
        0x20_0000..=0x0FFF_FFFF => 4,
        _ => 5,
    }
}

/// Append `value` as a varint
pub fn put_varint<B: BufMut>(buf: &mut B, mut value: u32) {
    while value >= 0x80 {
        buf.put_u8((value as u8 & 0x7F) | 0x80);
        value >>= 7;
    }
    buf.put_u8(value as u8);
}

/// Read a varint at `offset`.
/// Returns (value, bytes consumed), or `None` if the input ends mid-varint.
pub fn get_varint(buf: &[u8], offset: usize) -> StrandResult<Option<(u32, usize)>> {
    let mut value: u32 = 0;

    for i in 0..MAX_VARINT_LEN {
        let Some(&byte) = buf.get(offset + i) else {
            return Ok(None);
        };

        // 5th byte may only carry the top 4 bits and no continuation
        if i == MAX_VARINT_LEN - 1 && byte > 0x0F {
            return Err(StrandError::VarintOverflow { offset });
        }

        value |= ((byte & 0x7F) as u32) << (7 * i);
        if byte & 0x80 == 0 {
            return Ok(Some((value, i + 1)));
        }
    }

    Err(StrandError::VarintOverflow { offset })
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_small_values_one_byte() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 1);
        assert_eq!(buf, vec![0x01]);
        assert_eq!(get_varint(&buf, 0).unwrap(), Some((1, 1)));
    }

    #[test]
    fn test_known_encoding() {
        let mut buf = Vec::new();
        put_varint(&mut buf, 300);
        assert_eq!(buf, vec![0xAC, 0x02]);
    }

    #[test]
    fn test_truncated_is_none() {
        assert_eq!(get_varint(&[0x80], 0).unwrap(), None);
        assert_eq!(get_varint(&[], 0).unwrap(), None);
    }

    #[test]
    fn test_overflow_rejected() {
        let buf = [0xFF, 0xFF, 0xFF, 0xFF, 0x1F];
        assert!(matches!(
            get_varint(&buf, 0),
            Err(StrandError::VarintOverflow { offset: 0 })
        ));
    }

    proptest! {
        #[test]
        fn varint_len_matches_encoding(value in any::<u32>()) {
            let mut buf = Vec::new();
            put_varint(&mut buf, value);
            prop_assert_eq!(buf.len(), varint_len(value));
            prop_assert_eq!(get_varint(&buf, 0).unwrap(), Some((value, buf.len())));
        }
    }
}
