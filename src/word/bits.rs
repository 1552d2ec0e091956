//! Bit-vector and bit-string conversions.
//!
//! Bit vectors and strings are most-significant-bit first, which is the
//! order microinstructions are written in.

use thiserror::Error;

/// Widest value these helpers handle.
pub const MAX_WIDTH: usize = 32;

/// Expand the low `width` bits of `value` into booleans, MSB first.
pub fn to_bits(value: u32, width: usize) -> Vec<bool> {
    let width = width.min(MAX_WIDTH);
    (0..width)
        .rev()
        .map(|i| (value >> i) & 1 == 1)
        .collect()
}

/// Pack MSB-first booleans into an integer.
///
/// Only the last 32 entries contribute.
pub fn from_bits(bits: &[bool]) -> u32 {
    bits.iter().fold(0u32, |acc, &bit| (acc << 1) | bit as u32)
}

/// Parse a string of `0`/`1` characters, MSB first.
pub fn parse_bit_string(s: &str) -> Result<u32, BitStringError> {
    if s.is_empty() {
        return Err(BitStringError::Empty);
    }
    if s.len() > MAX_WIDTH {
        return Err(BitStringError::TooWide { len: s.len() });
    }
    let bits = s
        .chars()
        .enumerate()
        .map(|(position, c)| match c {
            '0' => Ok(false),
            '1' => Ok(true),
            found => Err(BitStringError::InvalidChar { position, found }),
        })
        .collect::<Result<Vec<bool>, _>>()?;
    Ok(from_bits(&bits))
}

/// Render the low `width` bits of `value` as a `0`/`1` string.
pub fn format_bits(value: u32, width: usize) -> String {
    to_bits(value, width)
        .into_iter()
        .map(|bit| if bit { '1' } else { '0' })
        .collect()
}

/// Extract `width` bits starting at bit `lsb` (0 = least significant).
#[inline]
pub const fn field(value: u32, lsb: u32, width: u32) -> u32 {
    if width >= 32 {
        value >> lsb
    } else {
        (value >> lsb) & ((1u32 << width) - 1)
    }
}

/// Errors from [`parse_bit_string`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum BitStringError {
    #[error("empty bit string")]
    Empty,

    #[error("bit string of {len} characters is wider than {MAX_WIDTH} bits")]
    TooWide { len: usize },

    #[error("bit string of {len} characters is shorter than {expected} bits")]
    TooShort { len: usize, expected: usize },

    #[error("invalid character '{found}' at position {position} (expected 0 or 1)")]
    InvalidChar { position: usize, found: char },
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_to_bits_msb_first() {
        assert_eq!(to_bits(0b1010, 4), vec![true, false, true, false]);
        assert_eq!(to_bits(1, 3), vec![false, false, true]);
    }

    #[test]
    fn test_parse_bit_string() {
        assert_eq!(parse_bit_string("0101"), Ok(5));
        assert_eq!(parse_bit_string(&"1".repeat(32)), Ok(u32::MAX));
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert_eq!(parse_bit_string(""), Err(BitStringError::Empty));
        assert_eq!(
            parse_bit_string("01x1"),
            Err(BitStringError::InvalidChar { position: 2, found: 'x' })
        );
        assert_eq!(
            parse_bit_string(&"0".repeat(33)),
            Err(BitStringError::TooWide { len: 33 })
        );
    }

    #[test]
    fn test_field_extraction() {
        let value = 0xABCD_1234;
        assert_eq!(field(value, 24, 8), 0xAB);
        assert_eq!(field(value, 0, 4), 0x4);
        assert_eq!(field(value, 0, 32), value);
    }

    proptest! {
        #[test]
        fn prop_format_then_parse(value: u32, width in 1usize..=32) {
            let masked = if width == 32 { value } else { value & ((1u32 << width) - 1) };
            let text = format_bits(value, width);
            prop_assert_eq!(text.len(), width);
            prop_assert_eq!(parse_bit_string(&text), Ok(masked));
        }
    }
}
