//! The 16-bit MIC-1 machine word.

use std::fmt;
use serde::{Serialize, Deserialize};

/// A 16-bit word.
///
/// Stored unsigned; the signed view is two's complement. Every arithmetic
/// helper wraps modulo 2^16, matching the datapath.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Default, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Word(u16);

impl Word {
    /// Number of bits in a word.
    pub const WIDTH: usize = 16;

    pub const ZERO: Word = Word(0);
    pub const ONE: Word = Word(1);
    pub const NEG_ONE: Word = Word(0xFFFF);

    #[inline]
    pub const fn zero() -> Self {
        Self(0)
    }

    #[inline]
    pub const fn from_u16(value: u16) -> Self {
        Self(value)
    }

    #[inline]
    pub const fn to_u16(self) -> u16 {
        self.0
    }

    #[inline]
    pub const fn from_i16(value: i16) -> Self {
        Self(value as u16)
    }

    /// Signed (two's complement) view.
    #[inline]
    pub const fn to_i16(self) -> i16 {
        self.0 as i16
    }

    /// Truncate any integer to its low 16 bits.
    #[inline]
    pub const fn from_i32_wrapping(value: i32) -> Self {
        Self(value as u16)
    }

    /// Bit 15 set.
    #[inline]
    pub const fn is_negative(self) -> bool {
        self.0 & 0x8000 != 0
    }

    #[inline]
    pub const fn is_zero(self) -> bool {
        self.0 == 0
    }

    /// Read a single bit (0 = LSB).
    #[inline]
    pub const fn bit(self, index: u32) -> bool {
        (self.0 >> index) & 1 == 1
    }

    /// Keep only the low `width` bits.
    #[inline]
    pub const fn low_bits(self, width: u32) -> u16 {
        if width >= 16 {
            self.0
        } else {
            self.0 & ((1u16 << width) - 1)
        }
    }

    #[inline]
    pub const fn wrapping_add(self, other: Word) -> Word {
        Word(self.0.wrapping_add(other.0))
    }

    #[inline]
    pub const fn and(self, other: Word) -> Word {
        Word(self.0 & other.0)
    }

    #[inline]
    pub const fn not(self) -> Word {
        Word(!self.0)
    }

    /// Logical shift left by one; bit 15 is lost.
    #[inline]
    pub const fn shl1(self) -> Word {
        Word(self.0 << 1)
    }

    /// Logical shift right by one; bit 15 becomes zero.
    #[inline]
    pub const fn shr1(self) -> Word {
        Word(self.0 >> 1)
    }
}

impl From<u16> for Word {
    fn from(value: u16) -> Self {
        Word(value)
    }
}

impl From<Word> for u16 {
    fn from(word: Word) -> Self {
        word.0
    }
}

impl From<i16> for Word {
    fn from(value: i16) -> Self {
        Word::from_i16(value)
    }
}

impl fmt::Display for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04X}", self.0)
    }
}

impl fmt::Debug for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Word(0x{:04X} = {})", self.0, self.to_i16())
    }
}

impl fmt::UpperHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::UpperHex::fmt(&self.0, f)
    }
}

impl fmt::LowerHex for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::LowerHex::fmt(&self.0, f)
    }
}

impl fmt::Binary for Word {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Binary::fmt(&self.0, f)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_signed_view() {
        assert_eq!(Word::from_u16(0xFFFF).to_i16(), -1);
        assert_eq!(Word::from_i16(-2).to_u16(), 0xFFFE);
        assert!(Word::from_i16(-1).is_negative());
        assert!(!Word::from_u16(0x7FFF).is_negative());
    }

    #[test]
    fn test_wrapping_add_overflows_to_zero() {
        let sum = Word::from_u16(0xFFFF).wrapping_add(Word::ONE);
        assert!(sum.is_zero());
    }

    #[test]
    fn test_shifts_drop_edge_bits() {
        assert_eq!(Word::from_u16(0x8001).shl1().to_u16(), 0x0002);
        assert_eq!(Word::from_u16(0x8001).shr1().to_u16(), 0x4000);
    }

    #[test]
    fn test_bit() {
        let w = Word::from_u16(0x8101);
        assert!(w.bit(0));
        assert!(!w.bit(1));
        assert!(w.bit(8));
        assert!(w.bit(15));
    }

    #[test]
    fn test_low_bits() {
        assert_eq!(Word::from_u16(0xF123).low_bits(12), 0x0123);
        assert_eq!(Word::from_u16(0xF123).low_bits(16), 0xF123);
    }

    #[test]
    fn test_display() {
        assert_eq!(format!("{}", Word::from_u16(30)), "0x001E");
        assert_eq!(format!("{:04X}", Word::from_u16(0xab)), "00AB");
    }

    proptest! {
        #[test]
        fn prop_add_matches_modular_arithmetic(a: u16, b: u16) {
            let sum = Word::from_u16(a).wrapping_add(Word::from_u16(b));
            prop_assert_eq!(sum.to_u16() as u32, (a as u32 + b as u32) % 65536);
        }

        #[test]
        fn prop_complement_plus_one_subtracts(a: u16, b: u16) {
            let x = Word::from_u16(a);
            let y = Word::from_u16(b);
            prop_assert_eq!(x.wrapping_add(y.not()).wrapping_add(Word::ONE).to_u16(), a.wrapping_sub(b));
        }

        #[test]
        fn prop_i16_roundtrip(v: i16) {
            prop_assert_eq!(Word::from_i16(v).to_i16(), v);
        }
    }
}
