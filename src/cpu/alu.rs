//! ALU, shifter and condition flags.
//!
//! The MIC-1 ALU has four functions selected by a 2-bit field:
//! `A + B`, `A AND B`, `A` and `NOT A`. Subtraction is composed by the
//! microprogram (`A + NOT B + 1`). The shifter then moves the ALU output
//! one bit left or right. N and Z describe the ALU output before shifting.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::fmt;

/// ALU function select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AluOp {
    Add,
    And,
    PassA,
    NotA,
}

impl AluOp {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => AluOp::Add,
            1 => AluOp::And,
            2 => AluOp::PassA,
            _ => AluOp::NotA,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }
}

/// Shifter function select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ShiftOp {
    None,
    Left,
    Right,
}

impl ShiftOp {
    /// `11` is unused by the hardware and behaves like `00`.
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            1 => ShiftOp::Left,
            2 => ShiftOp::Right,
            _ => ShiftOp::None,
        }
    }

    pub fn bits(self) -> u32 {
        match self {
            ShiftOp::None => 0,
            ShiftOp::Left => 1,
            ShiftOp::Right => 2,
        }
    }

    pub fn apply(self, value: Word) -> Word {
        match self {
            ShiftOp::None => value,
            ShiftOp::Left => value.shl1(),
            ShiftOp::Right => value.shr1(),
        }
    }
}

/// Condition flags.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// Negative: bit 15 of the last ALU output.
    pub n: bool,
    /// Zero: the last ALU output was 0.
    pub z: bool,
}

impl Flags {
    pub fn of(value: Word) -> Self {
        Self {
            n: value.is_negative(),
            z: value.is_zero(),
        }
    }
}

impl fmt::Display for Flags {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "N={} Z={}", self.n as u8, self.z as u8)
    }
}

/// Result of one ALU evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AluOutput {
    pub value: Word,
    pub flags: Flags,
}

/// Evaluate the ALU.
pub fn evaluate(op: AluOp, a: Word, b: Word) -> AluOutput {
    let value = match op {
        AluOp::Add => a.wrapping_add(b),
        AluOp::And => a.and(b),
        AluOp::PassA => a,
        AluOp::NotA => a.not(),
    };
    AluOutput {
        value,
        flags: Flags::of(value),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn w(v: u16) -> Word {
        Word::from_u16(v)
    }

    #[test]
    fn test_alu_functions() {
        assert_eq!(evaluate(AluOp::Add, w(10), w(20)).value, w(30));
        assert_eq!(evaluate(AluOp::And, w(0xF0F0), w(0x0FF0)).value, w(0x00F0));
        assert_eq!(evaluate(AluOp::PassA, w(5), w(9)).value, w(5));
        assert_eq!(evaluate(AluOp::NotA, w(0), w(9)).value, w(0xFFFF));
    }

    #[test]
    fn test_flags() {
        let out = evaluate(AluOp::Add, w(0xFFFF), w(1));
        assert_eq!(out.flags, Flags { n: false, z: true });

        let out = evaluate(AluOp::PassA, w(0x8000), w(0));
        assert_eq!(out.flags, Flags { n: true, z: false });
    }

    #[test]
    fn test_shifter() {
        assert_eq!(ShiftOp::Left.apply(w(0x4001)), w(0x8002));
        assert_eq!(ShiftOp::Right.apply(w(0x8002)), w(0x4001));
        assert_eq!(ShiftOp::None.apply(w(0x1234)), w(0x1234));
        assert_eq!(ShiftOp::from_bits(0b11), ShiftOp::None);
    }

    #[test]
    fn test_select_bits() {
        for op in [AluOp::Add, AluOp::And, AluOp::PassA, AluOp::NotA] {
            assert_eq!(AluOp::from_bits(op.bits()), op);
        }
        for op in [ShiftOp::None, ShiftOp::Left, ShiftOp::Right] {
            assert_eq!(ShiftOp::from_bits(op.bits()), op);
        }
    }

    proptest! {
        #[test]
        fn prop_flags_follow_value(a: u16, b: u16, op in 0u32..4) {
            let out = evaluate(AluOp::from_bits(op), w(a), w(b));
            prop_assert_eq!(out.flags.z, out.value.to_u16() == 0);
            prop_assert_eq!(out.flags.n, out.value.to_u16() & 0x8000 != 0);
        }
    }
}
