//! MIC-1 scratchpad registers.
//!
//! The datapath has 16 registers addressed by a 4-bit select:
//! - 0-4: PC, AC, IR, TIR, SP
//! - 5-9: constants AMASK (0x0FFF), SMASK (0x00FF), 0, +1, -1
//! - 10-15: scratch registers A-F used by the microprogram
//!
//! Constant registers ignore writes.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::fmt;

/// Number of scratchpad registers.
pub const REGISTER_COUNT: usize = 16;

/// Initial stack pointer: top of memory.
pub const INITIAL_SP: u16 = 0x0FFF;

/// A register select.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Register {
    Pc,
    Ac,
    Ir,
    Tir,
    Sp,
    Amask,
    Smask,
    Zero,
    One,
    NegOne,
    A,
    B,
    C,
    D,
    E,
    F,
}

impl Register {
    pub const ALL: [Register; REGISTER_COUNT] = [
        Register::Pc, Register::Ac, Register::Ir, Register::Tir,
        Register::Sp, Register::Amask, Register::Smask, Register::Zero,
        Register::One, Register::NegOne, Register::A, Register::B,
        Register::C, Register::D, Register::E, Register::F,
    ];

    /// Decode a 4-bit select; only the low four bits are used.
    pub fn from_index(index: u8) -> Self {
        Self::ALL[(index & 0x0F) as usize]
    }

    pub fn index(self) -> usize {
        self as usize
    }

    /// Read-only registers.
    pub fn is_constant(self) -> bool {
        matches!(
            self,
            Register::Amask | Register::Smask | Register::Zero | Register::One | Register::NegOne
        )
    }

    /// Power-on value.
    pub fn initial_value(self) -> Word {
        match self {
            Register::Sp => Word::from_u16(INITIAL_SP),
            Register::Amask => Word::from_u16(0x0FFF),
            Register::Smask => Word::from_u16(0x00FF),
            Register::One => Word::ONE,
            Register::NegOne => Word::NEG_ONE,
            _ => Word::zero(),
        }
    }

    /// Lower-case name as used in microprogram listings.
    pub fn name(self) -> &'static str {
        match self {
            Register::Pc => "pc",
            Register::Ac => "ac",
            Register::Ir => "ir",
            Register::Tir => "tir",
            Register::Sp => "sp",
            Register::Amask => "amask",
            Register::Smask => "smask",
            Register::Zero => "0",
            Register::One => "1",
            Register::NegOne => "(-1)",
            Register::A => "a",
            Register::B => "b",
            Register::C => "c",
            Register::D => "d",
            Register::E => "e",
            Register::F => "f",
        }
    }
}

impl fmt::Display for Register {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// The register file.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    slots: [Word; REGISTER_COUNT],
}

impl Registers {
    /// Create a register file holding power-on values.
    pub fn new() -> Self {
        let mut slots = [Word::zero(); REGISTER_COUNT];
        for reg in Register::ALL {
            slots[reg.index()] = reg.initial_value();
        }
        Self { slots }
    }

    /// Restore power-on values.
    pub fn reset(&mut self) {
        *self = Self::new();
    }

    #[inline]
    pub fn get(&self, reg: Register) -> Word {
        self.slots[reg.index()]
    }

    /// Write a register. Returns `false` (and changes nothing) for constants.
    #[inline]
    pub fn set(&mut self, reg: Register, value: Word) -> bool {
        if reg.is_constant() {
            return false;
        }
        self.slots[reg.index()] = value;
        true
    }

    pub fn pc(&self) -> Word {
        self.get(Register::Pc)
    }

    pub fn ac(&self) -> Word {
        self.get(Register::Ac)
    }

    pub fn sp(&self) -> Word {
        self.get(Register::Sp)
    }

    pub fn ir(&self) -> Word {
        self.get(Register::Ir)
    }

    pub fn tir(&self) -> Word {
        self.get(Register::Tir)
    }
}

impl Default for Registers {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for Registers {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Registers")
            .field("pc", &self.pc())
            .field("ac", &self.ac())
            .field("sp", &self.sp())
            .field("ir", &self.ir())
            .field("tir", &self.tir())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_power_on_values() {
        let regs = Registers::new();
        assert_eq!(regs.pc().to_u16(), 0);
        assert_eq!(regs.ac().to_u16(), 0);
        assert_eq!(regs.sp().to_u16(), 0x0FFF);
        assert_eq!(regs.get(Register::Amask).to_u16(), 0x0FFF);
        assert_eq!(regs.get(Register::Smask).to_u16(), 0x00FF);
        assert_eq!(regs.get(Register::One).to_u16(), 1);
        assert_eq!(regs.get(Register::NegOne).to_i16(), -1);
    }

    #[test]
    fn test_select_numbering() {
        assert_eq!(Register::from_index(0), Register::Pc);
        assert_eq!(Register::from_index(4), Register::Sp);
        assert_eq!(Register::from_index(9), Register::NegOne);
        assert_eq!(Register::from_index(15), Register::F);
        for (i, reg) in Register::ALL.iter().enumerate() {
            assert_eq!(reg.index(), i);
        }
    }

    #[test]
    fn test_constants_ignore_writes() {
        let mut regs = Registers::new();
        assert!(!regs.set(Register::One, Word::from_u16(7)));
        assert_eq!(regs.get(Register::One).to_u16(), 1);

        assert!(regs.set(Register::A, Word::from_u16(7)));
        assert_eq!(regs.get(Register::A).to_u16(), 7);
    }

    #[test]
    fn test_reset() {
        let mut regs = Registers::new();
        regs.set(Register::Ac, Word::from_u16(3));
        regs.set(Register::Sp, Word::from_u16(3));
        regs.reset();
        assert_eq!(regs, Registers::new());
    }
}
