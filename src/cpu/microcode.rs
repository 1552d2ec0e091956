//! Microinstruction format.
//!
//! A microinstruction is 32 bits, written most significant bit first:
//!
//! ```text
//! bit  31..24  23..20 19..16 15..12  11  10  9   8   7   6..5 4..3 2..1  0
//!      ADDR    A      B      C       ENC WR  RD  MAR MBR SH   ALU  COND  AMUX
//! ```
//!
//! - `A`/`B`/`C`: register selects for the two source buses and the
//!   destination bus; `C` is only written when `ENC` is set
//! - `SH`: 00 none, 01 left, 10 right
//! - `ALU`: 00 A+B, 01 A AND B, 10 A, 11 NOT A
//! - `COND`: 00 never, 01 on N, 10 on Z, 11 always branch to `ADDR`
//! - `AMUX`: 0 takes the ALU's left input from the A latch, 1 from MBR

use crate::cpu::alu::{AluOp, Flags, ShiftOp};
use crate::cpu::registers::Register;
use crate::word::bits::{self, BitStringError};
use serde::{Serialize, Deserialize};
use std::fmt;

/// Width of one microinstruction.
pub const MICROINSTRUCTION_BITS: usize = 32;

/// Branch condition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Condition {
    Never,
    IfNegative,
    IfZero,
    Always,
}

impl Condition {
    pub fn from_bits(bits: u32) -> Self {
        match bits & 0b11 {
            0 => Condition::Never,
            1 => Condition::IfNegative,
            2 => Condition::IfZero,
            _ => Condition::Always,
        }
    }

    pub fn bits(self) -> u32 {
        self as u32
    }

    /// Whether the branch is taken given the current flags.
    pub fn taken(self, flags: Flags) -> bool {
        match self {
            Condition::Never => false,
            Condition::IfNegative => flags.n,
            Condition::IfZero => flags.z,
            Condition::Always => true,
        }
    }
}

/// Source of the ALU's left input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Amux {
    ALatch,
    Mbr,
}

/// One decoded microinstruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MicroInstruction {
    pub addr: u8,
    pub a: Register,
    pub b: Register,
    pub c: Register,
    pub enc: bool,
    pub wr: bool,
    pub rd: bool,
    pub mar: bool,
    pub mbr: bool,
    pub shift: ShiftOp,
    pub alu: AluOp,
    pub cond: Condition,
    pub amux: Amux,
}

impl MicroInstruction {
    /// A microinstruction that does nothing and falls through.
    pub const NOP: MicroInstruction = MicroInstruction {
        addr: 0,
        a: Register::Pc,
        b: Register::Pc,
        c: Register::Pc,
        enc: false,
        wr: false,
        rd: false,
        mar: false,
        mbr: false,
        shift: ShiftOp::None,
        alu: AluOp::Add,
        cond: Condition::Never,
        amux: Amux::ALatch,
    };

    /// Decode from the raw 32-bit value.
    pub fn decode(raw: u32) -> Self {
        let flag = |bit: u32| bits::field(raw, bit, 1) == 1;
        Self {
            addr: bits::field(raw, 24, 8) as u8,
            a: Register::from_index(bits::field(raw, 20, 4) as u8),
            b: Register::from_index(bits::field(raw, 16, 4) as u8),
            c: Register::from_index(bits::field(raw, 12, 4) as u8),
            enc: flag(11),
            wr: flag(10),
            rd: flag(9),
            mar: flag(8),
            mbr: flag(7),
            shift: ShiftOp::from_bits(bits::field(raw, 5, 2)),
            alu: AluOp::from_bits(bits::field(raw, 3, 2)),
            cond: Condition::from_bits(bits::field(raw, 1, 2)),
            amux: if flag(0) { Amux::Mbr } else { Amux::ALatch },
        }
    }

    /// Encode back to the raw 32-bit value.
    pub fn encode(&self) -> u32 {
        (self.addr as u32) << 24
            | (self.a.index() as u32) << 20
            | (self.b.index() as u32) << 16
            | (self.c.index() as u32) << 12
            | (self.enc as u32) << 11
            | (self.wr as u32) << 10
            | (self.rd as u32) << 9
            | (self.mar as u32) << 8
            | (self.mbr as u32) << 7
            | self.shift.bits() << 5
            | self.alu.bits() << 3
            | self.cond.bits() << 1
            | (self.amux == Amux::Mbr) as u32
    }

    /// Parse exactly 32 `0`/`1` characters.
    pub fn parse(text: &str) -> Result<Self, BitStringError> {
        if text.len() < MICROINSTRUCTION_BITS {
            return Err(BitStringError::TooShort {
                len: text.len(),
                expected: MICROINSTRUCTION_BITS,
            });
        }
        bits::parse_bit_string(text).map(Self::decode)
    }

    pub fn to_bit_string(&self) -> String {
        bits::format_bits(self.encode(), MICROINSTRUCTION_BITS)
    }

    /// Next microaddress (the MMUX): `addr` when the branch is taken,
    /// otherwise the following slot.
    pub fn next_address(&self, mpc: u8, flags: Flags) -> u8 {
        if self.cond.taken(flags) {
            self.addr
        } else {
            mpc.wrapping_add(1)
        }
    }

    /// An unconditional jump to itself. Executing one stops the machine.
    pub fn is_halt_at(&self, mpc: u8) -> bool {
        self.cond == Condition::Always && self.addr == mpc
    }

    fn alu_expression(&self) -> String {
        let left = match self.amux {
            Amux::ALatch => self.a.name(),
            Amux::Mbr => "mbr",
        };
        let expr = match self.alu {
            AluOp::Add => format!("{}+{}", left, self.b.name()),
            AluOp::And => format!("band({},{})", left, self.b.name()),
            AluOp::PassA => left.to_string(),
            AluOp::NotA => format!("inv({})", left),
        };
        match self.shift {
            ShiftOp::None => expr,
            ShiftOp::Left => format!("lshift({})", expr),
            ShiftOp::Right => format!("rshift({})", expr),
        }
    }
}

impl Default for MicroInstruction {
    fn default() -> Self {
        Self::NOP
    }
}

/// Register-transfer rendering, e.g. `mar:=pc; rd;` or `ac:=mbr+ac; goto 0;`.
impl fmt::Display for MicroInstruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts: Vec<String> = Vec::new();
        let expr = self.alu_expression();

        if self.mar {
            parts.push(format!("mar:={};", self.b.name()));
        }
        if self.mbr {
            parts.push(format!("mbr:={};", expr));
        }
        if self.enc {
            parts.push(format!("{}:={};", self.c.name(), expr));
        }
        let tests_flags = matches!(self.cond, Condition::IfNegative | Condition::IfZero);
        if tests_flags && !self.enc && !self.mbr {
            parts.push(format!("alu:={};", expr));
        }
        if self.rd {
            parts.push("rd;".into());
        }
        if self.wr {
            parts.push("wr;".into());
        }
        match self.cond {
            Condition::Never => {}
            Condition::IfNegative => parts.push(format!("if n then goto {};", self.addr)),
            Condition::IfZero => parts.push(format!("if z then goto {};", self.addr)),
            Condition::Always => parts.push(format!("goto {};", self.addr)),
        }

        if parts.is_empty() {
            f.write_str("nop;")
        } else {
            f.write_str(&parts.join(" "))
        }
    }
}
