//! MIC-1 macro instruction set.
//!
//! Instructions are one 16-bit word. The top four bits select one of
//! fifteen memory-reference instructions carrying a 12-bit operand; `1111`
//! opens an extended group selected by bits 11..9 (and bit 8 for
//! DESP/HALT), two of which carry an 8-bit constant.
//!
//! Decoding follows the stock microprogram, which only inspects the
//! opcode bits it branches on. Every word therefore decodes to some
//! instruction; bits the microprogram ignores are dropped.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::fmt;

/// What kind of operand an opcode takes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperandKind {
    /// No operand.
    None,
    /// 12-bit absolute memory address.
    Address,
    /// 12-bit offset from SP.
    Local,
    /// 12-bit unsigned constant.
    Constant,
    /// 8-bit unsigned constant.
    Byte,
}

impl OperandKind {
    /// Largest encodable operand value, `None` for operand-less opcodes.
    pub fn max_value(self) -> Option<u16> {
        match self {
            OperandKind::None => None,
            OperandKind::Byte => Some(0x00FF),
            _ => Some(0x0FFF),
        }
    }
}

/// An opcode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Opcode {
    Lodd,
    Stod,
    Addd,
    Subd,
    Jpos,
    Jzer,
    Jump,
    Loco,
    Lodl,
    Stol,
    Addl,
    Subl,
    Jneg,
    Jnze,
    Call,
    Pshi,
    Popi,
    Push,
    Pop,
    Retn,
    Swap,
    Insp,
    Desp,
    Halt,
}

impl Opcode {
    pub const ALL: [Opcode; 24] = [
        Opcode::Lodd, Opcode::Stod, Opcode::Addd, Opcode::Subd,
        Opcode::Jpos, Opcode::Jzer, Opcode::Jump, Opcode::Loco,
        Opcode::Lodl, Opcode::Stol, Opcode::Addl, Opcode::Subl,
        Opcode::Jneg, Opcode::Jnze, Opcode::Call, Opcode::Pshi,
        Opcode::Popi, Opcode::Push, Opcode::Pop, Opcode::Retn,
        Opcode::Swap, Opcode::Insp, Opcode::Desp, Opcode::Halt,
    ];

    /// Fixed bits of the encoding.
    pub fn base(self) -> u16 {
        match self {
            Opcode::Lodd => 0x0000,
            Opcode::Stod => 0x1000,
            Opcode::Addd => 0x2000,
            Opcode::Subd => 0x3000,
            Opcode::Jpos => 0x4000,
            Opcode::Jzer => 0x5000,
            Opcode::Jump => 0x6000,
            Opcode::Loco => 0x7000,
            Opcode::Lodl => 0x8000,
            Opcode::Stol => 0x9000,
            Opcode::Addl => 0xA000,
            Opcode::Subl => 0xB000,
            Opcode::Jneg => 0xC000,
            Opcode::Jnze => 0xD000,
            Opcode::Call => 0xE000,
            Opcode::Pshi => 0xF000,
            Opcode::Popi => 0xF200,
            Opcode::Push => 0xF400,
            Opcode::Pop => 0xF600,
            Opcode::Retn => 0xF800,
            Opcode::Swap => 0xFA00,
            Opcode::Insp => 0xFC00,
            Opcode::Desp => 0xFE00,
            Opcode::Halt => 0xFF00,
        }
    }

    pub fn operand_kind(self) -> OperandKind {
        match self {
            Opcode::Lodd | Opcode::Stod | Opcode::Addd | Opcode::Subd
            | Opcode::Jpos | Opcode::Jzer | Opcode::Jump
            | Opcode::Jneg | Opcode::Jnze | Opcode::Call => OperandKind::Address,
            Opcode::Lodl | Opcode::Stol | Opcode::Addl | Opcode::Subl => OperandKind::Local,
            Opcode::Loco => OperandKind::Constant,
            Opcode::Insp | Opcode::Desp => OperandKind::Byte,
            Opcode::Pshi | Opcode::Popi | Opcode::Push | Opcode::Pop
            | Opcode::Retn | Opcode::Swap | Opcode::Halt => OperandKind::None,
        }
    }

    pub fn mnemonic(self) -> &'static str {
        match self {
            Opcode::Lodd => "LODD",
            Opcode::Stod => "STOD",
            Opcode::Addd => "ADDD",
            Opcode::Subd => "SUBD",
            Opcode::Jpos => "JPOS",
            Opcode::Jzer => "JZER",
            Opcode::Jump => "JUMP",
            Opcode::Loco => "LOCO",
            Opcode::Lodl => "LODL",
            Opcode::Stol => "STOL",
            Opcode::Addl => "ADDL",
            Opcode::Subl => "SUBL",
            Opcode::Jneg => "JNEG",
            Opcode::Jnze => "JNZE",
            Opcode::Call => "CALL",
            Opcode::Pshi => "PSHI",
            Opcode::Popi => "POPI",
            Opcode::Push => "PUSH",
            Opcode::Pop => "POP",
            Opcode::Retn => "RETN",
            Opcode::Swap => "SWAP",
            Opcode::Insp => "INSP",
            Opcode::Desp => "DESP",
            Opcode::Halt => "HALT",
        }
    }

    /// Case-insensitive mnemonic lookup.
    pub fn from_mnemonic(text: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|op| op.mnemonic().eq_ignore_ascii_case(text))
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.mnemonic())
    }
}

/// A decoded instruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Instruction {
    pub opcode: Opcode,
    /// Operand value; zero for operand-less opcodes.
    pub operand: u16,
}

impl Instruction {
    /// Build an instruction, truncating the operand to its field width.
    pub fn new(opcode: Opcode, operand: u16) -> Self {
        let operand = opcode.operand_kind().max_value().map_or(0, |max| operand & max);
        Self { opcode, operand }
    }

    pub fn halt() -> Self {
        Self::new(Opcode::Halt, 0)
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.opcode.operand_kind() {
            OperandKind::None => write!(f, "{}", self.opcode),
            OperandKind::Address => write!(f, "{} 0x{:03X}", self.opcode, self.operand),
            OperandKind::Local | OperandKind::Constant | OperandKind::Byte => {
                write!(f, "{} {}", self.opcode, self.operand)
            }
        }
    }
}

/// Decode an instruction word.
pub fn decode(word: Word) -> Instruction {
    let raw = word.to_u16();
    let group = raw >> 12;
    if group != 0xF {
        let opcode = Opcode::ALL[group as usize];
        return Instruction::new(opcode, word.low_bits(12));
    }

    let opcode = match (raw >> 9) & 0b111 {
        0 => Opcode::Pshi,
        1 => Opcode::Popi,
        2 => Opcode::Push,
        3 => Opcode::Pop,
        4 => Opcode::Retn,
        5 => Opcode::Swap,
        6 => Opcode::Insp,
        _ if !word.bit(8) => Opcode::Desp,
        _ => Opcode::Halt,
    };
    Instruction::new(opcode, word.low_bits(8))
}

/// Encode an instruction to its word.
pub fn encode(instr: &Instruction) -> Word {
    let operand = instr
        .opcode
        .operand_kind()
        .max_value()
        .map_or(0, |max| instr.operand & max);
    Word::from_u16(instr.opcode.base() | operand)
}
