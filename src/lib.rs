//! # MIC-1 Emulator
//!
//! A microprogrammed emulator of Tanenbaum's MIC-1 teaching machine, with
//! a two-pass assembler for its macro instruction set.
//!
//! The datapath is driven entirely by the loaded microprogram, so the same
//! engine runs the stock instruction set or any replacement written in the
//! 32-bit bit-string microcode format.

pub mod word;
pub mod cpu;
pub mod asm;

#[cfg(feature = "tui")]
pub mod tui;

// Re-export commonly used types
pub use word::Word;
pub use cpu::{Cpu, CpuState, ControlStore, EngineFault, LoadError, MicrocodeError, Register, Instruction};
pub use asm::{assemble, disassemble, AssembledProgram, AssemblerError};

#[cfg(feature = "tui")]
pub use tui::run_debugger;
