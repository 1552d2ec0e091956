//! Assembler and disassembler for MIC-1 programs.
//!
//! This module provides:
//! - A two-pass assembler (text → words plus a source-line map)
//! - A disassembler and listing generator (words → readable text)

pub mod assembler;
pub mod disasm;
pub mod program;

pub use assembler::{assemble, AssemblerError};
pub use disasm::{disassemble, disassemble_word, listing};
pub use program::AssembledProgram;
