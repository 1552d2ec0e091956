//! CPU emulation for the MIC-1.
//!
//! The machine is microprogrammed:
//! - 4096 sixteen-bit words of memory behind an 8-line direct-mapped cache
//! - 16 registers on a three-bus datapath (A, B, C)
//! - a 32-bit horizontal microinstruction drives the datapath each cycle
//! - the macro instruction set is whatever the loaded microprogram implements;
//!   the stock one provides the 23 classic instructions plus HALT

pub mod memory;
pub mod cache;
pub mod registers;
pub mod alu;
pub mod microcode;
pub mod control;
pub mod decode;
pub mod execute;

pub use memory::Memory;
pub use cache::{Cache, CacheLine, CacheStats};
pub use registers::{Register, Registers};
pub use alu::{AluOp, Flags, ShiftOp};
pub use microcode::{Amux, Condition, MicroInstruction};
pub use control::{ControlStore, ControlUnit, EngineFault, MicrocodeError};
pub use decode::{decode, encode, Instruction, Opcode, OperandKind};
pub use execute::{Cpu, CpuSnapshot, CpuState, LoadError, MicroStep, StepOutcome, DEFAULT_MAX_CYCLES};
