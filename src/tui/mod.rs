//! TUI debugger for the MIC-1 emulator.
//!
//! Provides an interactive terminal-based debugger with:
//! - Source view following the executing instruction
//! - Register, flag and counter panel
//! - Cache and microcode panels
//! - Memory view in hex, decimal or binary
//! - Micro-step, instruction-step, run and breakpoint controls

mod app;
mod ui;

pub use app::{DebuggerApp, MemoryFormat, run_debugger};
