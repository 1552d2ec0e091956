//! Control store and microsequencer.
//!
//! Microprograms are plain text, one microinstruction per line:
//! - Lines starting with `#` or `;` are comments
//! - Blank lines are ignored
//! - Each instruction line starts with a string of at least 32 `0`/`1`
//!   characters; only the first 32 are used
//! - Anything after a `#` or `;` on an instruction line is a comment
//!
//! A loaded program is checked before it replaces the current one: every
//! branch target must exist and the last instruction must branch
//! unconditionally, so the microprogram counter can never leave the store.

use crate::cpu::alu::Flags;
use crate::cpu::microcode::{Condition, MicroInstruction, MICROINSTRUCTION_BITS};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Maximum number of microinstructions (8-bit MPC).
pub const CONTROL_STORE_SIZE: usize = 256;

/// The stock MIC-1 microprogram, including a HALT routine at address 80.
pub const STANDARD_MICROPROGRAM: &str = include_str!("../../microcode/mic1.mc");

/// A validated microprogram.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ControlStore {
    instructions: Vec<MicroInstruction>,
}

impl ControlStore {
    /// An empty store. Stepping an engine with an empty store is a fault.
    pub fn new() -> Self {
        Self::default()
    }

    /// The embedded stock microprogram.
    pub fn standard() -> Result<Self, MicrocodeError> {
        Self::parse(STANDARD_MICROPROGRAM)
    }

    /// Read and parse a microprogram file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, MicrocodeError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| MicrocodeError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        Self::parse(&source)
    }

    /// Parse microprogram text.
    pub fn parse(source: &str) -> Result<Self, MicrocodeError> {
        let mut instructions = Vec::new();
        let mut lines = Vec::new();

        for (line_num, line) in source.lines().enumerate() {
            let line_num = line_num + 1;
            let code = match line.find(|c: char| c == '#' || c == ';') {
                Some(idx) => &line[..idx],
                None => line,
            };
            let mut tokens = code.split_whitespace();
            let Some(token) = tokens.next() else {
                continue;
            };
            if let Some(extra) = tokens.next() {
                return Err(MicrocodeError::Malformed {
                    line: line_num,
                    reason: format!("unexpected text after bit string: '{}'", extra),
                });
            }
            if let Some((position, found)) = token.chars().enumerate().find(|&(_, c)| c != '0' && c != '1') {
                return Err(MicrocodeError::Malformed {
                    line: line_num,
                    reason: format!("invalid character '{}' at column {}", found, position + 1),
                });
            }
            if token.len() > MICROINSTRUCTION_BITS {
                log::warn!(
                    "microcode line {}: {} bits given, using the first {}",
                    line_num,
                    token.len(),
                    MICROINSTRUCTION_BITS
                );
            }
            let bits = &token[..token.len().min(MICROINSTRUCTION_BITS)];
            let instr = MicroInstruction::parse(bits).map_err(|e| MicrocodeError::Malformed {
                line: line_num,
                reason: e.to_string(),
            })?;

            instructions.push(instr);
            lines.push(line_num);
        }

        validate(&instructions, &lines)?;
        Ok(Self { instructions })
    }

    /// Build a store from already-decoded instructions.
    ///
    /// Error line numbers are 1-based instruction indices.
    pub fn from_instructions(instructions: Vec<MicroInstruction>) -> Result<Self, MicrocodeError> {
        let lines: Vec<usize> = (1..=instructions.len()).collect();
        validate(&instructions, &lines)?;
        Ok(Self { instructions })
    }

    pub fn len(&self) -> usize {
        self.instructions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instructions.is_empty()
    }

    pub fn get(&self, mpc: u8) -> Option<&MicroInstruction> {
        self.instructions.get(mpc as usize)
    }

    pub fn iter(&self) -> impl Iterator<Item = &MicroInstruction> {
        self.instructions.iter()
    }

    /// One line per microinstruction: address, bits and register transfers.
    pub fn listing(&self) -> Vec<String> {
        self.instructions
            .iter()
            .enumerate()
            .map(|(addr, mi)| format!("{:3}: {}  {}", addr, mi.to_bit_string(), mi))
            .collect()
    }
}

fn validate(instructions: &[MicroInstruction], lines: &[usize]) -> Result<(), MicrocodeError> {
    let len = instructions.len();
    if len == 0 {
        return Err(MicrocodeError::Empty);
    }
    if len > CONTROL_STORE_SIZE {
        return Err(MicrocodeError::TooLong { count: len });
    }

    for (mi, &line) in instructions.iter().zip(lines) {
        if mi.cond != Condition::Never && mi.addr as usize >= len {
            return Err(MicrocodeError::TargetOutOfRange {
                line,
                target: mi.addr,
                len,
            });
        }
    }

    if let (Some(last), Some(&line)) = (instructions.last(), lines.last()) {
        if last.cond != Condition::Always {
            return Err(MicrocodeError::FallsThrough { line });
        }
    }
    Ok(())
}

/// The microsequencer: MPC, control store and where the store came from.
#[derive(Debug, Clone, Default)]
pub struct ControlUnit {
    store: ControlStore,
    mpc: u8,
    path: Option<PathBuf>,
}

impl ControlUnit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn mpc(&self) -> u8 {
        self.mpc
    }

    pub fn store(&self) -> &ControlStore {
        &self.store
    }

    /// File the current store was loaded from, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// The microinstruction at MPC.
    pub fn fetch(&self) -> Result<MicroInstruction, EngineFault> {
        if self.store.is_empty() {
            return Err(EngineFault::EmptyControlStore);
        }
        self.store
            .get(self.mpc)
            .copied()
            .ok_or(EngineFault::MpcOutOfRange {
                mpc: self.mpc,
                len: self.store.len(),
            })
    }

    /// Compute and latch the next MPC.
    pub fn advance(&mut self, current: &MicroInstruction, flags: Flags) -> u8 {
        self.mpc = current.next_address(self.mpc, flags);
        self.mpc
    }

    /// Return to the fetch entry point.
    pub fn reset(&mut self) {
        self.mpc = 0;
    }

    /// Replace the store with a file's contents. On failure nothing changes.
    pub fn load_microprogram<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, MicrocodeError> {
        let path = path.as_ref();
        let store = ControlStore::load(path)?;
        let count = store.len();
        log::debug!("loaded {} microinstructions from {}", count, path.display());
        self.store = store;
        self.path = Some(path.to_path_buf());
        self.mpc = 0;
        Ok(count)
    }

    /// Install a store that did not come from a file.
    pub fn install(&mut self, store: ControlStore) -> usize {
        self.store = store;
        self.path = None;
        self.mpc = 0;
        self.store.len()
    }

    /// Re-read the store from its file. A store without a file is left as is.
    pub fn reload(&mut self) -> Result<(), MicrocodeError> {
        let Some(path) = self.path.clone() else {
            return Ok(());
        };
        let store = ControlStore::load(&path)?;
        log::debug!("reloaded {} microinstructions from {}", store.len(), path.display());
        self.store = store;
        Ok(())
    }
}

/// Errors from loading a microprogram.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MicrocodeError {
    #[error("cannot read microprogram {path}: {message}")]
    Io { path: String, message: String },

    #[error("malformed microinstruction on line {line}: {reason}")]
    Malformed { line: usize, reason: String },

    #[error("microprogram contains no instructions")]
    Empty,

    #[error("microprogram has {count} instructions (limit {CONTROL_STORE_SIZE})")]
    TooLong { count: usize },

    #[error("branch target {target} on line {line} is outside the {len}-instruction store")]
    TargetOutOfRange { line: usize, target: u8, len: usize },

    #[error("last microinstruction (line {line}) can fall through past the end of the store")]
    FallsThrough { line: usize },
}

/// Faults raised while stepping. These indicate a misconfigured engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum EngineFault {
    #[error("control store is empty")]
    EmptyControlStore,

    #[error("MPC {mpc} is outside the {len}-instruction control store")]
    MpcOutOfRange { mpc: u8, len: usize },
}
