//! MIC-1 execution engine.
//!
//! One call to [`Cpu::step`] runs one microinstruction, i.e. one clock
//! cycle of the datapath:
//!
//! 1. fetch the microinstruction at MPC
//! 2. latch the A and B buses; load MAR from B when asked
//! 3. on RD, read MBR through the cache
//! 4. AMUX, ALU (sets N/Z), shifter
//! 5. load MBR and/or the C register from the shifter
//! 6. on WR, write MBR through the cache
//! 7. pick the next MPC from COND and the flags
//!
//! A microinstruction that jumps unconditionally to itself halts the
//! machine. `cycle_count` counts microinstructions; `clock_count` counts
//! retired macro-instructions (a return to MPC 0, or the halt).

use crate::asm::{assemble, AssembledProgram, AssemblerError};
use crate::cpu::alu::{self, Flags};
use crate::cpu::cache::{Cache, CacheLine, CacheStats};
use crate::cpu::control::{ControlStore, ControlUnit, EngineFault, MicrocodeError};
use crate::cpu::memory::{Memory, ADDRESS_MASK, MEMORY_SIZE};
use crate::cpu::microcode::{Amux, MicroInstruction};
use crate::cpu::registers::{Register, Registers};
use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::path::Path;
use thiserror::Error;

/// Cycle limit used by front ends when none is given.
pub const DEFAULT_MAX_CYCLES: u64 = 1_000_000;

/// Engine execution state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CpuState {
    /// Reset, nothing armed yet. The first step starts the machine.
    Idle,
    /// Executing.
    Running,
    /// A halt microinstruction was executed.
    Halted,
}

/// What one executed microinstruction did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MicroStep {
    /// Address the microinstruction was fetched from.
    pub mpc: u8,
    pub micro: MicroInstruction,
    pub next_mpc: u8,
    /// Cache outcome of the RD, if one was issued.
    pub cache_hit: Option<bool>,
    /// A macro-instruction finished on this cycle.
    pub retired: bool,
    pub halted: bool,
}

/// Result of [`Cpu::step`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Executed(MicroStep),
    /// The machine was already halted; nothing ran.
    Halted,
}

impl StepOutcome {
    pub fn micro_step(&self) -> Option<&MicroStep> {
        match self {
            StepOutcome::Executed(step) => Some(step),
            StepOutcome::Halted => None,
        }
    }
}

/// The MIC-1 CPU.
#[derive(Debug, Clone)]
pub struct Cpu {
    regs: Registers,
    flags: Flags,
    mar: u16,
    mbr: Word,
    control: ControlUnit,
    cache: Cache,
    mem: Memory,
    state: CpuState,
    cycles: u64,
    clocks: u64,
    program: Option<AssembledProgram>,
    /// Address of the instruction most recently latched into IR.
    instruction_addr: Option<u16>,
}

impl Cpu {
    /// Create a CPU with zeroed memory and an empty control store.
    pub fn new() -> Self {
        Self {
            regs: Registers::new(),
            flags: Flags::default(),
            mar: 0,
            mbr: Word::zero(),
            control: ControlUnit::new(),
            cache: Cache::new(),
            mem: Memory::new(),
            state: CpuState::Idle,
            cycles: 0,
            clocks: 0,
            program: None,
            instruction_addr: None,
        }
    }

    /// Create a CPU running the embedded stock microprogram.
    pub fn with_standard_microprogram() -> Result<Self, MicrocodeError> {
        let mut cpu = Self::new();
        cpu.install_microprogram(ControlStore::standard()?);
        Ok(cpu)
    }

    // ==================== Lifecycle ====================

    /// Reset registers, flags, MAR/MBR, counters, cache and MPC.
    ///
    /// Memory survives when `preserve_memory` is set. A microprogram that
    /// came from a file is re-read; if that fails the state is still reset,
    /// the previous microprogram stays installed and the error is returned.
    pub fn reset(&mut self, preserve_memory: bool) -> Result<(), MicrocodeError> {
        self.reset_state(preserve_memory);
        self.control.reload().map_err(|e| {
            log::warn!("microprogram reload failed, keeping the previous one: {}", e);
            e
        })
    }

    /// Reset, keeping memory.
    pub fn soft_reset(&mut self) -> Result<(), MicrocodeError> {
        self.reset(true)
    }

    /// Reset and zero memory.
    pub fn hard_reset(&mut self) -> Result<(), MicrocodeError> {
        self.reset(false)
    }

    fn reset_state(&mut self, preserve_memory: bool) {
        self.regs.reset();
        self.flags = Flags::default();
        self.mar = 0;
        self.mbr = Word::zero();
        self.control.reset();
        self.cache.invalidate_all();
        self.state = CpuState::Idle;
        self.cycles = 0;
        self.clocks = 0;
        self.instruction_addr = None;
        if !preserve_memory {
            self.mem.clear();
            self.program = None;
        }
        log::debug!("cpu reset (memory {})", if preserve_memory { "kept" } else { "cleared" });
    }

    /// Write raw words from address 0, reset (keeping memory) and arm.
    ///
    /// Returns the number of words written; anything past the end of
    /// memory is dropped.
    pub fn load_words(&mut self, words: &[Word]) -> usize {
        let written = self.mem.load(0, words);
        self.reset_state(true);
        self.program = None;
        self.state = CpuState::Running;
        written
    }

    /// Load an assembled program at address 0, reset (keeping memory) and arm.
    pub fn load_program(&mut self, program: &AssembledProgram) -> usize {
        let written = self.load_words(&program.words);
        self.program = Some(program.clone());
        log::debug!("loaded {} program words", written);
        written
    }

    /// Read, assemble and load a source file.
    ///
    /// Memory is untouched unless assembly succeeds.
    pub fn load_program_file<P: AsRef<Path>>(&mut self, path: P) -> Result<AssembledProgram, LoadError> {
        let path = path.as_ref();
        let source = std::fs::read_to_string(path).map_err(|e| LoadError::Io {
            path: path.display().to_string(),
            message: e.to_string(),
        })?;
        let program = assemble(&source)?;
        self.load_program(&program);
        Ok(program)
    }

    /// Replace the microprogram with a file's contents and reset MPC.
    ///
    /// Returns the number of microinstructions. On failure the current
    /// microprogram stays in place.
    pub fn load_microprogram<P: AsRef<Path>>(&mut self, path: P) -> Result<usize, MicrocodeError> {
        self.control.load_microprogram(path)
    }

    /// Install an in-memory microprogram and reset MPC.
    pub fn install_microprogram(&mut self, store: ControlStore) -> usize {
        self.control.install(store)
    }

    pub fn microprogram_path(&self) -> Option<&Path> {
        self.control.path()
    }

    pub fn control_store(&self) -> &ControlStore {
        self.control.store()
    }

    // ==================== Execution ====================

    /// Execute one microinstruction.
    pub fn step(&mut self) -> Result<StepOutcome, EngineFault> {
        if self.state == CpuState::Halted {
            return Ok(StepOutcome::Halted);
        }

        let mpc = self.control.mpc();
        let micro = self.control.fetch()?;
        if self.state == CpuState::Idle {
            self.state = CpuState::Running;
        }

        // Bus latches.
        let a_latch = self.regs.get(micro.a);
        let b_latch = self.regs.get(micro.b);

        if micro.mar {
            self.mar = b_latch.to_u16() & ADDRESS_MASK;
        }

        let mut cache_hit = None;
        if micro.rd {
            let (word, hit) = self.cache.read(&self.mem, self.mar);
            self.mbr = word;
            cache_hit = Some(hit);
        }

        let alu_input = match micro.amux {
            Amux::ALatch => a_latch,
            Amux::Mbr => self.mbr,
        };
        let out = alu::evaluate(micro.alu, alu_input, b_latch);
        self.flags = out.flags;
        let shifted = micro.shift.apply(out.value);

        if micro.mbr {
            self.mbr = shifted;
        }
        if micro.enc {
            self.regs.set(micro.c, shifted);
            if micro.c == Register::Ir {
                self.instruction_addr = Some(self.mar);
            }
        }
        if micro.wr {
            self.cache.write_through(&mut self.mem, self.mar, self.mbr);
        }

        let next_mpc = self.control.advance(&micro, self.flags);
        let halted = micro.is_halt_at(mpc);
        let retired = halted || next_mpc == 0;

        self.cycles += 1;
        if retired {
            self.clocks += 1;
        }
        if halted {
            self.state = CpuState::Halted;
            log::debug!(
                "halted at MPC {} after {} cycles ({} instructions)",
                mpc,
                self.cycles,
                self.clocks
            );
        }

        log::trace!(
            "cycle {:>6} mpc {:>3} -> {:>3}  {:<40} ac={} pc={} sp={}",
            self.cycles,
            mpc,
            next_mpc,
            micro.to_string(),
            self.regs.ac(),
            self.regs.pc(),
            self.regs.sp()
        );

        Ok(StepOutcome::Executed(MicroStep {
            mpc,
            micro,
            next_mpc,
            cache_hit,
            retired,
            halted,
        }))
    }

    /// Step until halted or `max_cycles` microinstructions have run.
    ///
    /// Returns the number of microinstructions executed.
    pub fn run(&mut self, max_cycles: u64) -> Result<u64, EngineFault> {
        let start = self.cycles;
        while self.state != CpuState::Halted && self.cycles - start < max_cycles {
            self.step()?;
        }
        Ok(self.cycles - start)
    }

    /// Step until the current macro-instruction retires (or the cycle limit is reached).
    pub fn step_instruction(&mut self, max_cycles: u64) -> Result<u64, EngineFault> {
        let start = self.cycles;
        while self.cycles - start < max_cycles {
            match self.step()? {
                StepOutcome::Halted => break,
                StepOutcome::Executed(step) if step.retired => break,
                StepOutcome::Executed(_) => {}
            }
        }
        Ok(self.cycles - start)
    }

    // ==================== Introspection ====================

    pub fn state(&self) -> CpuState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.state == CpuState::Running
    }

    pub fn is_halted(&self) -> bool {
        self.state == CpuState::Halted
    }

    pub fn register(&self, reg: Register) -> Word {
        self.regs.get(reg)
    }

    pub fn registers(&self) -> &Registers {
        &self.regs
    }

    pub fn pc(&self) -> Word {
        self.regs.pc()
    }

    pub fn ac(&self) -> Word {
        self.regs.ac()
    }

    pub fn sp(&self) -> Word {
        self.regs.sp()
    }

    pub fn ir(&self) -> Word {
        self.regs.ir()
    }

    pub fn tir(&self) -> Word {
        self.regs.tir()
    }

    pub fn mar(&self) -> u16 {
        self.mar
    }

    pub fn mbr(&self) -> Word {
        self.mbr
    }

    pub fn mpc(&self) -> u8 {
        self.control.mpc()
    }

    pub fn flags(&self) -> Flags {
        self.flags
    }

    pub fn flag_n(&self) -> bool {
        self.flags.n
    }

    pub fn flag_z(&self) -> bool {
        self.flags.z
    }

    pub fn cycle_count(&self) -> u64 {
        self.cycles
    }

    pub fn clock_count(&self) -> u64 {
        self.clocks
    }

    /// Read memory directly, bypassing the cache and its statistics.
    pub fn read_memory(&self, addr: usize) -> Word {
        self.mem.read(addr)
    }

    pub fn memory(&self) -> &Memory {
        &self.mem
    }

    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }

    pub fn cache_line(&self, index: usize) -> Option<&CacheLine> {
        self.cache.line(index)
    }

    pub fn cache_lines(&self) -> &[CacheLine] {
        self.cache.lines()
    }

    /// The microinstruction that the next step will execute.
    pub fn current_microinstruction(&self) -> Option<MicroInstruction> {
        self.control.fetch().ok()
    }

    /// The program loaded with [`Cpu::load_program`], if memory still holds it.
    pub fn program(&self) -> Option<&AssembledProgram> {
        self.program.as_ref()
    }

    /// Source line that produced the word at `pc`.
    pub fn source_line_for(&self, pc: u16) -> Option<usize> {
        self.program.as_ref()?.line_for(pc)
    }

    /// Source line of the instruction being executed: the one last latched
    /// into IR, or the one at PC before the first fetch.
    pub fn current_source_line(&self) -> Option<usize> {
        let addr = self.instruction_addr.unwrap_or_else(|| self.regs.pc().to_u16());
        self.source_line_for(addr)
    }

    /// Address of the instruction last latched into IR.
    pub fn current_instruction_addr(&self) -> Option<u16> {
        self.instruction_addr
    }

    // ==================== Debug access ====================

    /// Write memory directly. Keeps a resident cache line coherent without
    /// counting an access.
    pub fn write_memory(&mut self, addr: usize, value: Word) {
        if addr < MEMORY_SIZE {
            self.cache.write_through(&mut self.mem, addr as u16, value);
        }
    }

    /// Overwrite a register. Returns `false` for the constant registers.
    pub fn set_register(&mut self, reg: Register, value: Word) -> bool {
        self.regs.set(reg, value)
    }

    /// Serializable summary of the machine state.
    pub fn snapshot(&self) -> CpuSnapshot {
        CpuSnapshot {
            state: self.state,
            pc: self.regs.pc().to_u16(),
            ac: self.regs.ac().to_u16(),
            sp: self.regs.sp().to_u16(),
            ir: self.regs.ir().to_u16(),
            tir: self.regs.tir().to_u16(),
            mar: self.mar,
            mbr: self.mbr.to_u16(),
            mpc: self.control.mpc(),
            flag_n: self.flags.n,
            flag_z: self.flags.z,
            cycles: self.cycles,
            clocks: self.clocks,
            cache: self.cache.stats(),
            source_line: self.current_source_line(),
        }
    }
}

impl Default for Cpu {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time view of the CPU for reports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuSnapshot {
    pub state: CpuState,
    pub pc: u16,
    pub ac: u16,
    pub sp: u16,
    pub ir: u16,
    pub tir: u16,
    pub mar: u16,
    pub mbr: u16,
    pub mpc: u8,
    pub flag_n: bool,
    pub flag_z: bool,
    pub cycles: u64,
    pub clocks: u64,
    pub cache: CacheStats,
    pub source_line: Option<usize>,
}

/// Errors from [`Cpu::load_program_file`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum LoadError {
    #[error("cannot read program {path}: {message}")]
    Io { path: String, message: String },

    #[error(transparent)]
    Assemble(#[from] AssemblerError),
}
