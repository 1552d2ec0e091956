//! Debugger application state and logic.

use crate::asm::{disassemble_word, AssembledProgram};
use crate::cpu::{Cpu, StepOutcome, DEFAULT_MAX_CYCLES};
use crate::cpu::memory::MEMORY_SIZE;
use crate::word::Word;
use std::collections::HashSet;

/// Microinstructions executed per UI tick while running.
pub const STEPS_PER_TICK: usize = 64;

/// How memory words are rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemoryFormat {
    Hex,
    Decimal,
    Binary,
}

impl MemoryFormat {
    pub fn next(self) -> Self {
        match self {
            MemoryFormat::Hex => MemoryFormat::Decimal,
            MemoryFormat::Decimal => MemoryFormat::Binary,
            MemoryFormat::Binary => MemoryFormat::Hex,
        }
    }

    pub fn format(self, word: Word) -> String {
        match self {
            MemoryFormat::Hex => format!("{:04X}", word.to_u16()),
            MemoryFormat::Decimal => format!("{:6}", word.to_i16()),
            MemoryFormat::Binary => format!("{:016b}", word.to_u16()),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            MemoryFormat::Hex => "hex",
            MemoryFormat::Decimal => "dec",
            MemoryFormat::Binary => "bin",
        }
    }
}

/// Debugger application state.
pub struct DebuggerApp {
    /// The CPU being debugged.
    pub cpu: Cpu,
    /// Source text of the loaded program, one entry per line.
    pub source: Vec<String>,
    /// Assembled program, kept for resets.
    pub program: AssembledProgram,
    /// Breakpoints (by macro-instruction address).
    pub breakpoints: HashSet<u16>,
    /// Is the debugger running continuously?
    pub running: bool,
    pub should_quit: bool,
    pub status: String,
    /// First memory address shown.
    pub mem_scroll: usize,
    pub mem_format: MemoryFormat,
    pub show_cache: bool,
    pub show_microcode: bool,
}

impl DebuggerApp {
    /// Create a debugger around a CPU that already has its program loaded.
    pub fn new(cpu: Cpu, source: &str) -> Self {
        let program = cpu.program().cloned().unwrap_or_default();
        Self {
            cpu,
            source: source.lines().map(str::to_string).collect(),
            program,
            breakpoints: HashSet::new(),
            running: false,
            should_quit: false,
            status: "Ready. Press 's' to step, 'i' for one instruction, 'r' to run, 'q' to quit.".into(),
            mem_scroll: 0,
            mem_format: MemoryFormat::Hex,
            show_cache: true,
            show_microcode: true,
        }
    }

    /// Execute one microinstruction.
    pub fn step(&mut self) {
        if self.cpu.is_halted() {
            self.status = format!("CPU halted after {} cycles", self.cpu.cycle_count());
            self.running = false;
            return;
        }

        match self.cpu.step() {
            Ok(StepOutcome::Executed(step)) => {
                self.status = format!("MPC {:3}: {}", step.mpc, step.micro);
                if step.halted {
                    self.running = false;
                    self.status = format!("Halted after {} cycles", self.cpu.cycle_count());
                }
            }
            Ok(StepOutcome::Halted) => self.running = false,
            Err(e) => {
                self.status = format!("Engine fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Execute microinstructions until the current instruction retires.
    pub fn step_instruction(&mut self) {
        if self.cpu.is_halted() {
            self.status = format!("CPU halted after {} cycles", self.cpu.cycle_count());
            self.running = false;
            return;
        }
        let pc = self.cpu.pc().to_u16();
        match self.cpu.step_instruction(DEFAULT_MAX_CYCLES) {
            Ok(cycles) => {
                let word = self.cpu.read_memory(pc as usize);
                self.status = format!("{:03X}: {} ({} cycles)", pc, disassemble_word(word), cycles);
            }
            Err(e) => {
                self.status = format!("Engine fault: {}", e);
                self.running = false;
            }
        }
    }

    /// Run until halt, breakpoint, or fault.
    pub fn run(&mut self) {
        if self.cpu.is_halted() {
            self.status = "CPU halted. Press 'x' to reset.".into();
            return;
        }
        self.running = true;
        // Leave a breakpoint we are sitting on.
        self.step();
        if self.running {
            self.status = "Running...".into();
        }
    }

    pub fn pause(&mut self) {
        self.running = false;
        self.status = format!("Paused at cycle {}.", self.cpu.cycle_count());
    }

    /// Run one batch of continuous execution.
    pub fn tick(&mut self) {
        for _ in 0..STEPS_PER_TICK {
            if !self.running {
                return;
            }
            if self.cpu.is_halted() {
                self.running = false;
                self.status = format!("Halted after {} cycles", self.cpu.cycle_count());
                return;
            }

            // Breakpoints trigger at the start of an instruction fetch.
            let pc = self.cpu.pc().to_u16();
            if self.cpu.mpc() == 0 && self.breakpoints.contains(&pc) {
                self.running = false;
                self.status = format!("Breakpoint at {:03X}", pc);
                return;
            }

            self.step();
        }
    }

    /// Toggle a breakpoint at the current PC.
    pub fn toggle_breakpoint(&mut self) {
        let pc = self.cpu.pc().to_u16();
        if self.breakpoints.remove(&pc) {
            self.status = format!("Removed breakpoint at {:03X}", pc);
        } else {
            self.breakpoints.insert(pc);
            self.status = format!("Set breakpoint at {:03X}", pc);
        }
    }

    /// Reload the microprogram and the program, then start over.
    pub fn reset(&mut self) {
        self.running = false;
        let reloaded = self.cpu.soft_reset();
        self.cpu.load_program(&self.program);
        self.status = match reloaded {
            Ok(()) => "Reset. Ready.".into(),
            Err(e) => format!("Reset, but microcode reload failed: {}", e),
        };
    }

    /// Re-read the microprogram file without touching memory.
    pub fn reload_microcode(&mut self) {
        self.running = false;
        let Some(path) = self.cpu.microprogram_path().map(|p| p.display().to_string()) else {
            self.status = "Using the built-in microprogram; nothing to reload.".into();
            return;
        };
        self.status = match self.cpu.soft_reset() {
            Ok(()) => format!(
                "Reloaded {} microinstructions from {}",
                self.cpu.control_store().len(),
                path
            ),
            Err(e) => format!("Reload failed: {}", e),
        };
    }

    pub fn cycle_format(&mut self) {
        self.mem_format = self.mem_format.next();
        self.status = format!("Memory shown as {}", self.mem_format.name());
    }

    pub fn scroll_memory(&mut self, delta: isize) {
        let max = MEMORY_SIZE - 1;
        self.mem_scroll = self.mem_scroll.saturating_add_signed(delta).min(max);
    }

    /// Source lines around the current one: (line number, text, is current).
    pub fn source_window(&self, lines: usize) -> Vec<(usize, &str, bool)> {
        let current = self.cpu.current_source_line();
        let centre = current.unwrap_or(1);
        let start = centre.saturating_sub(lines / 2).max(1);

        self.source
            .iter()
            .enumerate()
            .map(|(i, text)| (i + 1, text.as_str()))
            .skip(start - 1)
            .take(lines)
            .map(|(n, text)| (n, text, Some(n) == current))
            .collect()
    }

    /// Whether a breakpoint sits on the instruction produced by `line`.
    pub fn line_has_breakpoint(&self, line: usize) -> bool {
        self.breakpoints
            .iter()
            .any(|&addr| self.cpu.source_line_for(addr) == Some(line))
    }

    /// Memory words from the scroll position on.
    pub fn memory_window(&self, rows: usize) -> Vec<(usize, Word)> {
        self.cpu.memory().dump(self.mem_scroll, rows)
    }

    /// Control store listing around MPC: (address, text, is current).
    pub fn microcode_window(&self, lines: usize) -> Vec<(usize, String, bool)> {
        let store = self.cpu.control_store();
        let mpc = self.cpu.mpc() as usize;
        let start = mpc.saturating_sub(lines / 2);

        store
            .iter()
            .enumerate()
            .skip(start)
            .take(lines)
            .map(|(addr, mi)| (addr, mi.to_string(), addr == mpc))
            .collect()
    }
}

/// Run the debugger on a CPU with a loaded program.
pub fn run_debugger(cpu: Cpu, source: String) -> std::io::Result<()> {
    use crossterm::{
        event::{self, Event, KeyCode, KeyEventKind},
        terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
        ExecutableCommand,
    };
    use ratatui::prelude::*;
    use std::io::stdout;
    use std::time::Duration;

    // Setup terminal
    enable_raw_mode()?;
    stdout().execute(EnterAlternateScreen)?;
    let mut terminal = Terminal::new(CrosstermBackend::new(stdout()))?;

    let mut app = DebuggerApp::new(cpu, &source);
    log::debug!("debugger started with {} program words", app.program.len());

    loop {
        terminal.draw(|frame| {
            super::ui::draw(frame, &app);
        })?;

        if event::poll(Duration::from_millis(50))? {
            if let Event::Key(key) = event::read()? {
                if key.kind == KeyEventKind::Press {
                    match key.code {
                        KeyCode::Char('q') => app.should_quit = true,
                        KeyCode::Char('s') => {
                            app.running = false;
                            app.step();
                        }
                        KeyCode::Char('i') => {
                            app.running = false;
                            app.step_instruction();
                        }
                        KeyCode::Char('r') => app.run(),
                        KeyCode::Char('p') => app.pause(),
                        KeyCode::Char('b') => app.toggle_breakpoint(),
                        KeyCode::Char('x') => app.reset(),
                        KeyCode::Char('m') => app.reload_microcode(),
                        KeyCode::Char('c') => app.show_cache = !app.show_cache,
                        KeyCode::Char('u') => app.show_microcode = !app.show_microcode,
                        KeyCode::Char('f') => app.cycle_format(),
                        KeyCode::Up => app.scroll_memory(-1),
                        KeyCode::Down => app.scroll_memory(1),
                        KeyCode::PageUp => app.scroll_memory(-16),
                        KeyCode::PageDown => app.scroll_memory(16),
                        _ => {}
                    }
                }
            }
        }

        if app.running {
            app.tick();
        }

        if app.should_quit {
            break;
        }
    }

    // Restore terminal
    disable_raw_mode()?;
    stdout().execute(LeaveAlternateScreen)?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    const SOURCE: &str = "\
; count to three
      LOCO 3
loop: SUBD one
      JNZE loop
      HALT
one:  DW 1
";

    fn app() -> DebuggerApp {
        let mut cpu = Cpu::with_standard_microprogram().unwrap();
        cpu.load_program(&assemble(SOURCE).unwrap());
        DebuggerApp::new(cpu, SOURCE)
    }

    fn run_to_end(app: &mut DebuggerApp) {
        app.run();
        for _ in 0..1_000 {
            if !app.running {
                break;
            }
            app.tick();
        }
    }

    #[test]
    fn test_step_instruction_advances_source_line() {
        let mut app = app();
        app.step_instruction();
        assert_eq!(app.cpu.clock_count(), 1);
        assert_eq!(app.cpu.current_source_line(), Some(2));
        assert!(app.status.starts_with("000: LOCO 3"));

        app.step_instruction();
        assert_eq!(app.cpu.current_source_line(), Some(3));
    }

    #[test]
    fn test_step_instruction_on_halted_cpu() {
        let mut app = app();
        run_to_end(&mut app);
        let cycles = app.cpu.cycle_count();

        app.step_instruction();
        assert_eq!(app.status, format!("CPU halted after {} cycles", cycles));
        assert_eq!(app.cpu.cycle_count(), cycles);
    }

    #[test]
    fn test_run_until_halt() {
        let mut app = app();
        run_to_end(&mut app);
        assert!(app.cpu.is_halted());
        assert_eq!(app.cpu.ac().to_u16(), 0);
        assert!(app.status.starts_with("Halted"));
    }

    #[test]
    fn test_breakpoint_stops_run() {
        let mut app = app();
        app.step_instruction();
        // PC now points at `loop`.
        app.toggle_breakpoint();
        assert!(app.line_has_breakpoint(3));

        run_to_end(&mut app);
        assert!(!app.running);
        assert!(!app.cpu.is_halted());
        assert_eq!(app.cpu.pc().to_u16(), 1);
        assert_eq!(app.cpu.ac().to_u16(), 2);
        assert_eq!(app.status, "Breakpoint at 001");

        app.toggle_breakpoint();
        assert!(app.breakpoints.is_empty());
        run_to_end(&mut app);
        assert!(app.cpu.is_halted());
    }

    #[test]
    fn test_reset_restores_program() {
        let mut app = app();
        run_to_end(&mut app);
        app.reset();
        assert!(app.cpu.is_running());
        assert_eq!(app.cpu.cycle_count(), 0);
        assert_eq!(app.cpu.read_memory(0).to_u16(), 0x7003);
        assert_eq!(app.status, "Reset. Ready.");
    }

    #[test]
    fn test_reload_without_file() {
        let mut app = app();
        app.reload_microcode();
        assert!(app.status.contains("built-in"));
    }

    #[test]
    fn test_memory_format_cycles() {
        let mut app = app();
        let word = Word::from_i16(-2);
        assert_eq!(app.mem_format.format(word), "FFFE");
        app.cycle_format();
        assert_eq!(app.mem_format.format(word), "    -2");
        app.cycle_format();
        assert_eq!(app.mem_format.format(word), "1111111111111110");
        app.cycle_format();
        assert_eq!(app.mem_format, MemoryFormat::Hex);
    }

    #[test]
    fn test_scroll_is_clamped() {
        let mut app = app();
        app.scroll_memory(-5);
        assert_eq!(app.mem_scroll, 0);
        app.scroll_memory(10_000);
        assert_eq!(app.mem_scroll, MEMORY_SIZE - 1);
    }

    #[test]
    fn test_memory_window_follows_scroll() {
        let mut app = app();
        let rows = app.memory_window(3);
        assert_eq!(rows, vec![(0, Word::from_u16(0x7003)), (1, Word::from_u16(0x3004)), (2, Word::from_u16(0xD001))]);

        app.scroll_memory(10_000);
        let rows = app.memory_window(8);
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].0, MEMORY_SIZE - 1);
    }

    #[test]
    fn test_windows() {
        let app = app();
        let source = app.source_window(4);
        assert_eq!(source.len(), 4);
        assert_eq!(source[0].0, 1);
        assert!(source[1].2);

        let micro = app.microcode_window(5);
        assert_eq!(micro.len(), 5);
        assert!(micro[0].2);
        assert_eq!(micro[0].1, "mar:=pc; rd;");
    }
}
