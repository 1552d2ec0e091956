//! MIC-1 Emulator - CLI Entry Point
//!
//! Commands:
//! - `mic1-emu run <program>` - Assemble and run a program until it halts
//! - `mic1-emu debug <program>` - Interactive debugger
//! - `mic1-emu asm <source>` - Print the assembled listing
//! - `mic1-emu microcode [file]` - Print a decoded microprogram

use clap::{Parser, Subcommand, ValueEnum};
use mic1::cpu::{ControlStore, Cpu, StepOutcome, DEFAULT_MAX_CYCLES};
use simplelog::{ColorChoice, Config, LevelFilter, TermLogger, TerminalMode, WriteLogger};
use std::fs::File;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "mic1-emu")]
#[command(version = "0.1.0")]
#[command(about = "A cycle-level emulator of the MIC-1 microprogrammed processor")]
struct Cli {
    /// Log verbosity
    #[arg(long, value_enum, global = true, default_value = "warn")]
    log_level: LogLevel,
    /// Write logs to this file instead of stderr
    #[arg(long, global = true)]
    log_file: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run a program until it halts
    Run {
        /// Path to the assembly source
        program: PathBuf,
        /// Microprogram to use instead of the built-in one
        #[arg(short, long)]
        microcode: Option<PathBuf>,
        /// Maximum number of microinstructions to execute
        #[arg(long, default_value_t = DEFAULT_MAX_CYCLES)]
        max_cycles: u64,
        /// Print every microinstruction as it executes
        #[arg(short, long)]
        trace: bool,
        /// Print the final state as JSON
        #[arg(long)]
        json: bool,
    },
    /// Interactive debugger
    Debug {
        /// Path to the assembly source
        program: PathBuf,
        /// Microprogram to use instead of the built-in one
        #[arg(short, long)]
        microcode: Option<PathBuf>,
    },
    /// Assemble a source file and print the listing
    Asm {
        /// Path to the source file
        source: PathBuf,
    },
    /// Print a decoded microprogram (the built-in one by default)
    Microcode {
        /// Path to a microcode file
        path: Option<PathBuf>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
    Debug,
    Trace,
}

impl From<LogLevel> for LevelFilter {
    fn from(level: LogLevel) -> Self {
        match level {
            LogLevel::Off => LevelFilter::Off,
            LogLevel::Error => LevelFilter::Error,
            LogLevel::Warn => LevelFilter::Warn,
            LogLevel::Info => LevelFilter::Info,
            LogLevel::Debug => LevelFilter::Debug,
            LogLevel::Trace => LevelFilter::Trace,
        }
    }
}

fn main() {
    let cli = Cli::parse();

    // The debugger owns the terminal, so its logs always go to a file.
    let log_file = match (&cli.log_file, &cli.command) {
        (Some(path), _) => Some(path.clone()),
        (None, Some(Commands::Debug { .. })) => Some(PathBuf::from("mic1-debug.log")),
        (None, _) => None,
    };
    init_logging(cli.log_level.into(), log_file.as_deref());

    match cli.command {
        Some(Commands::Run { program, microcode, max_cycles, trace, json }) => {
            run_program(&program, microcode.as_deref(), max_cycles, trace, json);
        }
        Some(Commands::Debug { program, microcode }) => {
            debug_program(&program, microcode.as_deref());
        }
        Some(Commands::Asm { source }) => {
            assemble_file(&source);
        }
        Some(Commands::Microcode { path }) => {
            print_microcode(path.as_deref());
        }
        None => {
            println!("MIC-1 Emulator v0.1.0");
            println!("A microprogrammed 16-bit processor emulator");
            println!();
            println!("Use --help for available commands");
        }
    }
}

fn init_logging(level: LevelFilter, file: Option<&Path>) {
    if level == LevelFilter::Off {
        return;
    }
    let result = match file {
        Some(path) => match File::create(path) {
            Ok(f) => WriteLogger::init(level, Config::default(), f),
            Err(e) => {
                eprintln!("Failed to open log file {}: {}", path.display(), e);
                std::process::exit(1);
            }
        },
        None => TermLogger::init(level, Config::default(), TerminalMode::Stderr, ColorChoice::Auto),
    };
    if let Err(e) = result {
        eprintln!("Failed to initialise logging: {}", e);
    }
}

/// Build a CPU with either the built-in or the given microprogram.
fn make_cpu(microcode: Option<&Path>) -> Cpu {
    let mut cpu = Cpu::new();
    let loaded = match microcode {
        Some(path) => cpu.load_microprogram(path),
        None => ControlStore::standard().map(|store| cpu.install_microprogram(store)),
    };
    if let Err(e) = loaded {
        eprintln!("Microcode error: {}", e);
        std::process::exit(1);
    }
    cpu
}

fn run_program(path: &Path, microcode: Option<&Path>, max_cycles: u64, trace: bool, json: bool) {
    let mut cpu = make_cpu(microcode);

    let program = match cpu.load_program_file(path) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    if program.is_empty() {
        eprintln!("No instructions to execute");
        std::process::exit(1);
    }

    if !json {
        println!("Running: {} ({} words)", path.display(), program.len());
    }

    let mut cycles = 0u64;
    while !cpu.is_halted() && cycles < max_cycles {
        match cpu.step() {
            Ok(StepOutcome::Executed(step)) => {
                cycles += 1;
                if trace {
                    println!(
                        "{:>6}  {:>3} -> {:<3} {:<44} AC={} PC={} SP={} {}",
                        cpu.cycle_count(),
                        step.mpc,
                        step.next_mpc,
                        step.micro.to_string(),
                        cpu.ac(),
                        cpu.pc(),
                        cpu.sp(),
                        cpu.flags()
                    );
                }
            }
            Ok(StepOutcome::Halted) => break,
            Err(e) => {
                eprintln!("Engine fault at MPC {}: {}", cpu.mpc(), e);
                std::process::exit(1);
            }
        }
    }

    if json {
        match serde_json::to_string_pretty(&cpu.snapshot()) {
            Ok(text) => println!("{}", text),
            Err(e) => {
                eprintln!("Failed to serialise state: {}", e);
                std::process::exit(1);
            }
        }
        return;
    }

    let stats = cpu.cache_stats();
    println!();
    println!("State:        {:?}", cpu.state());
    println!("Cycles:       {}", cpu.cycle_count());
    println!("Instructions: {}", cpu.clock_count());
    println!("PC:  {}   AC: {} ({})   SP: {}", cpu.pc(), cpu.ac(), cpu.ac().to_i16(), cpu.sp());
    println!("IR:  {}   TIR: {}   {}", cpu.ir(), cpu.tir(), cpu.flags());
    println!(
        "Cache: {} hits, {} misses ({:.1}% hit rate)",
        stats.hits,
        stats.misses,
        stats.hit_rate() * 100.0
    );

    if !cpu.is_halted() {
        println!();
        println!("Reached max cycles limit ({}). Use --max-cycles to increase.", max_cycles);
    }
}

#[cfg(feature = "tui")]
fn debug_program(path: &Path, microcode: Option<&Path>) {
    let mut cpu = make_cpu(microcode);

    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    let program = match mic1::assemble(&source) {
        Ok(program) => program,
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    };
    cpu.load_program(&program);

    if let Err(e) = mic1::tui::run_debugger(cpu, source) {
        eprintln!("Debugger error: {}", e);
        std::process::exit(1);
    }
}

#[cfg(not(feature = "tui"))]
fn debug_program(_path: &Path, _microcode: Option<&Path>) {
    eprintln!("This build has no debugger; rebuild with the `tui` feature");
    std::process::exit(1);
}

fn assemble_file(path: &Path) {
    let source = match std::fs::read_to_string(path) {
        Ok(s) => s,
        Err(e) => {
            eprintln!("Failed to read {}: {}", path.display(), e);
            std::process::exit(1);
        }
    };

    match mic1::assemble(&source) {
        Ok(program) => print!("{}", mic1::asm::listing(&program, &source)),
        Err(e) => {
            eprintln!("{}: {}", path.display(), e);
            std::process::exit(1);
        }
    }
}

fn print_microcode(path: Option<&Path>) {
    let store = match path {
        Some(path) => ControlStore::load(path),
        None => ControlStore::standard(),
    };
    match store {
        Ok(store) => {
            for line in store.listing() {
                println!("{}", line);
            }
        }
        Err(e) => {
            eprintln!("Microcode error: {}", e);
            std::process::exit(1);
        }
    }
}
