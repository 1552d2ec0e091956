//! Two-pass assembler for MIC-1 programs.
//!
//! Syntax:
//! ```text
//! ; Comment (also '#')
//! start:  LOCO 10      ; label followed by an instruction
//!         STOD total
//! loop:                ; label on its own line
//!         SUBD one
//!         JNZE loop
//!         HALT
//! one:    DW 1         ; data word
//! total:  DW 0
//! ```
//!
//! Mnemonics are case-insensitive, labels are case-sensitive. Operands are
//! decimal, `0x` hex, `0b` binary or a label. Every statement is one word
//! and the program is placed at address 0.

use crate::asm::program::AssembledProgram;
use crate::cpu::decode::{encode, Instruction, Opcode, OperandKind};
use crate::cpu::memory::MEMORY_SIZE;
use crate::word::Word;
use std::collections::BTreeMap;
use thiserror::Error;

/// Assemble source text.
///
/// Stops at the first error; a failed assembly produces nothing to load.
pub fn assemble(source: &str) -> Result<AssembledProgram, AssemblerError> {
    let mut asm = Assembler::new();
    for (line_num, line) in source.lines().enumerate() {
        asm.scan_line(line, line_num + 1)?;
    }
    if asm.statements.len() > MEMORY_SIZE {
        return Err(AssemblerError::ProgramTooLarge {
            words: asm.statements.len(),
        });
    }
    asm.encode_all()
}

/// One word-producing line, recorded in pass 1.
struct Statement<'a> {
    line: usize,
    mnemonic: &'a str,
    operand: Option<&'a str>,
}

/// The assembler state.
struct Assembler<'a> {
    /// Symbol table (label -> address).
    symbols: BTreeMap<String, u16>,
    /// Line each label was defined on, for duplicate reports.
    label_lines: BTreeMap<String, usize>,
    statements: Vec<Statement<'a>>,
}

impl<'a> Assembler<'a> {
    fn new() -> Self {
        Self {
            symbols: BTreeMap::new(),
            label_lines: BTreeMap::new(),
            statements: Vec::new(),
        }
    }

    /// Pass 1: record labels at the current address and queue statements.
    fn scan_line(&mut self, line: &'a str, line_num: usize) -> Result<(), AssemblerError> {
        let line = match line.find(|c: char| c == ';' || c == '#') {
            Some(idx) => &line[..idx],
            None => line,
        }
        .trim();

        if line.is_empty() {
            return Ok(());
        }

        let rest = if let Some(colon_idx) = line.find(':') {
            let label = line[..colon_idx].trim();
            self.define_label(label, line_num)?;
            line[colon_idx + 1..].trim()
        } else {
            line
        };

        if rest.is_empty() {
            return Ok(());
        }

        let mut parts = rest.split_whitespace();
        let mnemonic = parts.next().unwrap_or_default();
        let operand = parts.next();
        if let Some(extra) = parts.next() {
            return Err(AssemblerError::Syntax {
                line: line_num,
                message: format!("unexpected '{}' after operand", extra),
            });
        }

        self.statements.push(Statement {
            line: line_num,
            mnemonic,
            operand,
        });
        Ok(())
    }

    fn define_label(&mut self, label: &str, line_num: usize) -> Result<(), AssemblerError> {
        if !is_identifier(label) {
            return Err(AssemblerError::Syntax {
                line: line_num,
                message: format!("invalid label name '{}'", label),
            });
        }
        if let Some(&first) = self.label_lines.get(label) {
            return Err(AssemblerError::DuplicateLabel {
                line: line_num,
                label: label.to_string(),
                first,
            });
        }
        // Addresses past the end are rejected later as ProgramTooLarge.
        let addr = self.statements.len().min(u16::MAX as usize) as u16;
        self.symbols.insert(label.to_string(), addr);
        self.label_lines.insert(label.to_string(), line_num);
        Ok(())
    }

    /// Pass 2: encode every statement with all labels known.
    fn encode_all(self) -> Result<AssembledProgram, AssemblerError> {
        let mut program = AssembledProgram {
            words: Vec::with_capacity(self.statements.len()),
            line_map: BTreeMap::new(),
            symbols: BTreeMap::new(),
        };

        for (addr, stmt) in self.statements.iter().enumerate() {
            let word = self.encode_statement(stmt)?;
            program.words.push(word);
            program.line_map.insert(addr as u16, stmt.line);
        }

        program.symbols = self.symbols;
        Ok(program)
    }

    fn encode_statement(&self, stmt: &Statement<'_>) -> Result<Word, AssemblerError> {
        if stmt.mnemonic.eq_ignore_ascii_case("DW") {
            let text = stmt.operand.ok_or_else(|| AssemblerError::MissingOperand {
                line: stmt.line,
                mnemonic: "DW".into(),
            })?;
            let value = self.parse_operand_value(text, stmt.line)?;
            check_range(value, i16::MIN as i64, u16::MAX as i64, stmt.line)?;
            return Ok(Word::from_i32_wrapping(value as i32));
        }

        let opcode = Opcode::from_mnemonic(stmt.mnemonic).ok_or_else(|| AssemblerError::UnknownMnemonic {
            line: stmt.line,
            mnemonic: stmt.mnemonic.to_string(),
        })?;

        let operand = match (opcode.operand_kind(), stmt.operand) {
            (OperandKind::None, None) => 0,
            (OperandKind::None, Some(_)) => {
                return Err(AssemblerError::UnexpectedOperand {
                    line: stmt.line,
                    mnemonic: opcode.mnemonic().into(),
                })
            }
            (kind, Some(text)) => {
                let value = self.parse_operand_value(text, stmt.line)?;
                let max = kind.max_value().unwrap_or(0) as i64;
                check_range(value, 0, max, stmt.line)?;
                value as u16
            }
            (_, None) => {
                return Err(AssemblerError::MissingOperand {
                    line: stmt.line,
                    mnemonic: opcode.mnemonic().into(),
                })
            }
        };

        Ok(encode(&Instruction::new(opcode, operand)))
    }

    fn parse_operand_value(&self, operand: &str, line_num: usize) -> Result<i64, AssemblerError> {
        if is_identifier(operand) {
            return self
                .symbols
                .get(operand)
                .map(|&addr| addr as i64)
                .ok_or_else(|| AssemblerError::UndefinedLabel {
                    line: line_num,
                    label: operand.to_string(),
                });
        }

        let (negative, digits) = match operand.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, operand.strip_prefix('+').unwrap_or(operand)),
        };

        let (radix, body) = if let Some(hex) = digits.strip_prefix("0x").or_else(|| digits.strip_prefix("0X")) {
            (16, hex)
        } else if let Some(bin) = digits.strip_prefix("0b").or_else(|| digits.strip_prefix("0B")) {
            (2, bin)
        } else {
            (10, digits)
        };

        // from_str_radix takes its own sign; only one leading sign is allowed.
        let syntax_error = || AssemblerError::Syntax {
            line: line_num,
            message: format!("invalid operand '{}'", operand),
        };
        if body.is_empty() || !body.chars().all(|c| c.is_digit(radix)) {
            return Err(syntax_error());
        }

        i64::from_str_radix(body, radix)
            .map(|value| if negative { -value } else { value })
            .map_err(|_| syntax_error())
    }
}

fn check_range(value: i64, min: i64, max: i64, line: usize) -> Result<(), AssemblerError> {
    if value < min || value > max {
        return Err(AssemblerError::ValueOutOfRange { line, value, min, max });
    }
    Ok(())
}

/// `[A-Za-z_.][A-Za-z0-9_.]*`
fn is_identifier(text: &str) -> bool {
    let mut chars = text.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '.' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

/// Errors that can occur during assembly.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AssemblerError {
    #[error("syntax error on line {line}: {message}")]
    Syntax { line: usize, message: String },

    #[error("unknown mnemonic on line {line}: {mnemonic}")]
    UnknownMnemonic { line: usize, mnemonic: String },

    #[error("missing operand on line {line}: {mnemonic} needs a value")]
    MissingOperand { line: usize, mnemonic: String },

    #[error("unexpected operand on line {line}: {mnemonic} takes none")]
    UnexpectedOperand { line: usize, mnemonic: String },

    #[error("undefined label on line {line}: {label}")]
    UndefinedLabel { line: usize, label: String },

    #[error("duplicate label on line {line}: {label} (first defined on line {first})")]
    DuplicateLabel { line: usize, label: String, first: usize },

    #[error("value out of range on line {line}: {value} (allowed {min}..={max})")]
    ValueOutOfRange { line: usize, value: i64, min: i64, max: i64 },

    #[error("program needs {words} words but memory holds {MEMORY_SIZE}")]
    ProgramTooLarge { words: usize },
}

impl AssemblerError {
    /// The 1-based source line, when the error belongs to one.
    pub fn line(&self) -> Option<usize> {
        match self {
            AssemblerError::Syntax { line, .. }
            | AssemblerError::UnknownMnemonic { line, .. }
            | AssemblerError::MissingOperand { line, .. }
            | AssemblerError::UnexpectedOperand { line, .. }
            | AssemblerError::UndefinedLabel { line, .. }
            | AssemblerError::DuplicateLabel { line, .. }
            | AssemblerError::ValueOutOfRange { line, .. } => Some(*line),
            AssemblerError::ProgramTooLarge { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn raw(program: &AssembledProgram) -> Vec<u16> {
        program.words.iter().map(|w| w.to_u16()).collect()
    }

    #[test]
    fn test_assemble_simple() {
        let source = r#"
            LOCO 10
            STOD 0x100
            LOCO 20
            STOD 0x101
            LODD 0x100
            ADDD 0x101
            STOD 0x102
            HALT
        "#;

        let program = assemble(source).unwrap();
        assert_eq!(
            raw(&program),
            vec![0x700A, 0x1100, 0x7014, 0x1101, 0x0100, 0x2101, 0x1102, 0xFF00]
        );
    }

    #[test]
    fn test_assemble_with_labels() {
        let source = "\
start:  LOCO 5
loop:
        SUBD one   ; forward reference
        JNZE loop
        JUMP start
one:    DW 1
";
        let program = assemble(source).unwrap();
        assert_eq!(raw(&program), vec![0x7005, 0x3004, 0xD001, 0x6000, 0x0001]);
        assert_eq!(program.address_of("start"), Some(0));
        assert_eq!(program.address_of("loop"), Some(1));
        assert_eq!(program.address_of("one"), Some(4));
    }

    #[test]
    fn test_line_map_skips_comments_and_blanks() {
        let source = "; header\n\nLOCO 1\n# note\nfoo: HALT\n";
        let program = assemble(source).unwrap();
        assert_eq!(program.line_for(0), Some(3));
        assert_eq!(program.line_for(1), Some(5));
        assert_eq!(program.line_for(2), None);
    }

    #[test]
    fn test_assemble_data() {
        let program = assemble("DW 42\nDW -1\nDW 0xFFFF\nDW 0b101\nDW -32768").unwrap();
        assert_eq!(raw(&program), vec![42, 0xFFFF, 0xFFFF, 5, 0x8000]);
    }

    #[test]
    fn test_mnemonics_case_insensitive_labels_case_sensitive() {
        let program = assemble("Loop: jump Loop").unwrap();
        assert_eq!(raw(&program), vec![0x6000]);

        let err = assemble("Loop: JUMP loop").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 1, label: "loop".into() });
    }

    #[test]
    fn test_stack_and_byte_operands() {
        let program = assemble("PUSH\nPOP\nPSHI\nPOPI\nSWAP\nRETN\nINSP 2\nDESP 255\nLODL 1").unwrap();
        assert_eq!(
            raw(&program),
            vec![0xF400, 0xF600, 0xF000, 0xF200, 0xFA00, 0xF800, 0xFC02, 0xFEFF, 0x8001]
        );
    }

    #[test]
    fn test_undefined_label_reports_line() {
        let err = assemble("LOCO 1\n\nJUMP nowhere\n").unwrap_err();
        assert_eq!(err, AssemblerError::UndefinedLabel { line: 3, label: "nowhere".into() });
        assert_eq!(err.line(), Some(3));
    }

    #[test]
    fn test_duplicate_label() {
        let err = assemble("a: HALT\na: HALT").unwrap_err();
        assert_eq!(err, AssemblerError::DuplicateLabel { line: 2, label: "a".into(), first: 1 });
    }

    #[test]
    fn test_operand_errors() {
        assert!(matches!(
            assemble("LODD 4096"),
            Err(AssemblerError::ValueOutOfRange { line: 1, value: 4096, .. })
        ));
        assert!(matches!(
            assemble("INSP 256"),
            Err(AssemblerError::ValueOutOfRange { line: 1, max: 255, .. })
        ));
        assert!(matches!(
            assemble("LOCO -1"),
            Err(AssemblerError::ValueOutOfRange { .. })
        ));
        assert!(matches!(assemble("DW 70000"), Err(AssemblerError::ValueOutOfRange { .. })));
        assert!(matches!(assemble("\nLODD"), Err(AssemblerError::MissingOperand { line: 2, .. })));
        assert!(matches!(assemble("HALT 3"), Err(AssemblerError::UnexpectedOperand { line: 1, .. })));
        assert!(matches!(assemble("MOVE 3"), Err(AssemblerError::UnknownMnemonic { line: 1, .. })));
        assert!(matches!(assemble("LODD 0xZZ"), Err(AssemblerError::Syntax { line: 1, .. })));
        assert!(matches!(assemble("LODD 1 2"), Err(AssemblerError::Syntax { line: 1, .. })));
        assert!(matches!(assemble("9x: HALT"), Err(AssemblerError::Syntax { line: 1, .. })));
    }

    #[test]
    fn test_doubled_signs_rejected() {
        for source in ["DW 0x-5", "DW --5", "DW -0x-5", "LODD 0x+10", "DW +-7", "LODD 0b+1", "DW -", "DW 0x", "LODD 0b"] {
            assert!(
                matches!(assemble(source), Err(AssemblerError::Syntax { line: 1, .. })),
                "{} should not assemble",
                source
            );
        }
        assert_eq!(assemble("DW -0x5").unwrap().words[0].to_u16(), 0xFFFB);
        assert_eq!(assemble("DW +7").unwrap().words[0].to_u16(), 7);
        assert_eq!(assemble("LODD 0b101").unwrap().words[0].to_u16(), 5);
    }

    #[test]
    fn test_program_too_large() {
        let source = "HALT\n".repeat(MEMORY_SIZE + 1);
        assert_eq!(
            assemble(&source),
            Err(AssemblerError::ProgramTooLarge { words: MEMORY_SIZE + 1 })
        );
        assert_eq!(assemble(&"HALT\n".repeat(MEMORY_SIZE)).unwrap().len(), MEMORY_SIZE);
    }

    #[test]
    fn test_empty_source() {
        let program = assemble("; nothing here\n").unwrap();
        assert!(program.is_empty());
    }

    proptest! {
        #[test]
        fn prop_line_map_tracks_source_lines(layout in proptest::collection::vec(0u8..3, 1..40)) {
            // 0 = instruction, 1 = blank, 2 = comment
            let mut source = String::new();
            let mut expected = Vec::new();
            for (i, kind) in layout.iter().enumerate() {
                match kind {
                    0 => {
                        source.push_str("LOCO 1\n");
                        expected.push(i + 1);
                    }
                    1 => source.push('\n'),
                    _ => source.push_str("; comment\n"),
                }
            }
            let program = assemble(&source).unwrap();
            prop_assert_eq!(program.len(), expected.len());
            for (addr, line) in expected.iter().enumerate() {
                prop_assert_eq!(program.line_for(addr as u16), Some(*line));
            }
        }

        #[test]
        fn prop_address_operands_in_range_encode(addr in 0u16..4096) {
            let program = assemble(&format!("JUMP {}", addr)).unwrap();
            prop_assert_eq!(program.words[0].to_u16(), 0x6000 | addr);
        }
    }
}
