//! Disassembler for MIC-1 programs.
//!
//! Converts instruction words back to readable assembly, optionally
//! annotated with the labels and source lines they came from.

use crate::asm::program::AssembledProgram;
use crate::cpu::decode::decode;
use crate::word::Word;

/// Disassemble a single word.
pub fn disassemble_word(word: Word) -> String {
    decode(word).to_string()
}

/// Disassemble a run of words starting at address 0.
pub fn disassemble(words: &[Word]) -> String {
    let mut output = String::new();
    for (addr, word) in words.iter().enumerate() {
        output.push_str(&format!("{:03X}: {:04X}  {}\n", addr, word, disassemble_word(*word)));
    }
    output
}

/// Full listing of an assembled program: address, word, labels,
/// disassembly and the originating source text.
pub fn listing(program: &AssembledProgram, source: &str) -> String {
    let lines: Vec<&str> = source.lines().collect();
    let mut output = String::new();

    for (addr, word) in program.words.iter().enumerate() {
        let addr = addr as u16;
        let labels = program
            .labels_at(addr)
            .iter()
            .map(|label| format!("{}:", label))
            .collect::<Vec<_>>()
            .join(" ");
        let source_text = program
            .line_for(addr)
            .and_then(|line| lines.get(line - 1).map(|text| (line, text.trim())));

        let mut row = format!("{:03X}: {:04X}  {:<10} {:<14}", addr, word, labels, disassemble_word(*word));
        if let Some((line, text)) = source_text {
            row.push_str(&format!(" ; {:>4}| {}", line, text));
        }
        output.push_str(row.trim_end());
        output.push('\n');
    }

    output
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm::assemble;

    #[test]
    fn test_disassemble_word() {
        assert_eq!(disassemble_word(Word::from_u16(0xFF00)), "HALT");
        assert_eq!(disassemble_word(Word::from_u16(0x2101)), "ADDD 0x101");
        assert_eq!(disassemble_word(Word::from_u16(0xFC03)), "INSP 3");
    }

    #[test]
    fn test_disassemble_block() {
        let text = disassemble(&[Word::from_u16(0x700A), Word::from_u16(0xFF00)]);
        assert_eq!(text, "000: 700A  LOCO 10\n001: FF00  HALT\n");
    }

    #[test]
    fn test_listing_carries_labels_and_source() {
        let source = "start: LOCO 1\n\n  JUMP start ; again\n";
        let program = assemble(source).unwrap();
        let text = listing(&program, source);
        let rows: Vec<&str> = text.lines().collect();

        assert_eq!(rows.len(), 2);
        assert!(rows[0].starts_with("000: 7001  start:"));
        assert!(rows[0].contains("LOCO 1"));
        assert!(rows[0].ends_with("1| start: LOCO 1"));
        assert!(rows[1].contains("JUMP 0x000"));
        assert!(rows[1].ends_with("3| JUMP start ; again"));
    }
}
