//! Assembler output: machine words plus debugging metadata.

use crate::word::Word;
use serde::{Serialize, Deserialize};
use std::collections::BTreeMap;

/// An assembled program, loaded at address 0.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AssembledProgram {
    /// Instruction and data words in address order.
    pub words: Vec<Word>,
    /// Word address -> 1-based source line it came from.
    pub line_map: BTreeMap<u16, usize>,
    /// Label -> word address.
    pub symbols: BTreeMap<String, u16>,
}

impl AssembledProgram {
    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    /// Source line that produced the word at `addr`.
    pub fn line_for(&self, addr: u16) -> Option<usize> {
        self.line_map.get(&addr).copied()
    }

    pub fn address_of(&self, label: &str) -> Option<u16> {
        self.symbols.get(label).copied()
    }

    /// Labels defined at `addr`, alphabetically.
    pub fn labels_at(&self, addr: u16) -> Vec<&str> {
        self.symbols
            .iter()
            .filter(|&(_, &a)| a == addr)
            .map(|(name, _)| name.as_str())
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookups() {
        let mut program = AssembledProgram::default();
        program.words = vec![Word::from_u16(0xFF00)];
        program.line_map.insert(0, 3);
        program.symbols.insert("start".into(), 0);
        program.symbols.insert("end".into(), 0);

        assert_eq!(program.len(), 1);
        assert_eq!(program.line_for(0), Some(3));
        assert_eq!(program.line_for(1), None);
        assert_eq!(program.address_of("start"), Some(0));
        assert_eq!(program.labels_at(0), vec!["end", "start"]);
    }
}
