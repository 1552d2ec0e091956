//! MIC-1 main memory.
//!
//! 4096 sixteen-bit words, addressed 0..4095 by the 12-bit MAR.
//! Accesses outside that range are clamped: reads yield zero and writes
//! are dropped, so the datapath never has to branch on an address error.

use crate::word::Word;
use serde::{Serialize, Deserialize};

/// The number of words in main memory.
pub const MEMORY_SIZE: usize = 4096;

/// Mask applied to addresses coming off the B bus into MAR.
pub const ADDRESS_MASK: u16 = 0x0FFF;

/// Main memory: 4096 sixteen-bit words.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<Word>,
}

impl Memory {
    /// Create a new memory with all cells zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![Word::zero(); MEMORY_SIZE],
        }
    }

    /// Read a word. Out-of-range addresses read as zero.
    #[inline]
    pub fn read(&self, addr: usize) -> Word {
        self.cells.get(addr).copied().unwrap_or_default()
    }

    /// Write a word. Out-of-range addresses are ignored.
    #[inline]
    pub fn write(&mut self, addr: usize, value: Word) {
        if let Some(cell) = self.cells.get_mut(addr) {
            *cell = value;
        } else {
            log::trace!("memory write to {:#06x} dropped (out of range)", addr);
        }
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(Word::zero());
    }

    /// Copy `words` into memory starting at `start_addr`.
    ///
    /// Anything past the end of memory is discarded. Returns the number of
    /// words actually written.
    pub fn load(&mut self, start_addr: usize, words: &[Word]) -> usize {
        if start_addr >= MEMORY_SIZE {
            return 0;
        }
        let count = words.len().min(MEMORY_SIZE - start_addr);
        self.cells[start_addr..start_addr + count].copy_from_slice(&words[..count]);
        count
    }

    /// The words of one aligned block, used for cache line fills.
    pub fn block(&self, start_addr: usize, len: usize) -> Vec<Word> {
        (start_addr..start_addr + len).map(|addr| self.read(addr)).collect()
    }

    /// Dump memory contents (for debugging views).
    pub fn dump(&self, start: usize, count: usize) -> Vec<(usize, Word)> {
        let end = start.saturating_add(count).min(MEMORY_SIZE);
        (start.min(end)..end)
            .map(|i| (i, self.cells[i]))
            .collect()
    }
}

impl Default for Memory {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for Memory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let non_zero = self.cells.iter().filter(|cell| !cell.is_zero()).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_memory_read_write() {
        let mut mem = Memory::new();
        mem.write(10, Word::from_u16(42));
        assert_eq!(mem.read(10).to_u16(), 42);
    }

    #[test]
    fn test_memory_bounds_are_clamped() {
        let mut mem = Memory::new();
        mem.write(MEMORY_SIZE, Word::from_u16(7));
        mem.write(usize::MAX, Word::from_u16(7));
        assert_eq!(mem.read(MEMORY_SIZE).to_u16(), 0);
        assert_eq!(mem.read(usize::MAX).to_u16(), 0);
        assert_eq!(mem.dump(0, MEMORY_SIZE).iter().filter(|(_, w)| !w.is_zero()).count(), 0);
    }

    #[test]
    fn test_load_truncates_at_end() {
        let mut mem = Memory::new();
        let words = [Word::from_u16(1), Word::from_u16(2), Word::from_u16(3)];

        assert_eq!(mem.load(0, &words), 3);
        assert_eq!(mem.read(2).to_u16(), 3);

        assert_eq!(mem.load(MEMORY_SIZE - 2, &words), 2);
        assert_eq!(mem.read(MEMORY_SIZE - 1).to_u16(), 2);
        assert_eq!(mem.load(MEMORY_SIZE, &words), 0);
    }

    #[test]
    fn test_block_and_dump() {
        let mut mem = Memory::new();
        mem.write(4, Word::from_u16(9));
        let block = mem.block(4, 4);
        assert_eq!(block.len(), 4);
        assert_eq!(block[0].to_u16(), 9);

        assert_eq!(mem.dump(MEMORY_SIZE - 2, 10).len(), 2);
        assert!(mem.dump(MEMORY_SIZE + 5, 3).is_empty());
    }

    proptest! {
        #[test]
        fn prop_write_then_read(addr in 0usize..MEMORY_SIZE, value: u16) {
            let mut mem = Memory::new();
            mem.write(addr, Word::from_u16(value));
            prop_assert_eq!(mem.read(addr).to_u16(), value);
        }
    }
}
