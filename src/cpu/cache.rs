//! Direct-mapped unified cache in front of main memory.
//!
//! Geometry: 8 lines of 4 words. An address splits into
//! `tag (7 bits) | index (3 bits) | offset (2 bits)`.
//!
//! Reads are counted as hits or misses; a miss fills the whole line from
//! memory. Writes go straight through to memory and patch the cached copy
//! when the line is present. Writes never allocate and never touch the
//! statistics.

use crate::cpu::memory::Memory;
use crate::word::Word;
use serde::{Serialize, Deserialize};

/// Number of cache lines.
pub const CACHE_LINES: usize = 8;
/// Words per cache line.
pub const LINE_WORDS: usize = 4;
/// Width of the stored tag.
pub const TAG_BITS: u32 = 7;

const TAG_MASK: u16 = (1 << TAG_BITS) - 1;

/// One cache line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheLine {
    pub valid: bool,
    pub tag: u16,
    pub data: [Word; LINE_WORDS],
}

/// Hit/miss counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
}

impl CacheStats {
    /// Total counted accesses.
    pub fn accesses(&self) -> u64 {
        self.hits + self.misses
    }

    /// Fraction of accesses that hit, 0.0 when nothing was accessed.
    pub fn hit_rate(&self) -> f64 {
        match self.accesses() {
            0 => 0.0,
            total => self.hits as f64 / total as f64,
        }
    }
}

/// Where an address lands in the cache.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CacheSlot {
    pub index: usize,
    pub tag: u16,
    pub offset: usize,
}

impl CacheSlot {
    pub fn of(addr: u16) -> Self {
        Self {
            index: ((addr as usize) / LINE_WORDS) % CACHE_LINES,
            tag: (addr / (LINE_WORDS * CACHE_LINES) as u16) & TAG_MASK,
            offset: (addr as usize) % LINE_WORDS,
        }
    }
}

/// The cache proper.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Cache {
    lines: [CacheLine; CACHE_LINES],
    stats: CacheStats,
}

impl Cache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read through the cache. Returns the word and whether it hit.
    pub fn read(&mut self, mem: &Memory, addr: u16) -> (Word, bool) {
        let slot = CacheSlot::of(addr);
        let line = &mut self.lines[slot.index];

        if line.valid && line.tag == slot.tag {
            self.stats.hits += 1;
            log::trace!("cache hit  {:#05x} (line {}, word {})", addr, slot.index, slot.offset);
            return (line.data[slot.offset], true);
        }

        self.stats.misses += 1;
        let base = (addr as usize) - slot.offset;
        let block = mem.block(base, LINE_WORDS);
        line.data.copy_from_slice(&block);
        if line.valid {
            log::trace!("cache miss {:#05x}: evicting tag {} from line {}", addr, line.tag, slot.index);
        } else {
            log::trace!("cache miss {:#05x}: filling line {}", addr, slot.index);
        }
        line.valid = true;
        line.tag = slot.tag;
        (line.data[slot.offset], false)
    }

    /// Write to memory, updating the cached copy if the line is resident.
    pub fn write_through(&mut self, mem: &mut Memory, addr: u16, value: Word) {
        mem.write(addr as usize, value);
        let slot = CacheSlot::of(addr);
        let line = &mut self.lines[slot.index];
        if line.valid && line.tag == slot.tag {
            line.data[slot.offset] = value;
        }
    }

    /// Drop every line and zero the counters.
    pub fn invalidate_all(&mut self) {
        self.lines = [CacheLine::default(); CACHE_LINES];
        self.stats = CacheStats::default();
    }

    pub fn stats(&self) -> CacheStats {
        self.stats
    }

    pub fn line(&self, index: usize) -> Option<&CacheLine> {
        self.lines.get(index)
    }

    pub fn lines(&self) -> &[CacheLine] {
        &self.lines
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn memory_with(values: &[(usize, u16)]) -> Memory {
        let mut mem = Memory::new();
        for &(addr, value) in values {
            mem.write(addr, Word::from_u16(value));
        }
        mem
    }

    #[test]
    fn test_slot_geometry() {
        let slot = CacheSlot::of(0x102);
        assert_eq!(slot.index, 0);
        assert_eq!(slot.tag, 8);
        assert_eq!(slot.offset, 2);

        let slot = CacheSlot::of(0x0FFF);
        assert_eq!(slot.index, 7);
        assert_eq!(slot.tag, 0x7F);
        assert_eq!(slot.offset, 3);
    }

    #[test]
    fn test_miss_then_hits_within_line() {
        let mem = memory_with(&[(4, 10), (5, 11), (7, 13)]);
        let mut cache = Cache::new();

        assert_eq!(cache.read(&mem, 4), (Word::from_u16(10), false));
        assert_eq!(cache.read(&mem, 5), (Word::from_u16(11), true));
        assert_eq!(cache.read(&mem, 7), (Word::from_u16(13), true));
        assert_eq!(cache.stats(), CacheStats { hits: 2, misses: 1 });

        let line = cache.line(1).unwrap();
        assert!(line.valid);
        assert_eq!(line.tag, 0);
    }

    #[test]
    fn test_conflicting_lines_evict() {
        // 0x000 and 0x020 share line 0 with different tags.
        let mem = memory_with(&[(0x000, 1), (0x020, 2)]);
        let mut cache = Cache::new();

        cache.read(&mem, 0x000);
        assert_eq!(cache.read(&mem, 0x020).0.to_u16(), 2);
        assert_eq!(cache.read(&mem, 0x000), (Word::from_u16(1), false));
        assert_eq!(cache.stats().misses, 3);
        assert_eq!(cache.stats().hits, 0);
    }

    #[test]
    fn test_write_through_patches_resident_line() {
        let mut mem = Memory::new();
        let mut cache = Cache::new();

        cache.read(&mem, 8);
        cache.write_through(&mut mem, 9, Word::from_u16(99));
        assert_eq!(mem.read(9).to_u16(), 99);
        assert_eq!(cache.read(&mem, 9), (Word::from_u16(99), true));
    }

    #[test]
    fn test_write_does_not_allocate_or_count() {
        let mut mem = Memory::new();
        let mut cache = Cache::new();

        cache.write_through(&mut mem, 0x40, Word::from_u16(5));
        assert_eq!(cache.stats().accesses(), 0);
        assert!(cache.lines().iter().all(|line| !line.valid));
    }

    #[test]
    fn test_invalidate_all() {
        let mem = Memory::new();
        let mut cache = Cache::new();
        cache.read(&mem, 0);
        cache.read(&mem, 0);

        cache.invalidate_all();
        assert_eq!(cache.stats(), CacheStats::default());
        assert!(cache.lines().iter().all(|line| !line.valid));
        assert_eq!(cache.stats().hit_rate(), 0.0);
    }

    proptest! {
        #[test]
        fn prop_every_read_is_counted(addrs in proptest::collection::vec(0u16..4096, 0..64)) {
            let mem = Memory::new();
            let mut cache = Cache::new();
            for &addr in &addrs {
                cache.read(&mem, addr);
            }
            prop_assert_eq!(cache.stats().accesses(), addrs.len() as u64);
        }

        #[test]
        fn prop_repeat_read_hits(addr in 0u16..4096) {
            let mem = Memory::new();
            let mut cache = Cache::new();
            let (_, first) = cache.read(&mem, addr);
            let (_, second) = cache.read(&mem, addr);
            prop_assert!(!first);
            prop_assert!(second);
        }

        #[test]
        fn prop_cache_agrees_with_memory(writes in proptest::collection::vec((0u16..4096, any::<u16>()), 0..32),
                                         reads in proptest::collection::vec(0u16..4096, 0..32)) {
            let mut mem = Memory::new();
            let mut cache = Cache::new();
            for &addr in &reads {
                cache.read(&mem, addr);
            }
            for &(addr, value) in &writes {
                cache.write_through(&mut mem, addr, Word::from_u16(value));
            }
            for &addr in &reads {
                let (word, _) = cache.read(&mem, addr);
                prop_assert_eq!(word, mem.read(addr as usize));
            }
        }
    }
}
