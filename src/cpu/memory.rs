//! COMET II main memory.
//!
//! A flat store of 65536 sixteen-bit words. Addresses are word addresses,
//! so every `u16` is a valid location and there is nothing to bounds-check.

use serde::{Serialize, Deserialize};

/// The number of words in the address space.
pub const MEMORY_SIZE: usize = 0x10000;

/// COMET II memory: 64K sixteen-bit words.
#[derive(Clone, Serialize, Deserialize)]
pub struct Memory {
    cells: Vec<u16>,
}

impl Memory {
    /// Create a new memory with all words zeroed.
    pub fn new() -> Self {
        Self {
            cells: vec![0; MEMORY_SIZE],
        }
    }

    /// Read the word at `addr`.
    #[inline]
    pub fn read(&self, addr: u16) -> u16 {
        self.cells[addr as usize]
    }

    /// Write `value` to `addr`.
    #[inline]
    pub fn write(&mut self, addr: u16, value: u16) {
        self.cells[addr as usize] = value;
    }

    /// Clear all memory to zeros.
    pub fn clear(&mut self) {
        self.cells.fill(0);
    }

    /// Copy `image` into consecutive words starting at `origin`.
    ///
    /// Images running past 0xFFFF wrap around to address 0. Words beyond
    /// the size of the address space overwrite earlier ones.
    pub fn load_image(&mut self, origin: u16, image: &[u16]) {
        let mut addr = origin;
        for &word in image {
            self.write(addr, word);
            addr = addr.wrapping_add(1);
        }
    }

    /// Dump `count` words starting at `start` (for debugging).
    pub fn dump(&self, start: u16, count: usize) -> Vec<(u16, u16)> {
        (0..count.min(MEMORY_SIZE))
            .map(|i| {
                let addr = start.wrapping_add(i as u16);
                (addr, self.read(addr))
            })
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
        let non_zero = self.cells.iter().filter(|&&w| w != 0).count();

        f.debug_struct("Memory")
            .field("non_zero_cells", &non_zero)
            .field("total_cells", &MEMORY_SIZE)
            .finish()
    }
}
