//! COMET II CPU registers.
//!
//! The register file holds:
//! - GR0-GR7: 16-bit general registers (GR1-GR7 double as index registers)
//! - PR: program register, the address of the next word to fetch
//! - SP: stack pointer, the most recently pushed slot (grows downward)
//! - FR: flag register with the OF, SF and ZF bits

use serde::{Serialize, Deserialize};

/// Number of general registers.
pub const GR_COUNT: usize = 8;

/// The three-bit flag register.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Flags {
    /// Overflow.
    pub of: bool,
    /// Sign: bit 15 of the last result.
    pub sf: bool,
    /// Zero.
    pub zf: bool,
}

impl Flags {
    /// Derive SF and ZF from a truncated 16-bit result.
    pub fn from_result(result: u16, overflow: bool) -> Self {
        Self {
            of: overflow,
            sf: result & 0x8000 != 0,
            zf: result == 0,
        }
    }

}

impl std::fmt::Display for Flags {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "OF={} SF={} ZF={}",
            self.of as u8, self.sf as u8, self.zf as u8
        )
    }
}

/// The COMET II register file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registers {
    /// GR0-GR7.
    pub gr: [u16; GR_COUNT],
    /// PR: program register.
    pub pr: u16,
    /// SP: stack pointer.
    pub sp: u16,
    /// FR: flag register.
    pub fr: Flags,
}

impl Registers {
    /// Create a new register file with all values zeroed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset all registers to zero.
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Increment the program register by 1.
    /// Returns the old value.
    pub fn advance_pr(&mut self) -> u16 {
        let old = self.pr;
        self.pr = self.pr.wrapping_add(1);
        old
    }

    /// Index `base` by GR`x`. GR0 cannot be used as an index register,
    /// so `x == 0` leaves the address unchanged.
    pub fn effective_address(&self, base: u16, x: u8) -> u16 {
        match x {
            0 => base,
            x => base.wrapping_add(self.gr[x as usize]),
        }
    }

    /// Pre-decrement SP and return the new top-of-stack slot.
    pub fn push_slot(&mut self) -> u16 {
        self.sp = self.sp.wrapping_sub(1);
        self.sp
    }

    /// Return the top-of-stack slot and post-increment SP.
    pub fn pop_slot(&mut self) -> u16 {
        let slot = self.sp;
        self.sp = self.sp.wrapping_add(1);
        slot
    }
}

impl std::fmt::Display for Registers {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, value) in self.gr.iter().enumerate() {
            write!(f, "GR{}={:04x} ", i, value)?;
        }
        write!(f, "PR={:04x} SP={:04x} {}", self.pr, self.sp, self.fr)
    }
}
