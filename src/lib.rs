//! # COMET II Emulator
//!
//! An instruction-set emulator for COMET II, the 16-bit teaching CPU used
//! alongside the CASL II assembly language.
//!
//! The crate only models the processor: a caller loads raw words into
//! memory, sets up the registers and trap table, and then drives
//! [`Cpu::step`] (or [`Cpu::run_until`]) itself.

pub mod cpu;
pub mod config;

// Re-export commonly used types
pub use cpu::{Cpu, CpuError, RunExit, Memory, Registers, Flags, Instruction, Operand, DecodeError, TrapTable};
pub use config::{RunConfig, ConfigError};
