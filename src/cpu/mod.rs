//! CPU emulation for COMET II.
//!
//! This module implements the complete COMET II architecture:
//! - 65536 sixteen-bit memory words
//! - GR0-GR7, PR, SP and the OF/SF/ZF flag register
//! - the full instruction set, including SVC through a trap table

pub mod memory;
pub mod registers;
pub mod decode;
pub mod alu;
pub mod trap;
pub mod execute;

pub use memory::Memory;
pub use registers::{Registers, Flags};
pub use decode::{Instruction, Operand, RawInstruction, DecodeError, decode};
pub use trap::TrapTable;
pub use execute::{Cpu, CpuError, RunExit};
