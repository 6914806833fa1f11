//! Instruction decoder for COMET II.
//!
//! Every instruction starts with one 16-bit word laid out as
//!
//! ```text
//!  15      12 11       8 7        4 3        0
//! +----------+----------+----------+----------+
//! |   op1    |   op2    |  r1 / r  |  r2 / x  |
//! +----------+----------+----------+----------+
//! ```
//!
//! `op1:op2` together form the 8-bit opcode. Register-memory forms are
//! followed by a second word holding the address (or immediate) operand;
//! that word is fetched at execution time, not here.

use crate::cpu::registers::GR_COUNT;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// The fields of a raw instruction word.
///
/// Splitting never fails: whether the opcode means anything is decided
/// by [`Instruction::from_raw`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RawInstruction {
    /// Full 8-bit opcode (bits 15..8).
    pub op: u8,
    /// Opcode group (bits 15..12).
    pub op1: u8,
    /// Opcode within the group (bits 11..8).
    pub op2: u8,
    /// First register field (bits 7..4).
    pub r1: u8,
    /// Second register / index field (bits 3..0).
    pub r2: u8,
}

impl RawInstruction {
    /// The register operand of a register-memory instruction.
    #[inline]
    pub fn r(&self) -> u8 {
        self.r1
    }

    /// The index register of a register-memory instruction.
    #[inline]
    pub fn x(&self) -> u8 {
        self.r2
    }
}

/// Split a word into its instruction fields.
pub fn decode(word: u16) -> RawInstruction {
    RawInstruction {
        op: (word >> 8) as u8,
        op1: (word >> 12) as u8 & 0xf,
        op2: (word >> 8) as u8 & 0xf,
        r1: (word >> 4) as u8 & 0xf,
        r2: word as u8 & 0xf,
    }
}

/// Where the second operand of a two-operand instruction comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Operand {
    /// `r, adr, x`: GR`r` against the word at the effective address.
    Memory { r: u8, x: u8 },
    /// `r1, r2`: GR`r1` against GR`r2`.
    Register { r1: u8, r2: u8 },
}

impl Operand {
    /// The destination (left-hand) register.
    pub fn target(&self) -> u8 {
        match *self {
            Operand::Memory { r, .. } => r,
            Operand::Register { r1, .. } => r1,
        }
    }

    fn fields(&self) -> (u8, u8) {
        match *self {
            Operand::Memory { r, x } => (r, x),
            Operand::Register { r1, r2 } => (r1, r2),
        }
    }
}

/// Decoded COMET II instruction.
///
/// Variants carrying `x` read an address word from the instruction stream
/// when executed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Instruction {
    /// No operation
    Nop,

    // ==================== Load / Store ====================

    /// Load: GR[r] := [adr+x] or GR[r1] := GR[r2]
    Ld(Operand),
    /// Store: [adr+x] := GR[r]
    St { r: u8, x: u8 },
    /// Load address: GR[r] := adr+x
    Lad { r: u8, x: u8 },

    // ==================== Arithmetic ====================

    /// Add arithmetic (signed)
    Adda(Operand),
    /// Subtract arithmetic (signed)
    Suba(Operand),
    /// Add logical (unsigned)
    Addl(Operand),
    /// Subtract logical (unsigned)
    Subl(Operand),

    // ==================== Logical ====================

    And(Operand),
    Or(Operand),
    Xor(Operand),

    // ==================== Compare ====================

    /// Compare arithmetic (signed)
    Cpa(Operand),
    /// Compare logical (unsigned)
    Cpl(Operand),

    // ==================== Shift ====================

    /// Shift left arithmetic by adr+x bits
    Sla { r: u8, x: u8 },
    /// Shift right arithmetic by adr+x bits
    Sra { r: u8, x: u8 },
    /// Shift left logical by adr+x bits
    Sll { r: u8, x: u8 },
    /// Shift right logical by adr+x bits
    Srl { r: u8, x: u8 },

    // ==================== Branch ====================

    /// Jump on minus (SF=1)
    Jmi { x: u8 },
    /// Jump on non-zero (ZF=0)
    Jnz { x: u8 },
    /// Jump on zero (ZF=1)
    Jze { x: u8 },
    /// Unconditional jump
    Jump { x: u8 },
    /// Jump on plus (SF=0 and ZF=0)
    Jpl { x: u8 },
    /// Jump on overflow (OF=1)
    Jov { x: u8 },

    // ==================== Stack / Subroutine ====================

    /// Push adr+x
    Push { x: u8 },
    /// Pop into GR[r]
    Pop { r: u8 },
    /// Call subroutine at adr+x
    Call { x: u8 },
    /// Return from subroutine
    Ret,

    // ==================== Supervisor ====================

    /// Supervisor call through the trap table entry adr+x
    Svc { x: u8 },
}

/// Opcode values.
mod opcode {
    pub const NOP: u8 = 0x00;
    pub const LD: u8 = 0x10;
    pub const ST: u8 = 0x11;
    pub const LAD: u8 = 0x12;
    pub const LD_RR: u8 = 0x14;
    pub const ADDA: u8 = 0x20;
    pub const SUBA: u8 = 0x21;
    pub const ADDL: u8 = 0x22;
    pub const SUBL: u8 = 0x23;
    pub const ADDA_RR: u8 = 0x24;
    pub const SUBA_RR: u8 = 0x25;
    pub const ADDL_RR: u8 = 0x26;
    pub const SUBL_RR: u8 = 0x27;
    pub const AND: u8 = 0x30;
    pub const OR: u8 = 0x31;
    pub const XOR: u8 = 0x32;
    pub const AND_RR: u8 = 0x34;
    pub const OR_RR: u8 = 0x35;
    pub const XOR_RR: u8 = 0x36;
    pub const CPA: u8 = 0x40;
    pub const CPL: u8 = 0x41;
    pub const CPA_RR: u8 = 0x44;
    pub const CPL_RR: u8 = 0x45;
    pub const SLA: u8 = 0x50;
    pub const SRA: u8 = 0x51;
    pub const SLL: u8 = 0x52;
    pub const SRL: u8 = 0x53;
    pub const JMI: u8 = 0x61;
    pub const JNZ: u8 = 0x62;
    pub const JZE: u8 = 0x63;
    pub const JUMP: u8 = 0x64;
    pub const JPL: u8 = 0x65;
    pub const JOV: u8 = 0x66;
    pub const PUSH: u8 = 0x70;
    pub const POP: u8 = 0x71;
    pub const CALL: u8 = 0x80;
    pub const RET: u8 = 0x81;
    pub const SVC: u8 = 0xf0;
}

/// Reject register fields naming anything past GR7.
fn reg(field: u8) -> Result<u8, DecodeError> {
    if (field as usize) < GR_COUNT {
        Ok(field)
    } else {
        Err(DecodeError::InvalidRegister(field))
    }
}

impl Instruction {
    /// Look up the instruction for a split word.
    pub fn from_raw(raw: RawInstruction) -> Result<Self, DecodeError> {
        let mem = || -> Result<Operand, DecodeError> {
            Ok(Operand::Memory { r: reg(raw.r())?, x: reg(raw.x())? })
        };
        let rr = || -> Result<Operand, DecodeError> {
            Ok(Operand::Register { r1: reg(raw.r1)?, r2: reg(raw.r2)? })
        };
        let r = || reg(raw.r());
        let x = || reg(raw.x());

        let instruction = match raw.op {
            opcode::NOP => Instruction::Nop,
            opcode::LD => Instruction::Ld(mem()?),
            opcode::ST => Instruction::St { r: r()?, x: x()? },
            opcode::LAD => Instruction::Lad { r: r()?, x: x()? },
            opcode::LD_RR => Instruction::Ld(rr()?),
            opcode::ADDA => Instruction::Adda(mem()?),
            opcode::SUBA => Instruction::Suba(mem()?),
            opcode::ADDL => Instruction::Addl(mem()?),
            opcode::SUBL => Instruction::Subl(mem()?),
            opcode::ADDA_RR => Instruction::Adda(rr()?),
            opcode::SUBA_RR => Instruction::Suba(rr()?),
            opcode::ADDL_RR => Instruction::Addl(rr()?),
            opcode::SUBL_RR => Instruction::Subl(rr()?),
            opcode::AND => Instruction::And(mem()?),
            opcode::OR => Instruction::Or(mem()?),
            opcode::XOR => Instruction::Xor(mem()?),
            opcode::AND_RR => Instruction::And(rr()?),
            opcode::OR_RR => Instruction::Or(rr()?),
            opcode::XOR_RR => Instruction::Xor(rr()?),
            opcode::CPA => Instruction::Cpa(mem()?),
            opcode::CPL => Instruction::Cpl(mem()?),
            opcode::CPA_RR => Instruction::Cpa(rr()?),
            opcode::CPL_RR => Instruction::Cpl(rr()?),
            opcode::SLA => Instruction::Sla { r: r()?, x: x()? },
            opcode::SRA => Instruction::Sra { r: r()?, x: x()? },
            opcode::SLL => Instruction::Sll { r: r()?, x: x()? },
            opcode::SRL => Instruction::Srl { r: r()?, x: x()? },
            opcode::JMI => Instruction::Jmi { x: x()? },
            opcode::JNZ => Instruction::Jnz { x: x()? },
            opcode::JZE => Instruction::Jze { x: x()? },
            opcode::JUMP => Instruction::Jump { x: x()? },
            opcode::JPL => Instruction::Jpl { x: x()? },
            opcode::JOV => Instruction::Jov { x: x()? },
            opcode::PUSH => Instruction::Push { x: x()? },
            opcode::POP => Instruction::Pop { r: r()? },
            opcode::CALL => Instruction::Call { x: x()? },
            opcode::RET => Instruction::Ret,
            opcode::SVC => Instruction::Svc { x: x()? },
            op => return Err(DecodeError::InvalidOpcode(op)),
        };

        Ok(instruction)
    }

    /// Decode a raw word.
    pub fn from_word(word: u16) -> Result<Self, DecodeError> {
        Self::from_raw(decode(word))
    }

    /// Encode the first word of the instruction.
    ///
    /// Unused register fields are encoded as zero.
    pub fn word(&self) -> u16 {
        let (op, r1, r2) = match *self {
            Instruction::Nop => (opcode::NOP, 0, 0),
            Instruction::Ld(operand) => Self::two_operand(operand, opcode::LD, opcode::LD_RR),
            Instruction::St { r, x } => (opcode::ST, r, x),
            Instruction::Lad { r, x } => (opcode::LAD, r, x),
            Instruction::Adda(operand) => Self::two_operand(operand, opcode::ADDA, opcode::ADDA_RR),
            Instruction::Suba(operand) => Self::two_operand(operand, opcode::SUBA, opcode::SUBA_RR),
            Instruction::Addl(operand) => Self::two_operand(operand, opcode::ADDL, opcode::ADDL_RR),
            Instruction::Subl(operand) => Self::two_operand(operand, opcode::SUBL, opcode::SUBL_RR),
            Instruction::And(operand) => Self::two_operand(operand, opcode::AND, opcode::AND_RR),
            Instruction::Or(operand) => Self::two_operand(operand, opcode::OR, opcode::OR_RR),
            Instruction::Xor(operand) => Self::two_operand(operand, opcode::XOR, opcode::XOR_RR),
            Instruction::Cpa(operand) => Self::two_operand(operand, opcode::CPA, opcode::CPA_RR),
            Instruction::Cpl(operand) => Self::two_operand(operand, opcode::CPL, opcode::CPL_RR),
            Instruction::Sla { r, x } => (opcode::SLA, r, x),
            Instruction::Sra { r, x } => (opcode::SRA, r, x),
            Instruction::Sll { r, x } => (opcode::SLL, r, x),
            Instruction::Srl { r, x } => (opcode::SRL, r, x),
            Instruction::Jmi { x } => (opcode::JMI, 0, x),
            Instruction::Jnz { x } => (opcode::JNZ, 0, x),
            Instruction::Jze { x } => (opcode::JZE, 0, x),
            Instruction::Jump { x } => (opcode::JUMP, 0, x),
            Instruction::Jpl { x } => (opcode::JPL, 0, x),
            Instruction::Jov { x } => (opcode::JOV, 0, x),
            Instruction::Push { x } => (opcode::PUSH, 0, x),
            Instruction::Pop { r } => (opcode::POP, r, 0),
            Instruction::Call { x } => (opcode::CALL, 0, x),
            Instruction::Ret => (opcode::RET, 0, 0),
            Instruction::Svc { x } => (opcode::SVC, 0, x),
        };

        (op as u16) << 8 | ((r1 & 0xf) as u16) << 4 | (r2 & 0xf) as u16
    }

    fn two_operand(operand: Operand, mem_op: u8, reg_op: u8) -> (u8, u8, u8) {
        let (a, b) = operand.fields();
        match operand {
            Operand::Memory { .. } => (mem_op, a, b),
            Operand::Register { .. } => (reg_op, a, b),
        }
    }

    /// Whether executing this instruction reads an address word.
    pub fn has_address_word(&self) -> bool {
        match self {
            Instruction::Ld(operand)
            | Instruction::Adda(operand)
            | Instruction::Suba(operand)
            | Instruction::Addl(operand)
            | Instruction::Subl(operand)
            | Instruction::And(operand)
            | Instruction::Or(operand)
            | Instruction::Xor(operand)
            | Instruction::Cpa(operand)
            | Instruction::Cpl(operand) => matches!(operand, Operand::Memory { .. }),
            Instruction::Nop | Instruction::Pop { .. } | Instruction::Ret => false,
            _ => true,
        }
    }
}

/// Errors that can occur during instruction decoding.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DecodeError {
    #[error("invalid opcode: {0:#04x}")]
    InvalidOpcode(u8),

    #[error("invalid register field: {0}")]
    InvalidRegister(u8),
}
