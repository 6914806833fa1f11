//! CPU execution engine for COMET II.
//!
//! Implements the fetch-decode-execute cycle and all instruction behaviors.

use crate::cpu::{Memory, Registers, TrapTable};
use crate::cpu::alu::{self, BitOp};
use crate::cpu::decode::{Instruction, Operand, DecodeError};
use crate::cpu::registers::Flags;
use serde::{Serialize, Deserialize};
use thiserror::Error;

/// Why [`Cpu::run_until`] stopped without an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RunExit {
    /// PR reached the sentinel address.
    Returned { steps: u64 },
    /// The step budget ran out first.
    StepLimit { steps: u64 },
}

impl RunExit {
    pub fn steps(&self) -> u64 {
        match *self {
            RunExit::Returned { steps } | RunExit::StepLimit { steps } => steps,
        }
    }
}

/// The COMET II CPU.
#[derive(Clone, Default, Serialize, Deserialize)]
pub struct Cpu {
    /// CPU registers.
    pub regs: Registers,
    /// Main memory.
    pub mem: Memory,
    /// SVC vectors.
    pub traps: TrapTable,
    /// Instruction count (for profiling).
    pub cycles: u64,
    /// Last executed instruction (for debugging).
    last_instr: Option<Instruction>,
}

impl Cpu {
    /// Create a new CPU with zeroed state and an empty trap table.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reset registers, memory and counters. The trap table is kept.
    pub fn reset(&mut self) {
        self.regs.reset();
        self.mem.clear();
        self.cycles = 0;
        self.last_instr = None;
    }

    /// Load a memory image starting at `origin`.
    pub fn load_image(&mut self, origin: u16, image: &[u16]) {
        self.mem.load_image(origin, image);
    }

    pub fn read(&self, addr: u16) -> u16 {
        self.mem.read(addr)
    }

    pub fn write(&mut self, addr: u16, value: u16) {
        self.mem.write(addr, value);
    }

    /// Read GR`i`.
    ///
    /// # Panics
    /// Panics if `i` is not in 0..8.
    pub fn register(&self, i: usize) -> u16 {
        self.regs.gr[i]
    }

    /// Write GR`i`.
    ///
    /// # Panics
    /// Panics if `i` is not in 0..8.
    pub fn set_register(&mut self, i: usize, value: u16) {
        self.regs.gr[i] = value;
    }

    pub fn pc(&self) -> u16 {
        self.regs.pr
    }

    pub fn set_pc(&mut self, addr: u16) {
        self.regs.pr = addr;
    }

    pub fn sp(&self) -> u16 {
        self.regs.sp
    }

    pub fn set_sp(&mut self, addr: u16) {
        self.regs.sp = addr;
    }

    pub fn flags(&self) -> Flags {
        self.regs.fr
    }

    /// Map SVC number `trap` to `vector`.
    pub fn set_trap(&mut self, trap: u16, vector: u16) -> Option<u16> {
        self.traps.insert(trap, vector)
    }

    /// Enter `addr` as if a CALL had been executed at the current PR.
    pub fn call_into(&mut self, addr: u16) {
        self.push(self.regs.pr);
        self.regs.pr = addr;
    }

    /// Execute a single instruction.
    ///
    /// Returns the instruction that was executed, or an error. On error
    /// the machine is left exactly as it was before the call, with PR
    /// pointing at the offending instruction.
    pub fn step(&mut self) -> Result<Instruction, CpuError> {
        let start = self.regs.pr;

        // Fetch
        let word = self.mem.read(start);

        // Decode
        let instr = Instruction::from_word(word).map_err(|source| {
            tracing::warn!(pr = start, word, %source, "illegal instruction");
            CpuError::IllegalInstruction { addr: start, source }
        })?;
        tracing::trace!("PR={:04x} word={:04x} {:?}", start, word, instr);

        self.regs.advance_pr();

        // Execute
        if let Err(e) = self.execute(instr) {
            self.regs.pr = start;
            return Err(e.at(start));
        }

        self.cycles += 1;
        self.last_instr = Some(instr);

        Ok(instr)
    }

    /// Step until PR equals `sentinel` or `max_steps` instructions have run.
    ///
    /// Checks PR before every step, so a CPU already sitting on the
    /// sentinel returns immediately.
    pub fn run_until(&mut self, sentinel: u16, max_steps: u64) -> Result<RunExit, CpuError> {
        self.run_until_with(sentinel, max_steps, |_, _, _| {})
    }

    /// [`Cpu::run_until`], calling `on_step(cpu, pr, instr)` after every
    /// executed instruction. `pr` is the address the instruction was
    /// fetched from.
    pub fn run_until_with<F>(&mut self, sentinel: u16, max_steps: u64, mut on_step: F) -> Result<RunExit, CpuError>
    where
        F: FnMut(&Cpu, u16, Instruction),
    {
        let mut steps = 0;

        while steps < max_steps {
            if self.regs.pr == sentinel {
                tracing::debug!(steps, "returned to {:04x}", sentinel);
                return Ok(RunExit::Returned { steps });
            }
            let pr = self.regs.pr;
            let instr = self.step()?;
            on_step(self, pr, instr);
            steps += 1;
        }

        if self.regs.pr == sentinel {
            return Ok(RunExit::Returned { steps });
        }
        tracing::debug!(steps, pr = self.regs.pr, "step limit reached");
        Ok(RunExit::StepLimit { steps })
    }

    /// Execute a decoded instruction. PR already points past the opcode word.
    fn execute(&mut self, instr: Instruction) -> Result<(), CpuError> {
        match instr {
            Instruction::Nop => {}

            // ==================== Load / Store ====================

            Instruction::Ld(Operand::Memory { r, x }) => {
                let value = self.load_operand(x);
                self.regs.gr[r as usize] = value;
            }

            Instruction::Ld(Operand::Register { r1, r2 }) => {
                let value = self.regs.gr[r2 as usize];
                self.regs.gr[r1 as usize] = value;
                self.regs.fr = Flags::from_result(value, false);
            }

            Instruction::St { r, x } => {
                let addr = self.effective_address(x);
                self.mem.write(addr, self.regs.gr[r as usize]);
            }

            Instruction::Lad { r, x } => {
                self.regs.gr[r as usize] = self.effective_address(x);
            }

            // ==================== Arithmetic / Logical ====================

            Instruction::Adda(operand) => self.alu(operand, alu::add_arithmetic),
            Instruction::Suba(operand) => self.alu(operand, alu::sub_arithmetic),
            Instruction::Addl(operand) => self.alu(operand, alu::add_logical),
            Instruction::Subl(operand) => self.alu(operand, alu::sub_logical),
            Instruction::And(operand) => self.alu(operand, |a, b| alu::bitwise(BitOp::And, a, b)),
            Instruction::Or(operand) => self.alu(operand, |a, b| alu::bitwise(BitOp::Or, a, b)),
            Instruction::Xor(operand) => self.alu(operand, |a, b| alu::bitwise(BitOp::Xor, a, b)),

            // ==================== Compare ====================

            Instruction::Cpa(operand) => {
                let (a, b) = self.operands(operand);
                self.regs.fr = alu::compare_arithmetic(a, b);
            }

            Instruction::Cpl(operand) => {
                let (a, b) = self.operands(operand);
                self.regs.fr = alu::compare_logical(a, b);
            }

            // ==================== Shift ====================

            Instruction::Sla { r, x } => self.shift(r, x, alu::shift_left_arithmetic),
            Instruction::Sra { r, x } => self.shift(r, x, alu::shift_right_arithmetic),
            Instruction::Sll { r, x } => self.shift(r, x, alu::shift_left_logical),
            Instruction::Srl { r, x } => self.shift(r, x, alu::shift_right_logical),

            // ==================== Branch ====================

            Instruction::Jmi { x } => self.jump_if(x, self.regs.fr.sf),
            Instruction::Jnz { x } => self.jump_if(x, !self.regs.fr.zf),
            Instruction::Jze { x } => self.jump_if(x, self.regs.fr.zf),
            Instruction::Jump { x } => self.jump_if(x, true),
            Instruction::Jpl { x } => self.jump_if(x, !self.regs.fr.sf && !self.regs.fr.zf),
            Instruction::Jov { x } => self.jump_if(x, self.regs.fr.of),

            // ==================== Stack / Subroutine ====================

            Instruction::Push { x } => {
                let value = self.effective_address(x);
                self.push(value);
            }

            Instruction::Pop { r } => {
                self.regs.gr[r as usize] = self.pop();
            }

            Instruction::Call { x } => {
                let target = self.effective_address(x);
                self.call_into(target);
            }

            Instruction::Ret => {
                self.regs.pr = self.pop();
            }

            // ==================== Supervisor ====================

            Instruction::Svc { x } => {
                let trap = self.effective_address(x);
                let vector = self.traps.get(trap).ok_or(CpuError::TrapMiss { addr: 0, trap })?;
                tracing::debug!("SVC {:04x} -> {:04x}", trap, vector);
                self.call_into(vector);
            }
        }

        Ok(())
    }

    /// Fetch the address word following the opcode and advance PR.
    fn fetch_address(&mut self) -> u16 {
        let at = self.regs.advance_pr();
        self.mem.read(at)
    }

    /// `adr + GR[x]`, consuming the address word.
    fn effective_address(&mut self, x: u8) -> u16 {
        let base = self.fetch_address();
        self.regs.effective_address(base, x)
    }

    /// The word stored at `adr + GR[x]`.
    fn load_operand(&mut self, x: u8) -> u16 {
        let addr = self.effective_address(x);
        self.mem.read(addr)
    }

    /// Left and right values of a two-operand instruction.
    fn operands(&mut self, operand: Operand) -> (u16, u16) {
        match operand {
            Operand::Memory { r, x } => {
                let value = self.load_operand(x);
                (self.regs.gr[r as usize], value)
            }
            Operand::Register { r1, r2 } => (self.regs.gr[r1 as usize], self.regs.gr[r2 as usize]),
        }
    }

    /// Apply `op` to a two-operand instruction, writing the result back.
    fn alu(&mut self, operand: Operand, op: impl Fn(u16, u16) -> (u16, Flags)) {
        let (a, b) = self.operands(operand);
        let (result, flags) = op(a, b);
        self.regs.gr[operand.target() as usize] = result;
        self.regs.fr = flags;
    }

    fn shift(&mut self, r: u8, x: u8, op: fn(u16, u16) -> (u16, Flags)) {
        let count = self.effective_address(x);
        let (result, flags) = op(self.regs.gr[r as usize], count);
        self.regs.gr[r as usize] = result;
        self.regs.fr = flags;
    }

    /// Consume the address word and branch to it when `taken`.
    fn jump_if(&mut self, x: u8, taken: bool) {
        let target = self.effective_address(x);
        if taken {
            self.regs.pr = target;
        }
    }

    fn push(&mut self, value: u16) {
        let slot = self.regs.push_slot();
        self.mem.write(slot, value);
    }

    fn pop(&mut self) -> u16 {
        let slot = self.regs.pop_slot();
        self.mem.read(slot)
    }

    /// Get the last executed instruction.
    pub fn last_instruction(&self) -> Option<Instruction> {
        self.last_instr
    }
}

impl std::fmt::Debug for Cpu {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Cpu")
            .field("cycles", &self.cycles)
            .field("regs", &self.regs)
            .field("traps", &self.traps)
            .finish()
    }
}

/// Fatal conditions that stop a step sequence.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CpuError {
    /// The word at `addr` is not an instruction: its opcode has no
    /// dispatcher entry, or a register field the opcode uses names a
    /// register past GR7.
    #[error("illegal instruction at {addr:#06x}: {source}")]
    IllegalInstruction {
        addr: u16,
        #[source]
        source: DecodeError,
    },

    /// SVC at `addr` named a trap with no vector.
    #[error("trap halt at {addr:#06x}: no vector for SVC {trap:#06x}")]
    TrapMiss { addr: u16, trap: u16 },
}

impl CpuError {
    /// Address of the instruction that failed.
    pub fn addr(&self) -> u16 {
        match *self {
            CpuError::IllegalInstruction { addr, .. } | CpuError::TrapMiss { addr, .. } => addr,
        }
    }

    fn at(self, addr: u16) -> Self {
        match self {
            CpuError::IllegalInstruction { source, .. } => CpuError::IllegalInstruction { addr, source },
            CpuError::TrapMiss { trap, .. } => {
                tracing::warn!(pr = addr, trap, "trap halt");
                CpuError::TrapMiss { addr, trap }
            }
        }
    }
}
