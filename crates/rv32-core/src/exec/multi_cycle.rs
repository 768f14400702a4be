//! Multi-cycle execution model: one state-machine transition per cycle.
//!
//! An instruction occupies three cycles (FETCH, DECODE, EXECUTE) and a
//! taken branch pays a fourth (BRANCH-RESOLVE) while the target address is
//! computed. Non-retiring cycles echo the input program counter, so the
//! driver's cycle counter reflects real occupancy.

use super::{alu_select, decode_at, fetch, Stepper};
use crate::alu::{self, Select};
use crate::decoder::{Instruction, Opcode};
use crate::fault::Fault;
use crate::memory::AddressSpace;
use crate::state::RegisterFile;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Cycle {
    Fetch,
    Decode,
    Execute(Instruction),
    BranchResolve,
}

/// The state held across cycles for one in-flight instruction.
///
/// Everything the later states consume is staged explicitly: the fetched
/// word at FETCH, the decoded instruction and its source operands at
/// DECODE. EXECUTE therefore works from staged values only.
#[derive(Debug, Clone)]
pub struct MultiCycleStepper {
    cycle: Cycle,
    word: u32,
    operand1: u32,
    operand2: u32,
}

impl Default for MultiCycleStepper {
    fn default() -> Self {
        Self::new()
    }
}

impl MultiCycleStepper {
    /// Creates the model idle in its FETCH state.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            cycle: Cycle::Fetch,
            word: 0,
            operand1: 0,
            operand2: 0,
        }
    }

    fn execute(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
        instruction: &Instruction,
    ) -> Result<u32, Fault> {
        let link = pc.wrapping_add(4);
        let select = alu_select(instruction);

        match instruction.opcode {
            Opcode::Lui => {
                regs.write(instruction.rd, self.operand2);
            }
            Opcode::Auipc | Opcode::Op | Opcode::OpImm => {
                let result =
                    alu::evaluate(self.operand1, self.operand2, instruction.funct3, select);
                regs.write(instruction.rd, result);
            }
            Opcode::Jal | Opcode::Jalr => {
                let target =
                    alu::evaluate(self.operand1, self.operand2, instruction.funct3, Select::ADDRESS)
                        & !1;
                regs.write(instruction.rd, link);
                return Ok(target);
            }
            Opcode::Branch => {
                let taken =
                    alu::evaluate(self.operand1, self.operand2, instruction.funct3, select);
                if taken != 0 {
                    // Re-stage for the target-address cycle.
                    self.operand1 = pc;
                    self.operand2 = instruction.imm;
                    self.cycle = Cycle::BranchResolve;
                    return Ok(pc);
                }
            }
            Opcode::Load => {
                let addr = alu::evaluate(
                    self.operand1,
                    self.operand2,
                    instruction.funct3,
                    Select::ADDRESS,
                );
                let value = mem.read(addr, instruction.access_size())?;
                regs.write(instruction.rd, super::extend_load(value, instruction.funct3));
            }
            Opcode::Store => {
                let addr = alu::evaluate(
                    self.operand1,
                    self.operand2,
                    instruction.funct3,
                    Select::ADDRESS,
                );
                mem.write(addr, instruction.access_size(), regs.read(instruction.rs2))?;
            }
            Opcode::MiscMem | Opcode::System => {}
        }
        Ok(link)
    }
}

impl Stepper for MultiCycleStepper {
    fn step(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
    ) -> Result<u32, Fault> {
        match std::mem::replace(&mut self.cycle, Cycle::Fetch) {
            Cycle::Fetch => {
                self.word = fetch(mem, pc)?;
                self.cycle = Cycle::Decode;
                Ok(pc)
            }
            Cycle::Decode => {
                let instruction = decode_at(pc, self.word)?;
                (self.operand1, self.operand2) = match instruction.opcode {
                    Opcode::Op | Opcode::Branch => {
                        (regs.read(instruction.rs1), regs.read(instruction.rs2))
                    }
                    Opcode::OpImm | Opcode::Load | Opcode::Store | Opcode::Jalr => {
                        (regs.read(instruction.rs1), instruction.imm)
                    }
                    Opcode::Auipc | Opcode::Jal => (pc, instruction.imm),
                    Opcode::Lui => (0, instruction.imm),
                    Opcode::MiscMem | Opcode::System => (0, 0),
                };
                self.cycle = Cycle::Execute(instruction);
                Ok(pc)
            }
            Cycle::Execute(instruction) => self.execute(mem, regs, pc, &instruction),
            Cycle::BranchResolve => Ok(self.operand1.wrapping_add(self.operand2)),
        }
    }
}
