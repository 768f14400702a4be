//! The three execution models.
//!
//! All three drive the same decoder, ALU and retirement path, so their
//! architectural results agree by construction; they differ only in how
//! many cycles an instruction occupies and what state is held between
//! cycles.

/// Four-state fetch/decode/execute state machine.
pub mod multi_cycle;
/// Two-stage pipeline over an instruction-bus handshake.
pub mod pipeline;
/// One instruction per call.
pub mod single_cycle;

pub use multi_cycle::MultiCycleStepper;
pub use pipeline::{FetchResponse, InstructionBus, PipelinedStepper, SystemBus};
pub use single_cycle::SingleCycleStepper;

use crate::alu::{self, Select};
use crate::decoder::{funct3, Instruction, Opcode};
use crate::fault::Fault;
use crate::memory::{AddressSpace, WORD_BYTES};
use crate::state::RegisterFile;

/// One execution model driven one clock cycle at a time.
///
/// `step` advances the machine by a single cycle starting from `pc` and
/// returns the program counter for the next cycle. Models that take
/// several cycles per instruction return `pc` unchanged on non-retiring
/// cycles. A returned [`Fault`] is fatal; the machine must not be stepped
/// further.
pub trait Stepper {
    /// Advances one clock cycle.
    ///
    /// # Errors
    ///
    /// Returns a [`Fault`] when the cycle fetched an illegal instruction or
    /// performed an unmappable memory access.
    fn step(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
    ) -> Result<u32, Fault>;
}

/// Fetches the instruction word at `pc`.
pub(crate) fn fetch(mem: &AddressSpace, pc: u32) -> Result<u32, Fault> {
    mem.read(pc, WORD_BYTES)
}

/// Decodes `word`, attaching fetch context to any rejection.
pub(crate) fn decode_at(pc: u32, word: u32) -> Result<Instruction, Fault> {
    Instruction::decode(word).map_err(|issue| Fault::illegal(pc, word, issue))
}

/// The evaluator selector for a decoded instruction.
pub(crate) const fn alu_select(instruction: &Instruction) -> Select {
    match instruction.opcode {
        Opcode::Op => Select {
            is_branch: false,
            is_reg_reg: true,
            is_reg_imm: false,
            alt_function: instruction.alt_function(),
        },
        Opcode::OpImm => Select {
            is_branch: false,
            is_reg_reg: false,
            is_reg_imm: true,
            alt_function: instruction.alt_function(),
        },
        Opcode::Branch => Select {
            is_branch: true,
            is_reg_reg: false,
            is_reg_imm: false,
            alt_function: false,
        },
        _ => Select::ADDRESS,
    }
}

/// Sign-extends a load result according to its width funct3.
const fn extend_load(value: u32, f3: u8) -> u32 {
    match f3 {
        funct3::BYTE => (value ^ 0x80).wrapping_sub(0x80),
        funct3::HWORD => (value ^ 0x8000).wrapping_sub(0x8000),
        _ => value,
    }
}

/// Executes one decoded instruction to architectural completion.
///
/// Returns the next program counter. Shared by the single-cycle model and
/// the pipeline's execute stage; the multi-cycle model reproduces the same
/// dataflow from its staged operands.
pub(crate) fn retire(
    mem: &mut AddressSpace,
    regs: &mut RegisterFile,
    pc: u32,
    instruction: &Instruction,
) -> Result<u32, Fault> {
    let link = pc.wrapping_add(4);
    let select = alu_select(instruction);

    match instruction.opcode {
        Opcode::Lui => {
            regs.write(instruction.rd, instruction.imm);
        }
        Opcode::Auipc => {
            regs.write(instruction.rd, pc.wrapping_add(instruction.imm));
        }
        Opcode::Op => {
            let result = alu::evaluate(
                regs.read(instruction.rs1),
                regs.read(instruction.rs2),
                instruction.funct3,
                select,
            );
            regs.write(instruction.rd, result);
        }
        Opcode::OpImm => {
            let result = alu::evaluate(
                regs.read(instruction.rs1),
                instruction.imm,
                instruction.funct3,
                select,
            );
            regs.write(instruction.rd, result);
        }
        Opcode::Jal => {
            regs.write(instruction.rd, link);
            return Ok(pc.wrapping_add(instruction.imm));
        }
        Opcode::Jalr => {
            let target = regs.read(instruction.rs1).wrapping_add(instruction.imm) & !1;
            regs.write(instruction.rd, link);
            return Ok(target);
        }
        Opcode::Branch => {
            let taken = alu::evaluate(
                regs.read(instruction.rs1),
                regs.read(instruction.rs2),
                instruction.funct3,
                select,
            );
            if taken != 0 {
                return Ok(pc.wrapping_add(instruction.imm));
            }
        }
        Opcode::Load => {
            let addr = regs.read(instruction.rs1).wrapping_add(instruction.imm);
            let value = mem.read(addr, instruction.access_size())?;
            regs.write(instruction.rd, extend_load(value, instruction.funct3));
        }
        Opcode::Store => {
            let addr = regs.read(instruction.rs1).wrapping_add(instruction.imm);
            mem.write(addr, instruction.access_size(), regs.read(instruction.rs2))?;
        }
        // Memory ordering and environment calls retire as no-ops.
        Opcode::MiscMem | Opcode::System => {}
    }
    Ok(link)
}

#[cfg(test)]
mod tests {
    use super::extend_load;
    use crate::decoder::funct3;

    #[test]
    fn byte_loads_sign_extend() {
        assert_eq!(extend_load(0x80, funct3::BYTE), 0xFFFF_FF80);
        assert_eq!(extend_load(0x7F, funct3::BYTE), 0x7F);
        assert_eq!(extend_load(0x80, funct3::BYTE_U), 0x80);
    }

    #[test]
    fn half_loads_sign_extend() {
        assert_eq!(extend_load(0x8000, funct3::HWORD), 0xFFFF_8000);
        assert_eq!(extend_load(0x7FFF, funct3::HWORD), 0x7FFF);
        assert_eq!(extend_load(0x8000, funct3::HWORD_U), 0x8000);
    }
}
