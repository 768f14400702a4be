//! Combinational ALU and branch evaluator.
//!
//! One pure function shared by all three execution models. Encoding
//! legality is the decoder's job; over decoded instructions the evaluator
//! is total.

use crate::decoder::funct3;
use crate::XLEN;

/// Operation-class flags steering the evaluator.
///
/// When neither the branch nor a register-ALU class is selected, the
/// evaluator degrades to plain addition, which is exactly the effective
/// address computation needed by AUIPC/JAL/JALR/LOAD/STORE.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Select {
    /// Evaluate a branch predicate instead of an arithmetic result.
    pub is_branch: bool,
    /// Register-register operation (OP class).
    pub is_reg_reg: bool,
    /// Register-immediate operation (OPIMM class).
    pub is_reg_imm: bool,
    /// funct7 alternate-function bit (SUB, SRA).
    pub alt_function: bool,
}

impl Select {
    /// Selector for plain address addition.
    pub const ADDRESS: Self = Self {
        is_branch: false,
        is_reg_reg: false,
        is_reg_imm: false,
        alt_function: false,
    };
}

/// Computes the ALU result or branch predicate (0/1) for two operands.
#[must_use]
#[allow(clippy::cast_possible_wrap, clippy::cast_sign_loss)]
pub fn evaluate(operand1: u32, operand2: u32, f3: u8, select: Select) -> u32 {
    let shamt = operand2 & (XLEN - 1);

    if select.is_branch {
        let taken = match f3 {
            funct3::BEQ => operand1 == operand2,
            funct3::BNE => operand1 != operand2,
            funct3::BLT => (operand1 as i32) < (operand2 as i32),
            funct3::BGE => (operand1 as i32) >= (operand2 as i32),
            funct3::BLTU => operand1 < operand2,
            funct3::BGEU => operand1 >= operand2,
            // Reserved rows never reach the evaluator.
            _ => false,
        };
        return u32::from(taken);
    }

    if !select.is_reg_reg && !select.is_reg_imm {
        return operand1.wrapping_add(operand2);
    }

    match f3 {
        funct3::ADD_SUB => {
            if select.is_reg_reg && select.alt_function {
                operand1.wrapping_sub(operand2)
            } else {
                operand1.wrapping_add(operand2)
            }
        }
        funct3::SLT => u32::from((operand1 as i32) < (operand2 as i32)),
        funct3::SLTU => u32::from(operand1 < operand2),
        funct3::XOR => operand1 ^ operand2,
        funct3::OR => operand1 | operand2,
        funct3::AND => operand1 & operand2,
        funct3::SLL => operand1 << shamt,
        // funct3::SRL_SRA (the only remaining legal row)
        _ => {
            if select.alt_function {
                ((operand1 as i32) >> shamt) as u32
            } else {
                operand1 >> shamt
            }
        }
    }
}
