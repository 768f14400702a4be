//! Instruction decoder for the RV32I base integer instruction set.
//!
//! Field extraction is explicit shift-and-mask keyed to the documented bit
//! positions of each format, so the decoder has no dependence on any packed
//! struct layout and can be tested directly against the encoding tables.
//! All encoding legality lives here: an `Instruction` value always names a
//! legal RV32I operation, and the execution models stay free of per-opcode
//! legality checks.

use crate::fault::EncodingIssue;

/// Base opcode classes (`inst[6:2]`, with `inst[1:0] = 11`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Opcode {
    /// Register loads (I-type).
    Load,
    /// FENCE / FENCE.I memory ordering (I-type, executed as no-ops).
    MiscMem,
    /// Register-immediate ALU operations (I-type).
    OpImm,
    /// Add upper immediate to pc (U-type).
    Auipc,
    /// Register stores (S-type).
    Store,
    /// Register-register ALU operations (R-type).
    Op,
    /// Load upper immediate (U-type).
    Lui,
    /// Conditional branches (B-type).
    Branch,
    /// Jump and link register (I-type).
    Jalr,
    /// Jump and link (J-type).
    Jal,
    /// ECALL / EBREAK (I-type, executed as no-ops).
    System,
}

impl Opcode {
    /// Classifies the 5-bit base opcode field.
    #[must_use]
    pub const fn from_bits(bits: u32) -> Option<Self> {
        match bits {
            0x00 => Some(Self::Load),
            0x03 => Some(Self::MiscMem),
            0x04 => Some(Self::OpImm),
            0x05 => Some(Self::Auipc),
            0x08 => Some(Self::Store),
            0x0C => Some(Self::Op),
            0x0D => Some(Self::Lui),
            0x18 => Some(Self::Branch),
            0x19 => Some(Self::Jalr),
            0x1B => Some(Self::Jal),
            0x1C => Some(Self::System),
            _ => None,
        }
    }
}

/// Named funct3 values per opcode class.
#[allow(missing_docs)]
pub mod funct3 {
    // OP / OPIMM
    pub const ADD_SUB: u8 = 0b000;
    pub const SLL: u8 = 0b001;
    pub const SLT: u8 = 0b010;
    pub const SLTU: u8 = 0b011;
    pub const XOR: u8 = 0b100;
    pub const SRL_SRA: u8 = 0b101;
    pub const OR: u8 = 0b110;
    pub const AND: u8 = 0b111;

    // BRANCH
    pub const BEQ: u8 = 0b000;
    pub const BNE: u8 = 0b001;
    pub const BLT: u8 = 0b100;
    pub const BGE: u8 = 0b101;
    pub const BLTU: u8 = 0b110;
    pub const BGEU: u8 = 0b111;

    // LOAD / STORE
    pub const BYTE: u8 = 0b000;
    pub const HWORD: u8 = 0b001;
    pub const WORD: u8 = 0b010;
    pub const BYTE_U: u8 = 0b100;
    pub const HWORD_U: u8 = 0b101;

    // MISCMEM
    pub const FENCE: u8 = 0b000;
    pub const FENCE_I: u8 = 0b001;

    // SYSTEM
    pub const PRIV: u8 = 0b000;
}

/// funct12 values accepted under the PRIV funct3.
#[allow(missing_docs)]
pub mod funct12 {
    pub const ECALL: u32 = 0x000;
    pub const EBREAK: u32 = 0x001;
}

/// funct7 bit selecting the alternate function (SUB, SRA).
pub const FUNCT7_ALT: u8 = 0x20;

/// A decoded, validated view of one 32-bit instruction word.
///
/// Transient: lives for at most one in-flight instruction. The immediate is
/// already sign-extended (I/S/B/J) or shifted into place (U); it is zero for
/// R-type encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Instruction {
    /// Raw fetched encoding, kept for fault diagnostics.
    pub raw: u32,
    /// Base opcode class.
    pub opcode: Opcode,
    /// Destination register index.
    pub rd: u8,
    /// First source register index.
    pub rs1: u8,
    /// Second source register index.
    pub rs2: u8,
    /// Minor operation selector.
    pub funct3: u8,
    /// Major operation modifier (immediate bits 11:5 for I-type).
    pub funct7: u8,
    /// Format-appropriate immediate.
    pub imm: u32,
}

impl Instruction {
    /// Decodes and validates a 32-bit instruction word.
    ///
    /// # Errors
    ///
    /// Returns the specific [`EncodingIssue`] when the word is not a legal
    /// RV32I instruction.
    #[allow(clippy::cast_possible_truncation)]
    pub fn decode(word: u32) -> Result<Self, EncodingIssue> {
        if word & 0b11 != 0b11 {
            return Err(EncodingIssue::UnsupportedOpcode);
        }
        let opcode =
            Opcode::from_bits((word >> 2) & 0x1F).ok_or(EncodingIssue::UnsupportedOpcode)?;

        let instruction = Self {
            raw: word,
            opcode,
            rd: extract_field(word, 7),
            rs1: extract_field(word, 15),
            rs2: extract_field(word, 20),
            funct3: ((word >> 12) & 0x7) as u8,
            funct7: (word >> 25) as u8,
            imm: extract_immediate(word, opcode),
        };
        instruction.validate()?;
        Ok(instruction)
    }

    fn validate(&self) -> Result<(), EncodingIssue> {
        match self.opcode {
            Opcode::Op => match self.funct3 {
                funct3::ADD_SUB | funct3::SRL_SRA => {
                    if self.funct7 & !FUNCT7_ALT != 0 {
                        return Err(EncodingIssue::InvalidFunct7);
                    }
                }
                _ => {
                    if self.funct7 != 0 {
                        return Err(EncodingIssue::InvalidFunct7);
                    }
                }
            },
            Opcode::OpImm => match self.funct3 {
                funct3::SLL if self.funct7 != 0 => return Err(EncodingIssue::InvalidFunct7),
                funct3::SRL_SRA if self.funct7 & !FUNCT7_ALT != 0 => {
                    return Err(EncodingIssue::InvalidFunct7)
                }
                _ => {}
            },
            Opcode::Branch => {
                if matches!(self.funct3, 0b010 | 0b011) {
                    return Err(EncodingIssue::InvalidFunct3);
                }
            }
            Opcode::Jalr => {
                if self.funct3 != 0 {
                    return Err(EncodingIssue::InvalidFunct3);
                }
            }
            Opcode::Load => {
                if !matches!(
                    self.funct3,
                    funct3::BYTE | funct3::HWORD | funct3::WORD | funct3::BYTE_U | funct3::HWORD_U
                ) {
                    return Err(EncodingIssue::InvalidFunct3);
                }
            }
            Opcode::Store => {
                if !matches!(self.funct3, funct3::BYTE | funct3::HWORD | funct3::WORD) {
                    return Err(EncodingIssue::InvalidFunct3);
                }
            }
            Opcode::MiscMem => {
                if !matches!(self.funct3, funct3::FENCE | funct3::FENCE_I) {
                    return Err(EncodingIssue::InvalidFunct3);
                }
            }
            Opcode::System => {
                // Zicsr is not implemented; only the PRIV row is legal.
                if self.funct3 != funct3::PRIV {
                    return Err(EncodingIssue::InvalidFunct3);
                }
                let f12 = (self.raw >> 20) & 0xFFF;
                if f12 != funct12::ECALL && f12 != funct12::EBREAK {
                    return Err(EncodingIssue::InvalidFunct12);
                }
            }
            Opcode::Lui | Opcode::Auipc | Opcode::Jal => {}
        }
        self.validate_register_range()
    }

    #[cfg(feature = "rv32e")]
    fn validate_register_range(&self) -> Result<(), EncodingIssue> {
        let bound = crate::state::REGISTER_COUNT as u8;
        let (uses_rd, uses_rs1, uses_rs2) = self.register_usage();
        if (uses_rd && self.rd >= bound)
            || (uses_rs1 && self.rs1 >= bound)
            || (uses_rs2 && self.rs2 >= bound)
        {
            return Err(EncodingIssue::RegisterOutOfRange);
        }
        Ok(())
    }

    #[cfg(not(feature = "rv32e"))]
    #[allow(clippy::unused_self)]
    const fn validate_register_range(&self) -> Result<(), EncodingIssue> {
        // 5-bit fields cannot exceed the 32-register file.
        Ok(())
    }

    #[cfg(feature = "rv32e")]
    const fn register_usage(&self) -> (bool, bool, bool) {
        match self.opcode {
            Opcode::Op => (true, true, true),
            Opcode::OpImm | Opcode::Load | Opcode::Jalr => (true, true, false),
            Opcode::Store | Opcode::Branch => (false, true, true),
            Opcode::Lui | Opcode::Auipc | Opcode::Jal => (true, false, false),
            Opcode::MiscMem | Opcode::System => (false, false, false),
        }
    }

    /// Memory access width in bytes for LOAD/STORE encodings.
    #[must_use]
    pub const fn access_size(&self) -> u32 {
        match self.funct3 {
            funct3::BYTE | funct3::BYTE_U => 1,
            funct3::HWORD | funct3::HWORD_U => 2,
            _ => 4,
        }
    }

    /// Returns `true` when the funct7 alternate-function bit is set.
    #[must_use]
    pub const fn alt_function(&self) -> bool {
        self.funct7 & FUNCT7_ALT != 0
    }
}

#[allow(clippy::cast_possible_truncation)]
const fn extract_field(word: u32, shift: u32) -> u8 {
    ((word >> shift) & 0x1F) as u8
}

/// Assembles the format-appropriate immediate, already sign-extended.
const fn extract_immediate(word: u32, opcode: Opcode) -> u32 {
    let sign = if word & (1 << 31) != 0 { u32::MAX } else { 0 };
    match opcode {
        Opcode::Op => 0,
        // I-type: bits [31:20].
        Opcode::OpImm | Opcode::Jalr | Opcode::Load | Opcode::MiscMem | Opcode::System => {
            ((word >> 20) & 0xFFF) | (sign & !0xFFF)
        }
        // S-type: bits {[31:25], [11:7]}.
        Opcode::Store => ((word >> 20) & 0xFE0) | ((word >> 7) & 0x1F) | (sign & !0xFFF),
        // B-type: bits {[31], [7], [30:25], [11:8], 0}.
        Opcode::Branch => {
            ((word >> 7) & 0x1E)
                | ((word >> 20) & 0x7E0)
                | ((word << 4) & 0x800)
                | (sign & !0xFFF)
        }
        // U-type: bits [31:12] already in place.
        Opcode::Lui | Opcode::Auipc => word & 0xFFFF_F000,
        // J-type: bits {[31], [19:12], [20], [30:21], 0}.
        Opcode::Jal => {
            ((word >> 20) & 0x7FE)
                | ((word >> 9) & 0x800)
                | (word & 0xFF000)
                | (sign & !0xF_FFFF)
        }
    }
}

#[cfg(test)]
#[allow(
    clippy::cast_possible_wrap,
    clippy::cast_sign_loss,
    clippy::cast_possible_truncation
)]
mod tests {
    use super::{funct3, Instruction, Opcode};
    use crate::fault::EncodingIssue;
    use proptest::prelude::*;
    use rstest::rstest;

    fn encode_i(opcode5: u32, rd: u32, f3: u8, rs1: u32, imm: i32) -> u32 {
        let imm = (imm as u32) & 0xFFF;
        (imm << 20) | (rs1 << 15) | (u32::from(f3) << 12) | (rd << 7) | (opcode5 << 2) | 0b11
    }

    fn encode_s(rs1: u32, rs2: u32, f3: u8, imm: i32) -> u32 {
        let imm = (imm as u32) & 0xFFF;
        ((imm & 0xFE0) << 20)
            | (rs2 << 20)
            | (rs1 << 15)
            | (u32::from(f3) << 12)
            | ((imm & 0x1F) << 7)
            | (0x08 << 2)
            | 0b11
    }

    fn encode_b(rs1: u32, rs2: u32, f3: u8, imm: i32) -> u32 {
        let imm = imm as u32;
        ((imm & 0x1000) << 19)
            | ((imm & 0x7E0) << 20)
            | (rs2 << 20)
            | (rs1 << 15)
            | (u32::from(f3) << 12)
            | ((imm & 0x1E) << 7)
            | ((imm & 0x800) >> 4)
            | (0x18 << 2)
            | 0b11
    }

    fn encode_u(opcode5: u32, rd: u32, imm: u32) -> u32 {
        (imm & 0xFFFF_F000) | (rd << 7) | (opcode5 << 2) | 0b11
    }

    fn encode_j(rd: u32, imm: i32) -> u32 {
        let imm = imm as u32;
        ((imm & 0x10_0000) << 11)
            | ((imm & 0x7FE) << 20)
            | ((imm & 0x800) << 9)
            | (imm & 0xF_F000)
            | (rd << 7)
            | (0x1B << 2)
            | 0b11
    }

    fn encode_r(rd: u32, f3: u8, rs1: u32, rs2: u32, funct7: u32) -> u32 {
        (funct7 << 25)
            | (rs2 << 20)
            | (rs1 << 15)
            | (u32::from(f3) << 12)
            | (rd << 7)
            | (0x0C << 2)
            | 0b11
    }

    #[test]
    fn r_type_fields_are_extracted() {
        // ADD x3, x1, x2
        let instr = Instruction::decode(encode_r(3, 0, 1, 2, 0)).expect("legal");
        assert_eq!(instr.opcode, Opcode::Op);
        assert_eq!((instr.rd, instr.rs1, instr.rs2), (3, 1, 2));
        assert_eq!(instr.funct3, funct3::ADD_SUB);
        assert_eq!(instr.funct7, 0);
        assert_eq!(instr.imm, 0);
    }

    #[test]
    fn sub_requires_funct7_alt() {
        let sub = Instruction::decode(encode_r(3, 0, 1, 2, 0x20)).expect("legal");
        assert!(sub.alt_function());

        for funct7 in [0x01, 0x10, 0x21, 0x7F] {
            assert_eq!(
                Instruction::decode(encode_r(3, 0, 1, 2, funct7)),
                Err(EncodingIssue::InvalidFunct7),
                "funct7 {funct7:#x} must be rejected"
            );
        }
    }

    #[rstest]
    #[case::slt(funct3::SLT)]
    #[case::sltu(funct3::SLTU)]
    #[case::xor(funct3::XOR)]
    #[case::or(funct3::OR)]
    #[case::and(funct3::AND)]
    #[case::sll(funct3::SLL)]
    fn non_alt_r_type_rejects_any_nonzero_funct7(#[case] f3: u8) {
        assert!(Instruction::decode(encode_r(1, f3, 2, 3, 0)).is_ok());
        assert_eq!(
            Instruction::decode(encode_r(1, f3, 2, 3, 0x20)),
            Err(EncodingIssue::InvalidFunct7)
        );
    }

    #[test]
    fn opimm_shifts_validate_upper_immediate_bits() {
        // SLLI shamt bits live in imm[4:0]; imm[11:5] must be zero.
        assert!(Instruction::decode(encode_i(0x04, 1, 1, 2, 0x1F)).is_ok());
        assert_eq!(
            Instruction::decode(encode_i(0x04, 1, 1, 2, 0x41F)),
            Err(EncodingIssue::InvalidFunct7)
        );
        // SRAI carries the alternate bit in imm[10].
        assert!(Instruction::decode(encode_i(0x04, 1, 5, 2, 0x41F)).is_ok());
        assert_eq!(
            Instruction::decode(encode_i(0x04, 1, 5, 2, 0x21F)),
            Err(EncodingIssue::InvalidFunct7)
        );
    }

    #[test]
    fn i_type_immediate_sign_extends() {
        let instr = Instruction::decode(encode_i(0x04, 1, 0, 0, -1)).expect("legal");
        assert_eq!(instr.imm, u32::MAX);

        let instr = Instruction::decode(encode_i(0x04, 1, 0, 0, -2048)).expect("legal");
        assert_eq!(instr.imm as i32, -2048);

        let instr = Instruction::decode(encode_i(0x04, 1, 0, 0, 2047)).expect("legal");
        assert_eq!(instr.imm, 2047);
    }

    #[test]
    fn u_type_immediate_is_shifted_not_extended() {
        let instr = Instruction::decode(encode_u(0x0D, 1, 0xFFFF_F000)).expect("legal");
        assert_eq!(instr.opcode, Opcode::Lui);
        assert_eq!(instr.imm, 0xFFFF_F000);
    }

    #[test]
    fn branch_immediate_forces_bit_zero() {
        let instr = Instruction::decode(encode_b(1, 2, funct3::BEQ, -4)).expect("legal");
        assert_eq!(instr.imm as i32, -4);
        assert_eq!(instr.imm & 1, 0);
    }

    #[test]
    fn reserved_branch_funct3_is_rejected() {
        for f3 in [0b010_u8, 0b011] {
            assert_eq!(
                Instruction::decode(encode_b(1, 2, f3, 8)),
                Err(EncodingIssue::InvalidFunct3)
            );
        }
    }

    #[test]
    fn unsupported_opcode_classes_are_rejected() {
        // LOAD-FP, AMO, OP-32 and friends are outside RV32I.
        for opcode5 in [0x01_u32, 0x02, 0x06, 0x0B, 0x0E, 0x10, 0x1A, 0x1E] {
            let word = (opcode5 << 2) | 0b11;
            assert_eq!(
                Instruction::decode(word),
                Err(EncodingIssue::UnsupportedOpcode),
                "opcode {opcode5:#x}"
            );
        }
    }

    #[test]
    fn compressed_quadrants_are_rejected() {
        for word in [0x0000_0000_u32, 0x0000_0001, 0x0000_4602] {
            assert_eq!(
                Instruction::decode(word),
                Err(EncodingIssue::UnsupportedOpcode)
            );
        }
    }

    #[test]
    fn system_accepts_only_ecall_and_ebreak() {
        assert!(Instruction::decode(0x0000_0073).is_ok()); // ECALL
        assert!(Instruction::decode(0x0010_0073).is_ok()); // EBREAK
        assert_eq!(
            Instruction::decode(0x3020_0073), // MRET
            Err(EncodingIssue::InvalidFunct12)
        );
        assert_eq!(
            Instruction::decode(0x0000_1073), // CSRRW (Zicsr)
            Err(EncodingIssue::InvalidFunct3)
        );
    }

    #[test]
    fn load_store_access_sizes_follow_funct3() {
        let lb = Instruction::decode(encode_i(0x00, 1, funct3::BYTE, 2, 0)).expect("legal");
        let lhu = Instruction::decode(encode_i(0x00, 1, funct3::HWORD_U, 2, 0)).expect("legal");
        let sw = Instruction::decode(encode_s(1, 2, funct3::WORD, 0)).expect("legal");
        assert_eq!(lb.access_size(), 1);
        assert_eq!(lhu.access_size(), 2);
        assert_eq!(sw.access_size(), 4);

        assert_eq!(
            Instruction::decode(encode_i(0x00, 1, 0b011_u8, 2, 0)), // LD
            Err(EncodingIssue::InvalidFunct3)
        );
        assert_eq!(
            Instruction::decode(encode_s(1, 2, 0b011_u8, 0)), // SD
            Err(EncodingIssue::InvalidFunct3)
        );
    }

    proptest! {
        #[test]
        fn i_immediate_round_trips(imm in -2048_i32..=2047) {
            let instr = Instruction::decode(encode_i(0x04, 1, 0, 2, imm)).unwrap();
            prop_assert_eq!(instr.imm as i32, imm);
        }

        #[test]
        fn s_immediate_round_trips(imm in -2048_i32..=2047) {
            let instr = Instruction::decode(encode_s(1, 2, 2, imm)).unwrap();
            prop_assert_eq!(instr.imm as i32, imm);
        }

        #[test]
        fn b_immediate_round_trips(raw in -2048_i32..=2047) {
            let imm = raw * 2; // bit 0 is architecturally zero
            let instr = Instruction::decode(encode_b(1, 2, 0, imm)).unwrap();
            prop_assert_eq!(instr.imm as i32, imm);
        }

        #[test]
        fn j_immediate_round_trips(raw in -0x8_0000_i32..=0x7_FFFF) {
            let imm = raw * 2;
            let instr = Instruction::decode(encode_j(1, imm)).unwrap();
            prop_assert_eq!(instr.imm as i32, imm);
        }

        #[test]
        fn u_immediate_round_trips(upper in 0_u32..=0xF_FFFF) {
            let instr = Instruction::decode(encode_u(0x0D, 1, upper << 12)).unwrap();
            prop_assert_eq!(instr.imm, upper << 12);
        }
    }

    #[test]
    fn maximum_magnitude_negative_immediates_decode() {
        assert_eq!(
            Instruction::decode(encode_i(0x04, 1, 0, 0, -2048)).unwrap().imm as i32,
            -2048
        );
        assert_eq!(
            Instruction::decode(encode_s(1, 2, 0, -2048)).unwrap().imm as i32,
            -2048
        );
        assert_eq!(
            Instruction::decode(encode_b(1, 2, 0, -4096)).unwrap().imm as i32,
            -4096
        );
        assert_eq!(
            Instruction::decode(encode_j(1, -0x10_0000)).unwrap().imm as i32,
            -0x10_0000
        );
    }
}
