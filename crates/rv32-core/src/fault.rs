use thiserror::Error;

/// Reason the decoder rejected an instruction word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum EncodingIssue {
    /// The base opcode is outside the supported RV32I classes.
    #[error("unsupported opcode")]
    UnsupportedOpcode,
    /// The funct3 field names a reserved operation for its opcode class.
    #[error("invalid funct3")]
    InvalidFunct3,
    /// The funct7 field is not an exact match for its funct3 operation.
    #[error("invalid funct7")]
    InvalidFunct7,
    /// A SYSTEM instruction carries a funct12 other than ECALL/EBREAK.
    #[error("invalid funct12")]
    InvalidFunct12,
    /// A register field exceeds the register count of the E variant.
    #[error("register index out of range")]
    RegisterOutOfRange,
}

/// Run-time architectural violations.
///
/// Every variant is fatal to the simulation: there is no trap handler or
/// recovery path. A compliance run that faults is a failed test, and the
/// diagnostic names the faulting location so the test binary can be fixed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
#[cfg_attr(feature = "serde", derive(serde::Deserialize, serde::Serialize))]
pub enum Fault {
    /// The fetched word does not encode a legal RV32I instruction.
    #[error("illegal instruction {word:#010x} at address {pc:#010x}: {issue}")]
    IllegalInstruction {
        /// Program counter of the faulting instruction.
        pc: u32,
        /// Raw 32-bit encoding that was rejected.
        word: u32,
        /// Specific encoding violation.
        issue: EncodingIssue,
    },
    /// A memory access fell outside every loaded region.
    #[error("unmapped {size}-byte access at address {addr:#010x}")]
    UnmappedAccess {
        /// Faulting address.
        addr: u32,
        /// Access width in bytes.
        size: u32,
    },
    /// A memory access was not aligned to its own width.
    #[error("misaligned {size}-byte access at address {addr:#010x}")]
    MisalignedAccess {
        /// Faulting address.
        addr: u32,
        /// Access width in bytes.
        size: u32,
    },
    /// A memory access used a width other than 1, 2 or 4 bytes.
    #[error("unsupported access size {size}")]
    UnsupportedAccessSize {
        /// Rejected access width in bytes.
        size: u32,
    },
}

impl Fault {
    /// Wraps a decoder rejection with the fetch context it occurred in.
    #[must_use]
    pub const fn illegal(pc: u32, word: u32, issue: EncodingIssue) -> Self {
        Self::IllegalInstruction { pc, word, issue }
    }

    /// Returns `true` when the fault is an instruction-legality violation
    /// rather than a memory-system violation.
    #[must_use]
    pub const fn is_illegal_instruction(self) -> bool {
        matches!(self, Self::IllegalInstruction { .. })
    }
}
