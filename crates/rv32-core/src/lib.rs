//! Core RV32I simulation crate for compliance-test execution.
//!
//! One decoder, one ALU and one address-space model drive three execution
//! models of different cycle accuracy. All three retire the same
//! architectural results for the same program; they differ only in cycle
//! occupancy.

/// Width of the machine word and program counter, in bits.
pub const XLEN: u32 = 32;

/// Loaded program image, sized/aligned access and well-known symbols.
pub mod memory;
pub use memory::{AddressSpace, ImageError, SignatureError, WellKnownSymbol, WORD_BYTES};

/// Architectural CPU state model primitives.
pub mod state;
pub use state::{RegisterFile, REGISTER_COUNT};

/// Load-time and run-time error taxonomy.
pub mod fault;
pub use fault::{EncodingIssue, Fault};

/// Instruction decode with field extraction and legality validation.
pub mod decoder;
pub use decoder::{Instruction, Opcode, FUNCT7_ALT};

/// Combinational ALU and branch evaluator.
pub mod alu;
pub use alu::{evaluate, Select};

/// The three execution models.
pub mod exec;
pub use exec::{
    FetchResponse, InstructionBus, MultiCycleStepper, PipelinedStepper, SingleCycleStepper,
    Stepper, SystemBus,
};

#[cfg(test)]
use proptest as _;
#[cfg(test)]
use rstest as _;
