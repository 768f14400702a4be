//! Architectural CPU state primitives.

/// Machine register file storage model.
pub mod registers;

pub use registers::{RegisterFile, REGISTER_COUNT};
