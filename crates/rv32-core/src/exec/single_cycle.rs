//! Reference execution model: fetch, decode and retire in one cycle.

use super::{decode_at, fetch, retire, Stepper};
use crate::fault::Fault;
use crate::memory::AddressSpace;
use crate::state::RegisterFile;

/// Executes exactly one instruction per [`Stepper::step`] call.
///
/// This is the architectural reference the timed models are checked
/// against; it holds no state between cycles.
#[derive(Debug, Clone, Copy, Default)]
pub struct SingleCycleStepper;

impl SingleCycleStepper {
    /// Creates the stateless single-cycle model.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

impl Stepper for SingleCycleStepper {
    fn step(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
    ) -> Result<u32, Fault> {
        let word = fetch(mem, pc)?;
        let instruction = decode_at(pc, word)?;
        retire(mem, regs, pc, &instruction)
    }
}
