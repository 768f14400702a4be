//! Outer cycle loop and halt condition for compliance runs.
//!
//! The execution model is chosen at build time: the `multi-cycle` and
//! `pipelined` cargo features select the timed models, otherwise the
//! single-cycle reference model runs. The loop itself is model-agnostic:
//! step once per cycle, poll the `tohost` mailbox, stop on a non-zero
//! value or an exhausted cycle budget.

use rv32_core::{AddressSpace, Fault, RegisterFile, Stepper, WellKnownSymbol, WORD_BYTES};

/// Outer-loop knobs.
#[derive(Debug, Clone, Copy, Default)]
pub struct RunConfig {
    /// Maximum number of cycles to run; 0 means unbounded.
    pub cycle_budget: u64,
}

/// How a run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RunReport {
    /// Cycles consumed.
    pub cycles: u64,
    /// Program counter for the cycle after the last one executed.
    pub pc: u32,
    /// Final `tohost` value; non-zero means the program signalled
    /// completion, zero means the cycle budget ran out first.
    pub tohost: u32,
}

/// Runs `stepper` from the image entry point until `tohost` goes non-zero
/// or the cycle budget is exhausted.
///
/// An image without a resolved `tohost` symbol runs on the cycle budget
/// alone; an unbounded budget then means the call only returns on a fault.
///
/// # Errors
///
/// Propagates the first [`Fault`] raised by the execution model.
pub fn run(
    stepper: &mut impl Stepper,
    mem: &mut AddressSpace,
    regs: &mut RegisterFile,
    config: RunConfig,
) -> Result<RunReport, Fault> {
    let tohost = mem.symbol(WellKnownSymbol::ToHost);
    let mut pc = mem.entry_point();
    let mut cycles = 0_u64;

    while config.cycle_budget == 0 || cycles < config.cycle_budget {
        pc = stepper.step(mem, regs, pc)?;
        cycles += 1;
        if let Some(addr) = tohost {
            let value = mem.read(addr, WORD_BYTES)?;
            if value != 0 {
                return Ok(RunReport {
                    cycles,
                    pc,
                    tohost: value,
                });
            }
        }
    }
    Ok(RunReport {
        cycles,
        pc,
        tohost: 0,
    })
}

/// The execution model selected by cargo features.
#[cfg(feature = "pipelined")]
#[must_use]
pub const fn selected_stepper() -> rv32_core::PipelinedStepper<rv32_core::SystemBus> {
    rv32_core::PipelinedStepper::with_wait_states(0)
}

/// The execution model selected by cargo features.
#[cfg(all(feature = "multi-cycle", not(feature = "pipelined")))]
#[must_use]
pub const fn selected_stepper() -> rv32_core::MultiCycleStepper {
    rv32_core::MultiCycleStepper::new()
}

/// The execution model selected by cargo features.
#[cfg(not(any(feature = "multi-cycle", feature = "pipelined")))]
#[must_use]
pub const fn selected_stepper() -> rv32_core::SingleCycleStepper {
    rv32_core::SingleCycleStepper::new()
}

#[cfg(test)]
use tempfile as _;
