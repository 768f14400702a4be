//! Two-stage pipelined execution model over an instruction-bus handshake.
//!
//! The fetch stage issues an address-phase request one cycle ahead of the
//! execute stage and speculates the next-line address. The execute stage
//! samples the data phase each cycle: a wait response holds the whole
//! pipeline (the step echoes its input pc), and a taken redirect aborts
//! the speculative wrong-path fetch before requesting the real target.

use super::{decode_at, retire, Stepper};
use crate::fault::Fault;
use crate::memory::{AddressSpace, WORD_BYTES};
use crate::state::RegisterFile;

/// Data-phase outcome of an instruction fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchResponse {
    /// The slave is not ready; the requesting stage must hold.
    Wait,
    /// The fetched instruction word.
    Data(u32),
    /// The fetch itself violated the memory model.
    Fault(Fault),
}

/// Address-phase / data-phase instruction fetch handshake.
///
/// `request` starts a fetch, `sample` completes (or extends) it one cycle
/// later, and `abort` squashes a request whose result is no longer wanted.
pub trait InstructionBus {
    /// Starts the address phase of a fetch from `addr`.
    fn request(&mut self, addr: u32);

    /// Squashes the outstanding request, if any.
    fn abort(&mut self);

    /// Samples the data phase of the outstanding request.
    fn sample(&mut self, mem: &AddressSpace) -> FetchResponse;
}

/// Bus slave fronting the address space, with a fixed number of wait
/// states per fetch.
#[derive(Debug, Clone)]
pub struct SystemBus {
    wait_states: u32,
    pending: Option<Request>,
}

#[derive(Debug, Clone, Copy)]
struct Request {
    addr: u32,
    remaining_waits: u32,
}

impl SystemBus {
    /// Creates a bus that answers every fetch after `wait_states` wait
    /// cycles.
    #[must_use]
    pub const fn new(wait_states: u32) -> Self {
        Self {
            wait_states,
            pending: None,
        }
    }
}

impl InstructionBus for SystemBus {
    fn request(&mut self, addr: u32) {
        self.pending = Some(Request {
            addr,
            remaining_waits: self.wait_states,
        });
    }

    fn abort(&mut self) {
        self.pending = None;
    }

    fn sample(&mut self, mem: &AddressSpace) -> FetchResponse {
        let Some(request) = self.pending.as_mut() else {
            return FetchResponse::Wait;
        };
        if request.remaining_waits > 0 {
            request.remaining_waits -= 1;
            return FetchResponse::Wait;
        }
        let addr = request.addr;
        self.pending = None;
        match mem.read(addr, WORD_BYTES) {
            Ok(word) => FetchResponse::Data(word),
            Err(fault) => FetchResponse::Fault(fault),
        }
    }
}

/// The pipelined model: fetch and execute overlap by one instruction.
///
/// Each `step` is one clock edge. Its outputs depend only on the captured
/// fetch-stage state and the handshake signals sampled this cycle, never
/// on values computed earlier in the same call for a different stage.
#[derive(Debug, Clone)]
pub struct PipelinedStepper<B> {
    bus: B,
    /// Address of the fetch whose data phase completes next.
    inflight: Option<u32>,
}

impl PipelinedStepper<SystemBus> {
    /// Creates the pipeline over a [`SystemBus`] with `wait_states` wait
    /// cycles per fetch.
    #[must_use]
    pub const fn with_wait_states(wait_states: u32) -> Self {
        Self::new(SystemBus::new(wait_states))
    }
}

impl<B: InstructionBus> PipelinedStepper<B> {
    /// Creates the pipeline over an arbitrary instruction bus.
    #[must_use]
    pub const fn new(bus: B) -> Self {
        Self { bus, inflight: None }
    }

    fn retire_and_refill(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
        word: u32,
    ) -> Result<u32, Fault> {
        // Next-line speculation: the fetch stage requests pc+4 while the
        // execute stage works on the current word.
        let speculative = pc.wrapping_add(4);
        self.bus.request(speculative);

        let outcome = decode_at(pc, word).and_then(|instruction| retire(mem, regs, pc, &instruction));
        let next = match outcome {
            Ok(next) => next,
            Err(fault) => {
                self.bus.abort();
                self.inflight = None;
                return Err(fault);
            }
        };

        if next != speculative {
            // Redirect: squash the wrong-path fetch.
            self.bus.abort();
            self.bus.request(next);
        }
        self.inflight = Some(next);
        Ok(next)
    }
}

impl<B: InstructionBus> Stepper for PipelinedStepper<B> {
    fn step(
        &mut self,
        mem: &mut AddressSpace,
        regs: &mut RegisterFile,
        pc: u32,
    ) -> Result<u32, Fault> {
        let Some(fetch_pc) = self.inflight else {
            // Pipeline fill: first cycle only issues the address phase.
            self.bus.request(pc);
            self.inflight = Some(pc);
            return Ok(pc);
        };

        if fetch_pc != pc {
            // The driver moved the pc under us; restart the fetch stage.
            self.bus.abort();
            self.bus.request(pc);
            self.inflight = Some(pc);
            return Ok(pc);
        }

        match self.bus.sample(mem) {
            FetchResponse::Wait => Ok(pc),
            FetchResponse::Fault(fault) => {
                self.inflight = None;
                Err(fault)
            }
            FetchResponse::Data(word) => self.retire_and_refill(mem, regs, pc, word),
        }
    }
}
