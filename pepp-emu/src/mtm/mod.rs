//! minimal test machines
//!
//! three tiny clocked devices used to exercise the tick protocol:
//!
//! * [`Mtm0`]: increments PC
//! * [`Mtm1`]: increments PC, then loads the word at the new PC into A
//! * [`Mtm2`]: increments PC, then copies one byte from its input port to
//!   its output port
//!
//! each tick records one cycle trace, performs its accesses, and stages
//! everything under the current tick exactly once.

use pepp_state::{
    AccessStatus, DenseMemory, DevicePod, IdGenerator, Operation, ReadResult, SharedTarget, Target,
    Traceable,
};
use pepp_trace::{SharedTraceBuffer, Trace, TracePayload};

use crate::sim::{Clock, Delay, TickError, TickResult};
use crate::Error;

pub mod register;
pub use register::Register;

mod mtm0;
pub use mtm0::Mtm0;

mod mtm1;
pub use mtm1::Mtm1;

mod mtm2;
pub use mtm2::Mtm2;

/// flags accumulated across the accesses of one tick
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Outcome {
    sync: bool,
    pause: bool,
    error: TickError,
}

impl Outcome {
    fn new(sync: bool) -> Self {
        Self {
            sync,
            pause: false,
            error: TickError::Success,
        }
    }

    fn merge(&mut self, status: &AccessStatus) {
        self.sync |= status.sync;
        self.pause |= status.pause;
        if self.error.is_success() {
            self.error = status.error.into();
        }
    }

    fn finish(self) -> TickResult {
        TickResult {
            pause: self.pause,
            sync: self.sync,
            delay: Delay::Clock { period: 1 },
            error: self.error,
        }
    }
}

/// state common to every test machine
pub(crate) struct MtmCore {
    pod: DevicePod,
    clock_name: String,
    clock: Clock,
    registers: DenseMemory,
    instruction_count: u64,
    trace_buffer: Option<SharedTraceBuffer>,
    target: Option<SharedTarget>,
}

impl MtmCore {
    fn new(pod: DevicePod, clock_name: String, ids: &mut IdGenerator) -> Result<Self, Error> {
        let registers = register::bank(&pod, ids.next_id())?;
        log::debug!("{}: test machine on clock `{}`", pod.full_name, clock_name);

        Ok(Self {
            pod,
            clock_name,
            clock: Clock::disabled(),
            registers,
            instruction_count: 0,
            trace_buffer: None,
            target: None,
        })
    }

    /// record the cycle and bump the instruction count
    ///
    /// returns the advisory sync flag from the trace buffer.
    fn begin(&mut self, requires_target: bool) -> Result<bool, TickResult> {
        if requires_target && self.target.is_none() {
            log::warn!("{}: ticked without a target", self.pod.full_name);
            return Err(TickResult::fail(TickError::NoTarget));
        }

        let mut sync = false;
        if let Some(trace_buffer) = &self.trace_buffer {
            let status = trace_buffer.lock().push(Trace::increment_cycle(self.pod.device_id));
            if !status.success {
                return Err(TickResult::trace_overflow());
            }
            sync = status.overflow;
        }

        self.instruction_count += 1;
        Ok(sync)
    }

    fn stage(&self) {
        if let Some(trace_buffer) = &self.trace_buffer {
            trace_buffer.lock().stage();
        }
    }

    /// end the tick early; whatever was recorded so far is staged so the
    /// caller can discard it as a unit
    fn abort(&self, status: &AccessStatus) -> TickResult {
        log::debug!("{}: tick aborted ({:?})", self.pod.full_name, status.error);
        self.stage();
        TickResult::fail(status.error.into())
    }

    fn complete(&self, outcome: &mut Outcome, status: AccessStatus) -> Result<(), TickResult> {
        if !status.completed {
            return Err(self.abort(&status));
        }
        outcome.merge(&status);
        Ok(())
    }

    fn accept(&self, outcome: &mut Outcome, result: ReadResult) -> Result<Vec<u8>, TickResult> {
        match result.data {
            Some(data) if result.status.completed => {
                outcome.merge(&result.status);
                Ok(data)
            }
            _ => Err(self.abort(&result.status)),
        }
    }

    fn read_register(
        &mut self,
        outcome: &mut Outcome,
        register: Register,
    ) -> Result<u16, TickResult> {
        let result = self
            .registers
            .read(register.offset(), Register::WIDTH, Operation::standard());
        let data = self.accept(outcome, result)?;
        Ok(register::decode(&data))
    }

    fn write_register(
        &mut self,
        outcome: &mut Outcome,
        register: Register,
        value: u16,
    ) -> Result<(), TickResult> {
        let status = self.registers.write(
            register.offset(),
            &register::encode(value),
            Operation::standard(),
        );
        self.complete(outcome, status)
    }

    fn increment_pc(&mut self, outcome: &mut Outcome) -> Result<u16, TickResult> {
        let pc = self.read_register(outcome, Register::Pc)?.wrapping_add(1);
        self.write_register(outcome, Register::Pc, pc)?;
        Ok(pc)
    }

    fn register(&self, register: Register) -> u16 {
        register::peek(&self.registers, register)
    }

    fn set_register(&mut self, register: Register, value: u16) -> AccessStatus {
        self.registers.write(
            register.offset(),
            &register::encode(value),
            Operation::application(),
        )
    }

    fn set_trace_buffer(&mut self, trace_buffer: SharedTraceBuffer) {
        self.registers.set_trace_buffer(trace_buffer.clone());
        self.trace_buffer = Some(trace_buffer);
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        if trace.device != self.pod.device_id {
            return if forward {
                self.registers.redo(trace)
            } else {
                self.registers.undo(trace)
            };
        }

        match trace.payload {
            TracePayload::IncrementCycle if forward => {
                self.instruction_count += 1;
                true
            }
            TracePayload::IncrementCycle => {
                self.instruction_count = self.instruction_count.saturating_sub(1);
                true
            }
            _ => false,
        }
    }

    fn reset(&mut self) {
        self.registers.clear(0);
        self.instruction_count = 0;
    }
}

/// implements the identity and clock plumbing shared by the machines
macro_rules! impl_mtm_common {
    ($machine:ty) => {
        impl pepp_state::Device for $machine {
            fn pod(&self) -> &pepp_state::DevicePod {
                &self.core.pod
            }
        }

        impl pepp_state::Traceable for $machine {
            fn set_trace_buffer(&mut self, trace_buffer: pepp_trace::SharedTraceBuffer) {
                self.set_trace_buffer_all(trace_buffer);
            }

            fn redo(&mut self, trace: &pepp_trace::Trace) -> bool {
                self.replay(trace, true)
            }

            fn undo(&mut self, trace: &pepp_trace::Trace) -> bool {
                self.replay(trace, false)
            }
        }

        impl crate::sim::Initiator for $machine {
            fn set_target(&mut self, target: pepp_state::SharedTarget) {
                self.core.target = Some(target);
            }

            fn target(&self) -> Option<&pepp_state::SharedTarget> {
                self.core.target.as_ref()
            }
        }

        impl crate::sim::Clocked for $machine {
            fn clock_name(&self) -> &str {
                &self.core.clock_name
            }

            fn clock(&self) -> &crate::sim::Clock {
                &self.core.clock
            }

            fn set_clock(&mut self, clock: crate::sim::Clock) {
                self.core.clock_name = clock.name().to_string();
                self.core.clock = clock;
            }

            fn tick(&mut self, _current: pepp_trace::Tick) -> crate::sim::TickResult {
                match self.step() {
                    Ok(outcome) => outcome.finish(),
                    Err(result) => result,
                }
            }

            fn instruction_count(&self) -> u64 {
                self.core.instruction_count
            }

            fn reset(&mut self) {
                self.reset_all();
            }
        }

        impl $machine {
            /// side-effect free view of a register
            pub fn register(&self, register: crate::mtm::Register) -> u16 {
                self.core.register(register)
            }

            /// set a register as the application would; traced like any write
            pub fn set_register(
                &mut self,
                register: crate::mtm::Register,
                value: u16,
            ) -> pepp_state::WriteResult {
                self.core.set_register(register, value)
            }

            pub fn registers(&self) -> &pepp_state::DenseMemory {
                &self.core.registers
            }

            pub fn registers_mut(&mut self) -> &mut pepp_state::DenseMemory {
                &mut self.core.registers
            }
        }
    };
}

pub(crate) use impl_mtm_common;
