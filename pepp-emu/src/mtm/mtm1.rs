use pepp_state::{DevicePod, IdGenerator, Operation, Target};
use pepp_trace::{SharedTraceBuffer, Trace};

use super::{impl_mtm_common, MtmCore, Outcome, Register};
use crate::sim::{TickError, TickResult};
use crate::Error;

/// increments PC, then loads the word at the new PC from the target into A
pub struct Mtm1 {
    core: MtmCore,
}

impl Mtm1 {
    pub fn new(
        pod: DevicePod,
        clock_name: impl Into<String>,
        ids: &mut IdGenerator,
    ) -> Result<Self, Error> {
        Ok(Self {
            core: MtmCore::new(pod, clock_name.into(), ids)?,
        })
    }

    fn step(&mut self) -> Result<Outcome, TickResult> {
        let mut outcome = Outcome::new(self.core.begin(true)?);
        let pc = self.core.increment_pc(&mut outcome)?;

        let Some(target) = self.core.target.clone() else {
            return Err(TickResult::fail(TickError::NoTarget));
        };
        let result = target
            .lock()
            .read(u64::from(pc), Register::WIDTH, Operation::standard());
        let data = self.core.accept(&mut outcome, result)?;

        let status = self
            .core
            .registers
            .write(Register::A.offset(), &data, Operation::standard());
        self.core.stage();
        self.core.complete(&mut outcome, status)?;

        Ok(outcome)
    }

    fn set_trace_buffer_all(&mut self, trace_buffer: SharedTraceBuffer) {
        self.core.set_trace_buffer(trace_buffer);
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        self.core.replay(trace, forward)
    }

    fn reset_all(&mut self) {
        self.core.reset();
    }
}

impl_mtm_common!(Mtm1);
