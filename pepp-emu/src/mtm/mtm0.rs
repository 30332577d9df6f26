use pepp_state::{DevicePod, IdGenerator};
use pepp_trace::{SharedTraceBuffer, Trace};

use super::{impl_mtm_common, MtmCore, Outcome};
use crate::sim::TickResult;
use crate::Error;

/// increments PC once per tick
pub struct Mtm0 {
    core: MtmCore,
}

impl Mtm0 {
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
        let mut outcome = Outcome::new(self.core.begin(false)?);
        self.core.increment_pc(&mut outcome)?;
        self.core.stage();
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

impl_mtm_common!(Mtm0);
