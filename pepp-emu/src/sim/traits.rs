//! simulation traits

use std::sync::Arc;

use parking_lot::Mutex;

use pepp_state::{Device, SharedTarget, Traceable};
use pepp_trace::Tick;

use crate::sim::{Clock, TickResult};

/// clocked trait
///
/// a clocked device performs one unit of work each time its clock fires.
/// ticks never fail with `Err`; misconfiguration, missing input and
/// breakpoints are all reported through the returned [`TickResult`].
pub trait Clocked {
    fn clock_name(&self) -> &str;
    fn clock(&self) -> &Clock;
    fn set_clock(&mut self, clock: Clock);

    /// run one tick at simulation time `current`
    fn tick(&mut self, current: Tick) -> TickResult;

    fn cycle_count(&self) -> u64 {
        self.instruction_count()
    }

    fn instruction_count(&self) -> u64;

    /// clear architectural state and counters
    fn reset(&mut self);
}

/// a device that issues accesses against a target
pub trait Initiator {
    fn set_target(&mut self, target: SharedTarget);
    fn target(&self) -> Option<&SharedTarget>;
}

/// a clocked device that can be placed in a system
pub trait SystemClocked: Clocked + Device + Traceable + Initiator + Send {}

impl<T> SystemClocked for T where T: Clocked + Device + Traceable + Initiator + Send {}

pub type SharedClocked = Arc<Mutex<dyn SystemClocked>>;
