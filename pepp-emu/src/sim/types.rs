//! simulation types
//!
//! various types used across the simulation module

use pepp_state::AccessError;
use pepp_trace::Tick;

use crate::Error;

/// a named time source driving one or more clocked devices
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Clock {
    name: String,
    interval: Tick,
    elapsed: Tick,
    enabled: bool,
}

impl Clock {
    /// create a clock firing every `interval` ticks
    ///
    /// errors if interval is zero
    pub fn new(name: impl Into<String>, interval: Tick) -> Result<Self, Error> {
        let name = name.into();
        if interval == 0 {
            return Err(Error::Clock(format!("clock `{}` must have a non-zero interval", name)));
        }
        Ok(Self {
            name,
            interval,
            elapsed: 0,
            enabled: true,
        })
    }

    /// a clock that never fires
    pub fn disabled() -> Self {
        Self {
            name: String::from("disabled"),
            interval: 1,
            elapsed: 0,
            enabled: false,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn interval(&self) -> Tick {
        self.interval
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    /// get elapsed time in ticks since instantiation
    pub fn ticks_elapsed(&self) -> Tick {
        self.elapsed
    }

    /// increment elapsed time by one
    pub fn tick(&mut self) {
        self.elapsed += 1
    }

    /// increment elapsed time by n
    pub fn ticks(&mut self, n: Tick) {
        self.elapsed += n
    }

    /// the next tick at which this clock fires, if it fires at all
    pub fn next_fire(&self) -> Option<Tick> {
        self.enabled.then(|| self.elapsed + self.interval)
    }
}

impl Default for Clock {
    fn default() -> Self {
        Self::disabled()
    }
}

/// how long until a device wants to be ticked again
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Delay {
    /// after `period` cycles of the device's own clock
    Clock { period: Tick },
    /// after `period` simulation ticks
    Tick { period: Tick },
    /// not until something external intervenes
    Indefinite,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TickError {
    Success,
    /// an input device ran dry; supply input and retry
    NoMmInput,
    Terminate,
    Breakpoint,
    /// the cycle trace could not be recorded; nothing was changed
    TraceOverflow,
    /// a later access was refused by the trace buffer; discard this
    /// tick's group, commit and retry
    TraceOverflowAfterCommit,
    /// an initiator was ticked with no target attached
    NoTarget,
}

impl TickError {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

impl From<AccessError> for TickError {
    fn from(error: AccessError) -> Self {
        match error {
            AccessError::Success => Self::Success,
            AccessError::Unmapped | AccessError::OutOfBounds => Self::Terminate,
            AccessError::NeedsMmi => Self::NoMmInput,
            AccessError::Breakpoint => Self::Breakpoint,
            AccessError::FullTraceBuffer => Self::TraceOverflowAfterCommit,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TickResult {
    pub pause: bool,
    pub sync: bool,
    pub delay: Delay,
    pub error: TickError,
}

impl TickResult {
    /// a tick that stopped before finishing its work
    pub fn fail(error: TickError) -> Self {
        Self {
            pause: true,
            sync: true,
            delay: Delay::Indefinite,
            error,
        }
    }

    /// a tick refused by the trace buffer before any state changed
    pub fn trace_overflow() -> Self {
        Self {
            pause: false,
            sync: true,
            delay: Delay::Indefinite,
            error: TickError::TraceOverflow,
        }
    }
}
