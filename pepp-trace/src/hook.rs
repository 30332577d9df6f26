//! commit hooks
//!
//! hooks receive every trace the buffer commits, annotated with its tick,
//! in the order the traces were pushed.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::TickedTrace;

/// opaque handle returned when registering a hook
pub type HookId = usize;

pub trait CommitHook {
    fn handle(&mut self, traces: &[TickedTrace]);
}

impl<F> CommitHook for F
where
    F: FnMut(&[TickedTrace]),
{
    fn handle(&mut self, traces: &[TickedTrace]) {
        self(traces)
    }
}

/// writes each committed trace to the `log` facade
#[derive(Debug, Clone, Copy)]
pub struct LogHook {
    level: log::Level,
}

impl LogHook {
    pub fn new(level: log::Level) -> Self {
        Self { level }
    }
}

impl Default for LogHook {
    fn default() -> Self {
        Self::new(log::Level::Trace)
    }
}

impl CommitHook for LogHook {
    fn handle(&mut self, traces: &[TickedTrace]) {
        for ticked in traces {
            log::log!(self.level, "commit tick {}: {}", ticked.tick, ticked.trace);
        }
    }
}

/// keeps every committed trace; clones share the same record
#[derive(Debug, Clone, Default)]
pub struct TraceRecorder {
    record: Arc<Mutex<Vec<TickedTrace>>>,
}

impl TraceRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.record.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.record.lock().is_empty()
    }

    /// copy of everything recorded so far
    pub fn traces(&self) -> Vec<TickedTrace> {
        self.record.lock().clone()
    }

    /// remove and return everything recorded so far
    pub fn take(&self) -> Vec<TickedTrace> {
        std::mem::take(&mut *self.record.lock())
    }
}

impl CommitHook for TraceRecorder {
    fn handle(&mut self, traces: &[TickedTrace]) {
        self.record.lock().extend_from_slice(traces);
    }
}
