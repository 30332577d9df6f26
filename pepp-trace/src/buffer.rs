//! trace buffer
//!
//! the buffer moves traces through three stages:
//!
//! * pending: pushed during the tick in flight
//! * staged: durable history, grouped by the tick at which it was staged
//! * committed: handed to every registered hook, then dropped
//!
//! pending traces may never survive into a new tick; the embedding
//! simulator must either `stage` or `pop` them before calling `tick`.

use std::collections::{BTreeMap, HashSet};

use nohash_hasher::BuildNoHashHasher;
use serde::{Deserialize, Serialize};

use crate::hook::{CommitHook, HookId};
use crate::{DeviceId, Error, Tick, TickedTrace, Trace};

/// outcome of a push
///
/// `overflow` is advisory: the push succeeded, but pending and staged
/// history together reached the configured maximum length, so the caller
/// should schedule a commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceStatus {
    pub success: bool,
    pub overflow: bool,
}

impl TraceStatus {
    pub const fn accepted(overflow: bool) -> Self {
        Self { success: true, overflow }
    }

    pub const fn rejected() -> Self {
        Self { success: false, overflow: true }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CommitStrategy {
    /// commit the fewest whole tick groups that bring staged history
    /// down to half of the maximum length
    Preferred,
    /// commit everything staged
    All,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TraceBufferConfig {
    /// pending plus staged length at which pushes report overflow
    pub max_length: usize,
    /// pending plus staged length at which pushes are refused
    pub hard_limit: Option<usize>,
}

impl Default for TraceBufferConfig {
    fn default() -> Self {
        Self {
            max_length: 10_000,
            hard_limit: None,
        }
    }
}

/// a run of staged traces sharing one tick; `start` indexes into staged
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Group {
    pub tick: Tick,
    pub start: usize,
}

pub struct TraceBuffer {
    config: TraceBufferConfig,
    current_tick: Tick,
    pending: Vec<Trace>,
    staged: Vec<TickedTrace>,
    groups: Vec<Group>,
    tracked: HashSet<DeviceId, BuildNoHashHasher<DeviceId>>,
    hooks: BTreeMap<HookId, Box<dyn CommitHook + Send>>,
    next_hook: HookId,
}

impl Default for TraceBuffer {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for TraceBuffer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TraceBuffer")
            .field("config", &self.config)
            .field("current_tick", &self.current_tick)
            .field("pending", &self.pending.len())
            .field("staged", &self.staged.len())
            .field("groups", &self.groups.len())
            .field("hooks", &self.hooks.len())
            .finish()
    }
}

impl TraceBuffer {
    pub fn new() -> Self {
        Self::with_config(TraceBufferConfig::default())
    }

    pub fn with_max_length(max_length: usize) -> Self {
        Self::with_config(TraceBufferConfig {
            max_length,
            ..Default::default()
        })
    }

    pub fn with_config(config: TraceBufferConfig) -> Self {
        Self {
            config,
            current_tick: 0,
            pending: Vec::new(),
            staged: Vec::new(),
            groups: Vec::new(),
            tracked: HashSet::default(),
            hooks: BTreeMap::new(),
            next_hook: 0,
        }
    }

    pub fn config(&self) -> &TraceBufferConfig {
        &self.config
    }

    pub fn max_length(&self) -> usize {
        self.config.max_length
    }

    pub fn set_max_length(&mut self, max_length: usize) {
        self.config.max_length = max_length;
    }

    pub fn current_tick(&self) -> Tick {
        self.current_tick
    }

    /// opt a device in or out of tracing
    pub fn trace_device(&mut self, device: DeviceId, enabled: bool) {
        if enabled {
            self.tracked.insert(device);
        } else {
            self.tracked.remove(&device);
        }
    }

    pub fn is_traced(&self, device: DeviceId) -> bool {
        self.tracked.contains(&device)
    }

    pub fn pending(&self) -> &[Trace] {
        &self.pending
    }

    pub fn staged(&self) -> &[TickedTrace] {
        &self.staged
    }

    pub fn groups(&self) -> &[Group] {
        &self.groups
    }

    fn len(&self) -> usize {
        self.pending.len() + self.staged.len()
    }

    fn admits(&self, count: usize) -> bool {
        self.config
            .hard_limit
            .map_or(true, |limit| self.len() + count <= limit)
    }

    /// record a trace for the tick in flight
    ///
    /// traces for untracked devices are accepted and dropped.
    pub fn push(&mut self, trace: Trace) -> TraceStatus {
        if !self.is_traced(trace.device) {
            return TraceStatus::accepted(false);
        }

        if !self.admits(1) {
            log::trace!("trace buffer full; refused {}", trace);
            return TraceStatus::rejected();
        }

        self.pending.push(trace);
        TraceStatus::accepted(self.len() >= self.config.max_length)
    }

    /// record several traces as a unit; either all tracked traces are
    /// recorded or none are
    pub fn push_all<I>(&mut self, traces: I) -> TraceStatus
    where
        I: IntoIterator<Item = Trace>,
    {
        let traces = traces
            .into_iter()
            .filter(|trace| self.is_traced(trace.device))
            .collect::<Vec<_>>();

        if traces.is_empty() {
            return TraceStatus::accepted(false);
        }

        if !self.admits(traces.len()) {
            log::trace!("trace buffer full; refused {} traces", traces.len());
            return TraceStatus::rejected();
        }

        self.pending.extend(traces);
        TraceStatus::accepted(self.len() >= self.config.max_length)
    }

    /// drop every pending trace
    pub fn pop(&mut self) {
        self.pending.clear();
    }

    /// move pending traces into the staged history under the current tick
    pub fn stage(&mut self) {
        if self.pending.is_empty() {
            return;
        }

        let tick = self.current_tick;
        if self.groups.last().map_or(true, |group| group.tick != tick) {
            self.groups.push(Group {
                tick,
                start: self.staged.len(),
            });
        }

        self.staged
            .extend(self.pending.drain(..).map(|trace| TickedTrace { tick, trace }));
    }

    /// advance to `tick`
    pub fn tick(&mut self, tick: Tick) -> Result<(), Error> {
        if !self.pending.is_empty() {
            return Err(Error::PendingAcrossTick {
                tick,
                count: self.pending.len(),
            });
        }
        self.current_tick = tick;
        Ok(())
    }

    /// remove staged history from the first group at or after `until`
    /// (or only the newest group when `until` is `None`) and rewind the
    /// buffer's tick to that boundary
    ///
    /// traces are yielded oldest first; undo them by iterating in reverse.
    pub fn discard(&mut self, until: Option<Tick>) -> std::vec::IntoIter<TickedTrace> {
        let group = match until {
            Some(until) => {
                self.current_tick = until;
                self.groups.iter().position(|group| group.tick >= until)
            }
            None => {
                let last = self.groups.len().checked_sub(1);
                if let Some(index) = last {
                    self.current_tick = self.groups[index].tick;
                }
                last
            }
        };

        let Some(group) = group else {
            return Vec::new().into_iter();
        };

        let start = self.groups[group].start;
        self.groups.truncate(group);
        let traces = self.staged.split_off(start);

        log::debug!(
            "discarded {} traces back to tick {}",
            traces.len(),
            self.current_tick
        );

        traces.into_iter()
    }

    fn preferred_cut(&self) -> usize {
        let target = self.config.max_length / 2;
        let length = self.staged.len();

        if length <= target {
            return 0;
        }

        self.groups
            .iter()
            .map(|group| group.start)
            .find(|start| length - start <= target)
            .unwrap_or(length)
    }

    /// hand staged history to every hook and drop it from the buffer
    ///
    /// commits always end on a group boundary.
    pub fn commit(&mut self, strategy: CommitStrategy) {
        let end = match strategy {
            CommitStrategy::All => self.staged.len(),
            CommitStrategy::Preferred => self.preferred_cut(),
        };

        if end == 0 {
            return;
        }

        let committed = self.staged.drain(..end).collect::<Vec<_>>();
        let retained = self
            .groups
            .iter()
            .position(|group| group.start >= end)
            .unwrap_or(self.groups.len());

        self.groups.drain(..retained);
        for group in self.groups.iter_mut() {
            group.start -= end;
        }

        log::debug!(
            "committing {} traces to {} hooks; {} remain staged",
            committed.len(),
            self.hooks.len(),
            self.staged.len()
        );

        for hook in self.hooks.values_mut() {
            hook.handle(&committed);
        }
    }

    pub fn register_commit_hook<H>(&mut self, hook: H) -> HookId
    where
        H: CommitHook + Send + 'static,
    {
        let id = self.next_hook;
        self.next_hook += 1;
        self.hooks.insert(id, Box::new(hook));
        log::debug!("registered commit hook {}", id);
        id
    }

    /// returns the removed hook, or `None` if `id` was not registered
    pub fn unregister_commit_hook(&mut self, id: HookId) -> Option<Box<dyn CommitHook + Send>> {
        let hook = self.hooks.remove(&id);
        if hook.is_some() {
            log::debug!("unregistered commit hook {}", id);
        }
        hook
    }
}
