//! access interposers
//!
//! an interposer is consulted after every effectful access a device
//! completes. a breakpoint does not undo the access; it only asks the
//! caller to pause.

use std::collections::BTreeSet;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::target::{AccessStatus, Operation};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InterposeResult {
    Success,
    Breakpoint,
}

pub trait Interposer {
    fn try_read(&mut self, address: u64, count: usize, op: Operation) -> InterposeResult;
    fn try_write(&mut self, address: u64, data: &[u8], op: Operation) -> InterposeResult;
}

pub type SharedInterposer = Arc<Mutex<dyn Interposer + Send>>;

pub(crate) fn gate_read(
    interposer: Option<&SharedInterposer>,
    address: u64,
    count: usize,
    op: Operation,
    status: AccessStatus,
) -> AccessStatus {
    match interposer {
        Some(interposer) if op.is_effectful() => {
            match interposer.lock().try_read(address, count, op) {
                InterposeResult::Breakpoint => status.breakpoint(),
                InterposeResult::Success => status,
            }
        }
        _ => status,
    }
}

pub(crate) fn gate_write(
    interposer: Option<&SharedInterposer>,
    address: u64,
    data: &[u8],
    op: Operation,
    status: AccessStatus,
) -> AccessStatus {
    match interposer {
        Some(interposer) if op.is_effectful() => {
            match interposer.lock().try_write(address, data, op) {
                InterposeResult::Breakpoint => status.breakpoint(),
                InterposeResult::Success => status,
            }
        }
        _ => status,
    }
}

/// breakpoints on individual addresses
///
/// after a hit the interposer disarms itself until [`rearm`] is called,
/// so resuming from a breakpoint does not immediately trip it again.
///
/// [`rearm`]: AddressBreakpoints::rearm
#[derive(Debug, Clone)]
pub struct AddressBreakpoints {
    reads: BTreeSet<u64>,
    writes: BTreeSet<u64>,
    armed: bool,
    hits: usize,
}

impl Default for AddressBreakpoints {
    fn default() -> Self {
        Self {
            reads: BTreeSet::new(),
            writes: BTreeSet::new(),
            armed: true,
            hits: 0,
        }
    }
}

impl AddressBreakpoints {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shared(self) -> Arc<Mutex<Self>> {
        Arc::new(Mutex::new(self))
    }

    pub fn break_on_read(&mut self, address: u64) {
        self.reads.insert(address);
    }

    pub fn break_on_write(&mut self, address: u64) {
        self.writes.insert(address);
    }

    pub fn remove(&mut self, address: u64) {
        self.reads.remove(&address);
        self.writes.remove(&address);
    }

    pub fn rearm(&mut self) {
        self.armed = true;
    }

    pub fn is_armed(&self) -> bool {
        self.armed
    }

    pub fn hits(&self) -> usize {
        self.hits
    }

    fn check(
        armed: &mut bool,
        hits: &mut usize,
        set: &BTreeSet<u64>,
        address: u64,
        count: usize,
    ) -> InterposeResult {
        if !*armed || count == 0 {
            return InterposeResult::Success;
        }

        let end = address.saturating_add(count as u64 - 1);
        if set.range(address..=end).next().is_none() {
            return InterposeResult::Success;
        }

        log::trace!("breakpoint hit in [{:#x}, {:#x}]", address, end);
        *armed = false;
        *hits += 1;
        InterposeResult::Breakpoint
    }
}

impl Interposer for AddressBreakpoints {
    fn try_read(&mut self, address: u64, count: usize, _op: Operation) -> InterposeResult {
        Self::check(&mut self.armed, &mut self.hits, &self.reads, address, count)
    }

    fn try_write(&mut self, address: u64, data: &[u8], _op: Operation) -> InterposeResult {
        Self::check(&mut self.armed, &mut self.hits, &self.writes, address, data.len())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn disarms_after_hit() {
        let mut bp = AddressBreakpoints::new();
        bp.break_on_read(0x10);

        let op = Operation::standard();
        assert_eq!(bp.try_read(0x0e, 2, op), InterposeResult::Success);
        assert_eq!(bp.try_read(0x0f, 2, op), InterposeResult::Breakpoint);
        assert!(!bp.is_armed());
        assert_eq!(bp.try_read(0x10, 1, op), InterposeResult::Success);

        bp.rearm();
        assert_eq!(bp.try_read(0x10, 1, op), InterposeResult::Breakpoint);
        assert_eq!(bp.hits(), 2);
    }

    #[test]
    fn reads_and_writes_are_separate() {
        let mut bp = AddressBreakpoints::new();
        bp.break_on_write(4);

        let op = Operation::standard();
        assert_eq!(bp.try_read(4, 1, op), InterposeResult::Success);
        assert_eq!(bp.try_write(4, &[0], op), InterposeResult::Breakpoint);

        bp.rearm();
        bp.remove(4);
        assert_eq!(bp.try_write(4, &[0], op), InterposeResult::Success);
    }
}
