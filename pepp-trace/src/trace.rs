//! trace records
//!
//! a trace is an immutable description of one state delta. the payload
//! is a closed set of kinds, one per device family, so consumers match on
//! it instead of comparing type tags.

use std::fmt;

use serde::{Deserialize, Serialize};
use smallvec::SmallVec;

use crate::{DeviceId, Tick};

/// byte string carried by memory deltas; register-sized writes stay inline
pub type Bytes = SmallVec<[u8; 8]>;

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TracePayload {
    /// flat memory write: bytes at `address` changed from `old` to `new`
    Memory { address: u64, old: Bytes, new: Bytes },
    /// one value consumed from input channel `index`; `time` is the
    /// displacement of the read cursor before it advanced
    MmiRead { index: usize, time: usize },
    /// one value appended to output channel `index`; `time` is the
    /// displacement of the write cursor before the append
    MmoWrite { index: usize, time: usize, value: u8 },
    /// a clocked device retired one cycle
    IncrementCycle,
}

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Trace {
    pub device: DeviceId,
    pub payload: TracePayload,
}

impl Trace {
    pub fn new(device: DeviceId, payload: TracePayload) -> Self {
        Self { device, payload }
    }

    pub fn memory(device: DeviceId, address: u64, old: &[u8], new: &[u8]) -> Self {
        Self::new(
            device,
            TracePayload::Memory {
                address,
                old: Bytes::from_slice(old),
                new: Bytes::from_slice(new),
            },
        )
    }

    pub fn mmi_read(device: DeviceId, index: usize, time: usize) -> Self {
        Self::new(device, TracePayload::MmiRead { index, time })
    }

    pub fn mmo_write(device: DeviceId, index: usize, time: usize, value: u8) -> Self {
        Self::new(device, TracePayload::MmoWrite { index, time, value })
    }

    pub fn increment_cycle(device: DeviceId) -> Self {
        Self::new(device, TracePayload::IncrementCycle)
    }

    pub fn kind(&self) -> TraceKind {
        match self.payload {
            TracePayload::Memory { .. } => TraceKind::new("memory", "flat"),
            TracePayload::MmiRead { .. } => TraceKind::new("mmi", "read"),
            TracePayload::MmoWrite { .. } => TraceKind::new("mmo", "write"),
            TracePayload::IncrementCycle => TraceKind::new("mtm", "inc-cycle-count"),
        }
    }
}

impl fmt::Display for Trace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "device {} {}", self.device, self.kind())?;
        match &self.payload {
            TracePayload::Memory { address, old, new } => {
                let (old, new) = (old.as_slice(), new.as_slice());
                write!(f, " @ {:#06x}: {:02x?} -> {:02x?}", address, old, new)
            }
            TracePayload::MmiRead { index, time } => write!(f, " [{}] @ t{}", index, time),
            TracePayload::MmoWrite { index, time, value } => {
                write!(f, " [{}] @ t{}: {:#04x}", index, time, value)
            }
            TracePayload::IncrementCycle => Ok(()),
        }
    }
}

/// descriptive tag for a trace's device family and data shape
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TraceKind {
    pub device_kind: &'static str,
    pub data_kind: &'static str,
}

impl TraceKind {
    pub const fn new(device_kind: &'static str, data_kind: &'static str) -> Self {
        Self { device_kind, data_kind }
    }

    /// every trace kind currently produced is a delta against prior state
    pub fn is_delta(&self) -> bool {
        true
    }
}

impl fmt::Display for TraceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.device_kind, self.data_kind)
    }
}

/// a staged trace annotated with the tick of the group it belongs to
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TickedTrace {
    pub tick: Tick,
    pub trace: Trace,
}

impl std::ops::Deref for TickedTrace {
    type Target = Trace;

    fn deref(&self) -> &Self::Target {
        &self.trace
    }
}
