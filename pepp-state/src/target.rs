//! addressable targets
//!
//! every device attached to a bus implements [`Target`]. accesses report
//! their outcome through [`AccessStatus`] rather than `Err`: running off
//! the end of a device or starving an input channel is an expected
//! condition the caller reacts to, not a failure of the simulator.
use bitflags::bitflags;

use crate::Error;

bitflags! {
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AccessFlags: u8 {
        /// inspect without side effects (no traces, no input consumed)
        const SPECULATIVE = 0b01;
        /// a real access; interposers are consulted
        const EFFECTFUL = 0b10;
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessKind {
    Data,
    Instruction,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Operation {
    pub flags: AccessFlags,
    pub kind: AccessKind,
}

impl Operation {
    pub const fn new(kind: AccessKind, flags: AccessFlags) -> Self {
        Self { flags, kind }
    }

    /// an effectful data access, as issued by a processor
    pub const fn standard() -> Self {
        Self::new(AccessKind::Data, AccessFlags::EFFECTFUL)
    }

    /// an effectful instruction fetch
    pub const fn fetch() -> Self {
        Self::new(AccessKind::Instruction, AccessFlags::EFFECTFUL)
    }

    /// a peek that must not disturb the device, e.g. a memory pane
    pub const fn speculative() -> Self {
        Self::new(AccessKind::Data, AccessFlags::SPECULATIVE)
    }

    /// a host-side access (loaders, editors) that bypasses interposers
    pub const fn application() -> Self {
        Self::new(AccessKind::Data, AccessFlags::empty())
    }

    pub fn is_speculative(&self) -> bool {
        self.flags.contains(AccessFlags::SPECULATIVE)
    }

    pub fn is_effectful(&self) -> bool {
        self.flags.contains(AccessFlags::EFFECTFUL)
    }

    pub fn is_data(&self) -> bool {
        matches!(self.kind, AccessKind::Data)
    }

    pub fn is_instruction(&self) -> bool {
        matches!(self.kind, AccessKind::Instruction)
    }
}

impl Default for Operation {
    fn default() -> Self {
        Self::standard()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessError {
    Success,
    Unmapped,
    OutOfBounds,
    NeedsMmi,
    Breakpoint,
    FullTraceBuffer,
}

impl AccessError {
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success)
    }
}

/// outcome of a single access
///
/// `completed == false` guarantees the access had no side effects.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct AccessStatus {
    pub completed: bool,
    pub advance: bool,
    /// a breakpoint was hit
    pub pause: bool,
    /// the trace buffer is near capacity and should be committed
    pub sync: bool,
    pub error: AccessError,
}

impl AccessStatus {
    pub const fn success() -> Self {
        Self {
            completed: true,
            advance: true,
            pause: false,
            sync: false,
            error: AccessError::Success,
        }
    }

    pub const fn out_of_bounds() -> Self {
        Self {
            completed: false,
            advance: false,
            pause: true,
            sync: false,
            error: AccessError::OutOfBounds,
        }
    }

    /// no device answers for the address
    pub const fn unmapped() -> Self {
        Self {
            completed: false,
            advance: false,
            pause: true,
            sync: false,
            error: AccessError::Unmapped,
        }
    }

    pub const fn needs_mmi() -> Self {
        Self {
            completed: false,
            advance: false,
            pause: false,
            sync: false,
            error: AccessError::NeedsMmi,
        }
    }

    pub const fn full_trace_buffer() -> Self {
        Self {
            completed: false,
            advance: false,
            pause: false,
            sync: true,
            error: AccessError::FullTraceBuffer,
        }
    }

    /// mark a completed access as having tripped a breakpoint
    pub fn breakpoint(mut self) -> Self {
        self.pause = true;
        self.error = AccessError::Breakpoint;
        self
    }

    pub fn with_sync(mut self, sync: bool) -> Self {
        self.sync |= sync;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ReadResult {
    pub status: AccessStatus,
    /// present only when the read completed
    pub data: Option<Vec<u8>>,
}

impl ReadResult {
    pub fn completed(status: AccessStatus, data: Vec<u8>) -> Self {
        Self {
            status,
            data: Some(data),
        }
    }

    pub fn failed(status: AccessStatus) -> Self {
        Self { status, data: None }
    }

    pub fn is_completed(&self) -> bool {
        self.status.completed
    }

    pub fn error(&self) -> AccessError {
        self.status.error
    }
}

pub type WriteResult = AccessStatus;

pub trait Target {
    fn min_offset(&self) -> u64;
    fn max_offset(&self) -> u64;

    fn contains(&self, address: u64) -> bool {
        address >= self.min_offset() && address <= self.max_offset()
    }

    /// read `count` bytes starting at `address`
    ///
    /// only `address` itself is bounds checked; bytes past the maximum
    /// offset wrap around to the minimum offset.
    fn read(&mut self, address: u64, count: usize, op: Operation) -> ReadResult;

    /// write `data` starting at `address`, wrapping like [`Target::read`]
    fn write(&mut self, address: u64, data: &[u8], op: Operation) -> WriteResult;

    /// reset the device contents to `fill`
    fn clear(&mut self, fill: u8);
}

/// number of cells covered by `[min_offset, max_offset]`
pub(crate) fn span(min_offset: u64, max_offset: u64) -> Result<usize, Error> {
    let invalid = Error::InvalidRange {
        min: min_offset,
        max: max_offset,
    };

    max_offset
        .checked_sub(min_offset)
        .and_then(|span| usize::try_from(span).ok())
        .and_then(|span| span.checked_add(1))
        .ok_or(invalid)
}

/// wrapped index of byte `i` of an access at `address` into a device
/// holding `len` cells from `min_offset`
pub(crate) fn wrapped_index(address: u64, i: usize, min_offset: u64, len: usize) -> usize {
    ((address - min_offset + i as u64) % len as u64) as usize
}
