//! trace records and the tick-grouped trace buffer
//!
//! every state mutation made by a simulated device is described by a
//! [`Trace`]. traces are pushed while a tick is in flight, staged into
//! tick groups once the tick finishes, and eventually committed to
//! registered hooks or discarded for undo.

use std::sync::Arc;

use parking_lot::Mutex;

pub mod buffer;
pub use buffer::{CommitStrategy, Group, TraceBuffer, TraceBufferConfig, TraceStatus};

pub mod error;
pub use error::Error;

pub mod hook;
pub use hook::{CommitHook, HookId, LogHook, TraceRecorder};

pub mod trace;
pub use trace::{Bytes, TickedTrace, Trace, TraceKind, TracePayload};

/// globally unique identifier of a device within one simulated system
pub type DeviceId = u32;

/// logical simulation time
pub type Tick = u64;

/// a trace buffer shared between the devices of one system
pub type SharedTraceBuffer = Arc<Mutex<TraceBuffer>>;

/// wrap a trace buffer for sharing between devices
pub fn shared(buffer: TraceBuffer) -> SharedTraceBuffer {
    Arc::new(Mutex::new(buffer))
}
