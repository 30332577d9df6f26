//! device identity and capabilities

use std::sync::Arc;

use parking_lot::Mutex;

use pepp_trace::{DeviceId, SharedTraceBuffer, Trace};

use crate::target::Target;

/// immutable identity of a device
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct DevicePod {
    pub base_name: String,
    pub full_name: String,
    pub device_id: DeviceId,
    pub compatible: String,
}

impl DevicePod {
    pub fn new(
        base_name: impl Into<String>,
        full_name: impl Into<String>,
        device_id: DeviceId,
        compatible: impl Into<String>,
    ) -> Self {
        Self {
            base_name: base_name.into(),
            full_name: full_name.into(),
            device_id,
            compatible: compatible.into(),
        }
    }

    /// identity of a sub-device named `{name}.{suffix}`
    pub fn child(&self, suffix: &str, device_id: DeviceId, compatible: impl Into<String>) -> Self {
        Self::new(
            format!("{}.{}", self.base_name, suffix),
            format!("{}.{}", self.full_name, suffix),
            device_id,
            compatible,
        )
    }
}

pub trait Device {
    fn pod(&self) -> &DevicePod;

    fn base_name(&self) -> &str {
        &self.pod().base_name
    }

    fn full_name(&self) -> &str {
        &self.pod().full_name
    }

    fn device_id(&self) -> DeviceId {
        self.pod().device_id
    }

    fn compatible(&self) -> &str {
        &self.pod().compatible
    }
}

/// a device whose mutations are recorded in a trace buffer
///
/// `redo` and `undo` return `false` for traces that belong to another
/// device or carry a payload this device does not produce. replaying
/// traces out of order is not detected; callers undo newest first.
pub trait Traceable {
    fn set_trace_buffer(&mut self, trace_buffer: SharedTraceBuffer);
    fn redo(&mut self, trace: &Trace) -> bool;
    fn undo(&mut self, trace: &Trace) -> bool;
}

/// a target that can be placed in a system
pub trait SystemTarget: Target + Device + Traceable + Send {}

impl<T> SystemTarget for T where T: Target + Device + Traceable + Send {}

pub type SharedTarget = Arc<Mutex<dyn SystemTarget>>;

/// hands out device ids for one system
#[derive(Debug, Clone, Default)]
pub struct IdGenerator {
    next: DeviceId,
}

impl IdGenerator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn starting_at(next: DeviceId) -> Self {
        Self { next }
    }

    pub fn next_id(&mut self) -> DeviceId {
        let id = self.next;
        self.next += 1;
        id
    }

    /// the id the next call to `next_id` will return
    pub fn peek(&self) -> DeviceId {
        self.next
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn ids_are_monotonic() {
        let mut ids = IdGenerator::starting_at(3);
        assert_eq!(ids.next_id(), 3);
        assert_eq!(ids.next_id(), 4);
        assert_eq!(ids.peek(), 5);
    }

    #[test]
    fn child_names() {
        let pod = DevicePod::new("cpu", "/cluster0/cpu", 1, "mtm");
        let child = pod.child("regbank", 2, "memory");
        assert_eq!(child.base_name, "cpu.regbank");
        assert_eq!(child.full_name, "/cluster0/cpu.regbank");
        assert_eq!(child.device_id, 2);
    }
}
