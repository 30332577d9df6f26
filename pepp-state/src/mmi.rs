//! memory-mapped input
//!
//! each offset is backed by its own [`Channel`]. the harness queues input
//! ahead of time through a write endpoint; effectful reads consume it one
//! value per byte through a read endpoint. a multi-byte read either
//! consumes every byte it touches or none of them.
use pepp_trace::{SharedTraceBuffer, Trace, TracePayload};

use crate::channel::{Channel, Endpoint};
use crate::device::{Device, DevicePod, Traceable};
use crate::interposer::{gate_read, gate_write, SharedInterposer};
use crate::target::{span, wrapped_index, AccessStatus, Operation, ReadResult, Target, WriteResult};
use crate::Error;

struct Port {
    channel: Channel,
    read: Endpoint,
    write: Endpoint,
    last: u8,
}

impl Port {
    fn new(default_value: u8) -> Self {
        let mut channel = Channel::new(default_value);
        let read = channel.endpoint();
        let write = channel.endpoint();
        Self {
            channel,
            read,
            write,
            last: default_value,
        }
    }

    fn advance(&mut self) -> Option<u8> {
        let value = self.read.next(&self.channel)?.value();
        self.last = value;
        Some(value)
    }

    fn retreat(&mut self) -> bool {
        if self.read.unread(&self.channel).is_none() {
            return false;
        }
        self.last = self.read.current_value(&self.channel);
        true
    }
}

pub struct Mmi {
    pod: DevicePod,
    min_offset: u64,
    max_offset: u64,
    default_value: u8,
    ports: Vec<Port>,
    trace_buffer: Option<SharedTraceBuffer>,
    interposer: Option<SharedInterposer>,
}

impl Mmi {
    pub fn new(
        pod: DevicePod,
        min_offset: u64,
        max_offset: u64,
        default_value: u8,
    ) -> Result<Self, Error> {
        let mut mmi = Self {
            pod,
            min_offset,
            max_offset,
            default_value,
            ports: Vec::new(),
            trace_buffer: None,
            interposer: None,
        };
        mmi.resize(max_offset, Some(min_offset))?;

        log::debug!(
            "{}: mmi [{:#x}, {:#x}]",
            mmi.pod.full_name,
            mmi.min_offset,
            mmi.max_offset
        );
        Ok(mmi)
    }

    /// rebuild every channel; queued input is lost
    pub fn resize(&mut self, max_offset: u64, min_offset: Option<u64>) -> Result<(), Error> {
        let min_offset = min_offset.unwrap_or(self.min_offset);
        let size = span(min_offset, max_offset)?;

        self.min_offset = min_offset;
        self.max_offset = max_offset;
        self.ports = (0..size).map(|_| Port::new(self.default_value)).collect();
        Ok(())
    }

    pub fn set_interposer(&mut self, interposer: Option<SharedInterposer>) {
        self.interposer = interposer;
    }

    fn port_mut(&mut self, address: u64) -> Option<&mut Port> {
        if !self.contains(address) {
            return None;
        }
        let index = wrapped_index(address, 0, self.min_offset, self.ports.len());
        self.ports.get_mut(index)
    }

    /// queue one input value at `address`; `false` if out of bounds
    pub fn push(&mut self, address: u64, value: u8) -> bool {
        self.push_all(address, &[value])
    }

    /// queue several input values at `address`, first value read first
    pub fn push_all(&mut self, address: u64, values: &[u8]) -> bool {
        let Some(port) = self.port_mut(address) else {
            return false;
        };

        for value in values {
            port.write.append(&mut port.channel, *value);
        }
        true
    }

    /// number of queued values at `address` not yet consumed
    pub fn remaining(&self, address: u64) -> usize {
        if !self.contains(address) {
            return 0;
        }
        let port = &self.ports[wrapped_index(address, 0, self.min_offset, self.ports.len())];
        let mut cursor = port.read.clone();
        std::iter::from_fn(|| cursor.next(&port.channel).map(|_| ())).count()
    }

    fn step(&mut self, index: usize, forward: bool) -> bool {
        let Some(port) = self.ports.get_mut(index) else {
            return false;
        };

        if forward {
            port.advance().is_some()
        } else {
            port.retreat()
        }
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        if trace.device != self.device_id() {
            return false;
        }

        match trace.payload {
            TracePayload::MmiRead { index, .. } => self.step(index, forward),
            _ => false,
        }
    }
}

impl Target for Mmi {
    fn min_offset(&self) -> u64 {
        self.min_offset
    }

    fn max_offset(&self) -> u64 {
        self.max_offset
    }

    fn read(&mut self, address: u64, count: usize, op: Operation) -> ReadResult {
        if !self.contains(address) {
            return ReadResult::failed(AccessStatus::out_of_bounds());
        }

        let len = self.ports.len();
        let indices = (0..count)
            .map(|i| wrapped_index(address, i, self.min_offset, len))
            .collect::<Vec<_>>();

        if op.is_speculative() {
            let data = indices.iter().map(|index| self.ports[*index].last).collect();
            return ReadResult::completed(AccessStatus::success(), data);
        }

        let device = self.device_id();
        let mut data = Vec::with_capacity(count);
        let mut traces = Vec::with_capacity(count);

        for index in indices {
            let port = &mut self.ports[index];
            let time = port.read.current_time(&port.channel);

            match port.advance() {
                Some(value) => {
                    data.push(value);
                    traces.push(Trace::mmi_read(device, index, time));
                }
                None => {
                    log::trace!("{}: input exhausted at index {}", self.pod.full_name, index);
                    for trace in traces.iter().rev() {
                        self.undo(trace);
                    }
                    return ReadResult::failed(AccessStatus::needs_mmi());
                }
            }
        }

        let mut status = AccessStatus::success();

        if let Some(trace_buffer) = self.trace_buffer.clone() {
            let mut trace_buffer = trace_buffer.lock();
            let pushed = trace_buffer.push_all(traces.iter().cloned());

            if !pushed.success {
                drop(trace_buffer);
                for trace in traces.iter().rev() {
                    self.undo(trace);
                }
                return ReadResult::failed(AccessStatus::full_trace_buffer());
            }

            trace_buffer.stage();
            status = status.with_sync(pushed.overflow);
        }

        let status = gate_read(self.interposer.as_ref(), address, count, op, status);
        ReadResult::completed(status, data)
    }

    /// writes to an input device are accepted and ignored
    fn write(&mut self, address: u64, data: &[u8], op: Operation) -> WriteResult {
        if !self.contains(address) {
            return AccessStatus::out_of_bounds();
        }
        gate_write(self.interposer.as_ref(), address, data, op, AccessStatus::success())
    }

    fn clear(&mut self, fill: u8) {
        self.default_value = fill;
        for port in self.ports.iter_mut() {
            port.channel.clear(fill);
            port.read.set_to_head(&port.channel);
            port.write.set_to_head(&port.channel);
            port.last = fill;
        }
    }
}

impl Device for Mmi {
    fn pod(&self) -> &DevicePod {
        &self.pod
    }
}

impl Traceable for Mmi {
    fn set_trace_buffer(&mut self, trace_buffer: SharedTraceBuffer) {
        self.trace_buffer = Some(trace_buffer);
    }

    fn redo(&mut self, trace: &Trace) -> bool {
        self.replay(trace, true)
    }

    fn undo(&mut self, trace: &Trace) -> bool {
        self.replay(trace, false)
    }
}
