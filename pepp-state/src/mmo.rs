//! memory-mapped output
//!
//! every byte written is appended to the channel behind its offset, so the
//! full output history stays available through [`Mmo::bytes`]. reads only
//! peek at the last value written.
use pepp_trace::{SharedTraceBuffer, Trace, TracePayload};

use crate::channel::{Channel, ChannelReader, Endpoint};
use crate::device::{Device, DevicePod, Traceable};
use crate::interposer::{gate_read, gate_write, SharedInterposer};
use crate::target::{span, wrapped_index, AccessStatus, Operation, ReadResult, Target, WriteResult};
use crate::Error;

struct Port {
    channel: Channel,
    write: Endpoint,
    last: u8,
}

impl Port {
    fn new(default_value: u8) -> Self {
        let mut channel = Channel::new(default_value);
        let write = channel.endpoint();
        Self {
            channel,
            write,
            last: default_value,
        }
    }

    fn append(&mut self, value: u8) {
        self.last = self.write.append(&mut self.channel, value).value();
    }

    fn retract(&mut self) -> bool {
        if self.write.unwrite(&mut self.channel).is_none() {
            return false;
        }
        self.last = self.write.current_value(&self.channel);
        true
    }
}

pub struct Mmo {
    pod: DevicePod,
    min_offset: u64,
    max_offset: u64,
    default_value: u8,
    ports: Vec<Port>,
    trace_buffer: Option<SharedTraceBuffer>,
    interposer: Option<SharedInterposer>,
}

impl Mmo {
    pub fn new(
        pod: DevicePod,
        min_offset: u64,
        max_offset: u64,
        default_value: u8,
    ) -> Result<Self, Error> {
        let mut mmo = Self {
            pod,
            min_offset,
            max_offset,
            default_value,
            ports: Vec::new(),
            trace_buffer: None,
            interposer: None,
        };
        mmo.resize(max_offset, Some(min_offset))?;

        log::debug!(
            "{}: mmo [{:#x}, {:#x}]",
            mmo.pod.full_name,
            mmo.min_offset,
            mmo.max_offset
        );
        Ok(mmo)
    }

    /// rebuild every channel; output history is lost
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

    /// every value written at `address`, oldest first
    ///
    /// the reader is single-pass; call again to restart from the beginning.
    /// `None` if `address` is out of bounds.
    pub fn bytes(&self, address: u64) -> Option<ChannelReader<'_>> {
        if !self.contains(address) {
            return None;
        }
        let port = &self.ports[wrapped_index(address, 0, self.min_offset, self.ports.len())];
        Some(port.channel.reader())
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        if trace.device != self.device_id() {
            return false;
        }

        match trace.payload {
            TracePayload::MmoWrite { index, value, .. } => match self.ports.get_mut(index) {
                Some(port) if forward => {
                    port.append(value);
                    true
                }
                Some(port) => port.retract(),
                None => false,
            },
            _ => false,
        }
    }
}

impl Target for Mmo {
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
        let data = (0..count)
            .map(|i| self.ports[wrapped_index(address, i, self.min_offset, len)].last)
            .collect();

        let interposer = self.interposer.as_ref();
        let status = gate_read(interposer, address, count, op, AccessStatus::success());
        ReadResult::completed(status, data)
    }

    fn write(&mut self, address: u64, data: &[u8], op: Operation) -> WriteResult {
        if !self.contains(address) {
            return AccessStatus::out_of_bounds();
        }

        let device = self.device_id();
        let len = self.ports.len();
        let mut traces = Vec::with_capacity(data.len());

        for (i, value) in data.iter().enumerate() {
            let index = wrapped_index(address, i, self.min_offset, len);
            let port = &mut self.ports[index];
            let time = port.write.current_time(&port.channel);

            traces.push(Trace::mmo_write(device, index, time, *value));
            port.append(*value);
        }

        let mut status = AccessStatus::success();

        if let (Some(trace_buffer), false) = (self.trace_buffer.clone(), traces.is_empty()) {
            let mut trace_buffer = trace_buffer.lock();
            let pushed = trace_buffer.push_all(traces.iter().cloned());

            if !pushed.success {
                drop(trace_buffer);
                log::trace!(
                    "{}: write at {:#x} refused by trace buffer",
                    self.pod.full_name,
                    address
                );
                for trace in traces.iter().rev() {
                    self.undo(trace);
                }
                return AccessStatus::full_trace_buffer();
            }

            trace_buffer.stage();
            status = status.with_sync(pushed.overflow);
        }

        gate_write(self.interposer.as_ref(), address, data, op, status)
    }

    fn clear(&mut self, fill: u8) {
        self.default_value = fill;
        for port in self.ports.iter_mut() {
            port.channel.clear(fill);
            port.write.set_to_head(&port.channel);
            port.last = fill;
        }
    }
}

impl Device for Mmo {
    fn pod(&self) -> &DevicePod {
        &self.pod
    }
}

impl Traceable for Mmo {
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
