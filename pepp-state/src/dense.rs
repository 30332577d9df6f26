//! dense memory
//!
//! flat byte storage covering `[min_offset, max_offset]`. accesses that
//! run past the maximum offset wrap to the minimum offset, so a small
//! window can alias a larger address range.
use pepp_trace::{SharedTraceBuffer, Trace, TracePayload};

use crate::device::{Device, DevicePod, Traceable};
use crate::interposer::{gate_read, gate_write, SharedInterposer};
use crate::target::{span, wrapped_index, AccessStatus, Operation, ReadResult, Target, WriteResult};
use crate::Error;

pub struct DenseMemory {
    pod: DevicePod,
    min_offset: u64,
    max_offset: u64,
    default_value: u8,
    backing: Vec<u8>,
    trace_buffer: Option<SharedTraceBuffer>,
    interposer: Option<SharedInterposer>,
}

impl DenseMemory {
    pub fn new(
        pod: DevicePod,
        min_offset: u64,
        max_offset: u64,
        default_value: u8,
    ) -> Result<Self, Error> {
        let size = span(min_offset, max_offset)?;

        log::debug!(
            "{}: dense memory [{:#x}, {:#x}] ({} bytes)",
            pod.full_name,
            min_offset,
            max_offset,
            size
        );

        Ok(Self {
            pod,
            min_offset,
            max_offset,
            default_value,
            backing: vec![default_value; size],
            trace_buffer: None,
            interposer: None,
        })
    }

    /// reallocate storage, filled with the default value
    pub fn resize(&mut self, max_offset: u64, min_offset: Option<u64>) -> Result<(), Error> {
        let min_offset = min_offset.unwrap_or(self.min_offset);
        let size = span(min_offset, max_offset)?;

        self.min_offset = min_offset;
        self.max_offset = max_offset;
        self.backing = vec![self.default_value; size];
        Ok(())
    }

    pub fn default_value(&self) -> u8 {
        self.default_value
    }

    pub fn set_interposer(&mut self, interposer: Option<SharedInterposer>) {
        self.interposer = interposer;
    }

    pub fn trace_buffer(&self) -> Option<&SharedTraceBuffer> {
        self.trace_buffer.as_ref()
    }

    pub fn storage(&self) -> &[u8] {
        &self.backing
    }

    /// copy storage from the minimum offset into `buffer`, returning the
    /// number of bytes copied
    pub fn dump(&self, buffer: &mut [u8]) -> usize {
        let size = buffer.len().min(self.backing.len());
        buffer[..size].copy_from_slice(&self.backing[..size]);
        size
    }

    fn peek(&self, address: u64, count: usize) -> Vec<u8> {
        let len = self.backing.len();
        (0..count)
            .map(|i| self.backing[wrapped_index(address, i, self.min_offset, len)])
            .collect()
    }

    fn poke(&mut self, address: u64, data: &[u8]) {
        let len = self.backing.len();
        for (i, value) in data.iter().enumerate() {
            self.backing[wrapped_index(address, i, self.min_offset, len)] = *value;
        }
    }

    fn replay(&mut self, trace: &Trace, forward: bool) -> bool {
        if trace.device != self.device_id() {
            return false;
        }

        match &trace.payload {
            TracePayload::Memory { address, old, new } if self.contains(*address) => {
                self.poke(*address, if forward { new } else { old });
                true
            }
            _ => false,
        }
    }
}

impl Target for DenseMemory {
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

        let data = self.peek(address, count);
        let interposer = self.interposer.as_ref();
        let status = gate_read(interposer, address, count, op, AccessStatus::success());
        ReadResult::completed(status, data)
    }

    fn write(&mut self, address: u64, data: &[u8], op: Operation) -> WriteResult {
        if !self.contains(address) {
            return AccessStatus::out_of_bounds();
        }

        let mut status = AccessStatus::success();

        // the delta is recorded before storage changes so the two never diverge
        if let (Some(trace_buffer), false) = (self.trace_buffer.as_ref(), data.is_empty()) {
            let old = self.peek(address, data.len());
            let mut trace_buffer = trace_buffer.lock();

            let pushed = trace_buffer.push(Trace::memory(self.device_id(), address, &old, data));
            if !pushed.success {
                log::trace!(
                    "{}: write at {:#x} refused by trace buffer",
                    self.pod.full_name,
                    address
                );
                return AccessStatus::full_trace_buffer();
            }

            trace_buffer.stage();
            status = status.with_sync(pushed.overflow);
        }

        self.poke(address, data);
        gate_write(self.interposer.as_ref(), address, data, op, status)
    }

    fn clear(&mut self, fill: u8) {
        self.default_value = fill;
        self.backing.fill(fill);
    }
}

impl Device for DenseMemory {
    fn pod(&self) -> &DevicePod {
        &self.pod
    }
}

impl Traceable for DenseMemory {
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
