//! address-decoding bus
//!
//! a bus owns no storage. each access is routed to the region covering the
//! address, translated into the child's own offsets and split wherever it
//! straddles two regions. bytes no region covers are unmapped. where regions
//! overlap, the one pushed last wins.
//!
//! routing is resolved for the whole access before any child is touched, so
//! an unmapped or out of bounds access has no effect. a child failing part
//! way through leaves the chunks before it applied, along with their traces.

use std::sync::Arc;

use parking_lot::Mutex;

use pepp_trace::{SharedTraceBuffer, Trace};

use crate::device::{Device, DevicePod, SharedTarget, Traceable};
use crate::target::{span, AccessStatus, Operation, ReadResult, Target, WriteResult};
use crate::Error;

pub type SharedBus = Arc<Mutex<SimpleBus>>;

struct Region {
    min_offset: u64,
    max_offset: u64,
    target: SharedTarget,
}

impl Region {
    fn contains(&self, address: u64) -> bool {
        address >= self.min_offset && address <= self.max_offset
    }
}

/// one contiguous piece of an access, bound for a single region
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Chunk {
    region: usize,
    address: u64,
    offset: usize,
    len: usize,
}

pub struct SimpleBus {
    pod: DevicePod,
    min_offset: u64,
    max_offset: u64,
    regions: Vec<Region>,
}

impl SimpleBus {
    pub fn new(pod: DevicePod, min_offset: u64, max_offset: u64) -> Result<Self, Error> {
        span(min_offset, max_offset)?;
        log::debug!("{}: bus [{:#x}, {:#x}]", pod.full_name, min_offset, max_offset);

        Ok(Self {
            pod,
            min_offset,
            max_offset,
            regions: Vec::new(),
        })
    }

    pub fn shared(self) -> SharedBus {
        Arc::new(Mutex::new(self))
    }

    /// map `[min_offset, max_offset]` of the bus onto `target`
    ///
    /// bus address `min_offset` lands on the target's own minimum offset.
    pub fn push_region(
        &mut self,
        min_offset: u64,
        max_offset: u64,
        target: SharedTarget,
    ) -> Result<(), Error> {
        span(min_offset, max_offset)?;
        if min_offset < self.min_offset || max_offset > self.max_offset {
            return Err(Error::OutsideBus {
                min: min_offset,
                max: max_offset,
            });
        }

        log::debug!(
            "{}: mapped [{:#x}, {:#x}] to {}",
            self.pod.full_name,
            min_offset,
            max_offset,
            target.lock().full_name()
        );

        self.regions.push(Region {
            min_offset,
            max_offset,
            target,
        });
        Ok(())
    }

    /// the target answering for `address`, if any
    pub fn device_at(&self, address: u64) -> Option<&SharedTarget> {
        self.region_at(address).map(|index| &self.regions[index].target)
    }

    pub fn region_count(&self) -> usize {
        self.regions.len()
    }

    fn region_at(&self, address: u64) -> Option<usize> {
        self.regions.iter().rposition(|region| region.contains(address))
    }

    fn route(&self, address: u64, count: usize) -> Result<Vec<Chunk>, AccessStatus> {
        let last = match count.checked_sub(1) {
            Some(extra) => address.checked_add(extra as u64),
            None => Some(address),
        };
        match last {
            Some(last) if self.contains(address) && last <= self.max_offset => {}
            _ => return Err(AccessStatus::out_of_bounds()),
        }

        let mut chunks = Vec::new();
        let mut offset = 0;

        while offset < count {
            let bus_address = address + offset as u64;
            let Some(index) = self.region_at(bus_address) else {
                log::trace!("{}: {:#x} is unmapped", self.pod.full_name, bus_address);
                return Err(AccessStatus::unmapped());
            };

            let region = &self.regions[index];
            let (child_min, child_max) = {
                let target = region.target.lock();
                (target.min_offset(), target.max_offset())
            };

            let device_address = (bus_address - region.min_offset).saturating_add(child_min);
            let mut room = region.max_offset - bus_address;
            if device_address <= child_max {
                room = room.min(child_max - device_address);
            }
            for later in &self.regions[index + 1..] {
                if later.min_offset > bus_address && later.min_offset - bus_address <= room {
                    room = later.min_offset - bus_address - 1;
                }
            }

            let remaining = count - offset;
            let len = usize::try_from(room)
                .ok()
                .and_then(|room| room.checked_add(1))
                .map_or(remaining, |room| room.min(remaining));

            chunks.push(Chunk {
                region: index,
                address: device_address,
                offset,
                len,
            });
            offset += len;
        }

        Ok(chunks)
    }
}

/// fold a child's status into the bus's; the first error wins
fn merge(status: &mut AccessStatus, child: AccessStatus) {
    status.pause |= child.pause;
    status.sync |= child.sync;
    status.advance &= child.advance;
    if status.error.is_success() {
        status.error = child.error;
    }
}

impl Target for SimpleBus {
    fn min_offset(&self) -> u64 {
        self.min_offset
    }

    fn max_offset(&self) -> u64 {
        self.max_offset
    }

    /// unlike a leaf device, an access running past the maximum offset is
    /// out of bounds rather than wrapped
    fn read(&mut self, address: u64, count: usize, op: Operation) -> ReadResult {
        let chunks = match self.route(address, count) {
            Ok(chunks) => chunks,
            Err(status) => return ReadResult::failed(status),
        };

        let mut status = AccessStatus::success();
        let mut data = Vec::with_capacity(count);

        for chunk in chunks {
            let result = self.regions[chunk.region]
                .target
                .lock()
                .read(chunk.address, chunk.len, op);

            merge(&mut status, result.status);
            match result.data {
                Some(bytes) if result.status.completed => data.extend(bytes),
                _ => {
                    status.completed = false;
                    return ReadResult::failed(status);
                }
            }
        }

        ReadResult::completed(status, data)
    }

    fn write(&mut self, address: u64, data: &[u8], op: Operation) -> WriteResult {
        let chunks = match self.route(address, data.len()) {
            Ok(chunks) => chunks,
            Err(status) => return status,
        };

        let mut status = AccessStatus::success();

        for chunk in chunks {
            let bytes = &data[chunk.offset..chunk.offset + chunk.len];
            let result = self.regions[chunk.region]
                .target
                .lock()
                .write(chunk.address, bytes, op);

            merge(&mut status, result);
            if !result.completed {
                status.completed = false;
                return status;
            }
        }

        status
    }

    fn clear(&mut self, fill: u8) {
        for region in self.regions.iter() {
            region.target.lock().clear(fill);
        }
    }
}

impl Device for SimpleBus {
    fn pod(&self) -> &DevicePod {
        &self.pod
    }
}

/// the bus records nothing itself; traces are handed to the child that
/// produced them
impl Traceable for SimpleBus {
    fn set_trace_buffer(&mut self, trace_buffer: SharedTraceBuffer) {
        for region in self.regions.iter() {
            region.target.lock().set_trace_buffer(trace_buffer.clone());
        }
    }

    fn redo(&mut self, trace: &Trace) -> bool {
        self.regions
            .iter()
            .map(|region| region.target.lock())
            .find(|target| target.device_id() == trace.device)
            .map_or(false, |mut target| target.redo(trace))
    }

    fn undo(&mut self, trace: &Trace) -> bool {
        self.regions
            .iter()
            .map(|region| region.target.lock())
            .find(|target| target.device_id() == trace.device)
            .map_or(false, |mut target| target.undo(trace))
    }
}
