//! system assembly
//!
//! a system owns every device built from a description, keyed by full
//! path (`{path}/{name}`), and the trace buffer they all share. tracking
//! stays opt-in: devices are wired to the buffer, but only ids enabled
//! with `trace_device` are recorded.

use ahash::AHashMap;

use pepp_state::{Device, IdGenerator, SharedBus, SharedTarget, SimpleBus, Traceable};
use pepp_trace::{DeviceId, SharedTraceBuffer, TraceBuffer};

use crate::sim::SharedClocked;
use crate::Error;

pub mod node;
pub use node::{NodeDescriptor, RegionDescriptor, Storage};

pub mod registry;
pub use registry::{registrations, Registration};

#[derive(Clone)]
pub enum SystemDevice {
    Target(SharedTarget),
    /// the same bus twice: concrete, to map regions, and as a target
    Bus(SharedBus, SharedTarget),
    Clocked(SharedClocked),
}

impl SystemDevice {
    pub fn bus(bus: SimpleBus) -> Self {
        let bus = bus.shared();
        let target: SharedTarget = bus.clone();
        Self::Bus(bus, target)
    }

    pub fn device_id(&self) -> DeviceId {
        match self {
            Self::Target(target) | Self::Bus(_, target) => target.lock().device_id(),
            Self::Clocked(clocked) => clocked.lock().device_id(),
        }
    }

    pub fn full_name(&self) -> String {
        match self {
            Self::Target(target) | Self::Bus(_, target) => target.lock().full_name().to_string(),
            Self::Clocked(clocked) => clocked.lock().full_name().to_string(),
        }
    }

    pub fn as_target(&self) -> Option<&SharedTarget> {
        match self {
            Self::Target(target) | Self::Bus(_, target) => Some(target),
            Self::Clocked(_) => None,
        }
    }

    pub fn as_bus(&self) -> Option<&SharedBus> {
        match self {
            Self::Bus(bus, _) => Some(bus),
            Self::Target(_) | Self::Clocked(_) => None,
        }
    }

    pub fn as_clocked(&self) -> Option<&SharedClocked> {
        match self {
            Self::Clocked(clocked) => Some(clocked),
            Self::Target(_) | Self::Bus(..) => None,
        }
    }

    fn set_trace_buffer(&self, trace_buffer: SharedTraceBuffer) {
        match self {
            Self::Target(target) | Self::Bus(_, target) => {
                target.lock().set_trace_buffer(trace_buffer)
            }
            Self::Clocked(clocked) => clocked.lock().set_trace_buffer(trace_buffer),
        }
    }
}

pub struct System {
    devices: AHashMap<String, SystemDevice>,
    order: Vec<String>,
    ids: IdGenerator,
    trace_buffer: SharedTraceBuffer,
}

impl Default for System {
    fn default() -> Self {
        Self::new()
    }
}

impl System {
    pub fn new() -> Self {
        Self::with_trace_buffer(pepp_trace::shared(TraceBuffer::new()))
    }

    pub fn with_trace_buffer(trace_buffer: SharedTraceBuffer) -> Self {
        Self {
            devices: AHashMap::new(),
            order: Vec::new(),
            ids: IdGenerator::new(),
            trace_buffer,
        }
    }

    /// build a system from parsed nodes, rooted at `path`
    pub fn from_nodes(nodes: &[NodeDescriptor], path: &str) -> Result<Self, Error> {
        let mut system = Self::new();
        system.load(nodes, path)?;
        Ok(system)
    }

    /// build a system from a yaml sequence of nodes, rooted at `path`
    pub fn from_yaml(yaml: &str, path: &str) -> Result<Self, Error> {
        let nodes = NodeDescriptor::from_yaml(yaml)?;
        Self::from_nodes(&nodes, path)
    }

    /// construct every node, then link them
    pub fn load(&mut self, nodes: &[NodeDescriptor], path: &str) -> Result<(), Error> {
        let mut linked = Vec::with_capacity(nodes.len());

        for node in nodes {
            let registration = registry::find(node).ok_or_else(|| Error::Unregistered {
                name: node.name.clone(),
                compatible: node.compatible.clone(),
            })?;

            let full_name = format!("{}/{}", path, node.name);
            let device = (registration.construct)(node, &full_name, &mut self.ids)?;
            self.add_device(full_name.clone(), device)?;
            linked.push((registration, node, full_name));
        }

        for (registration, node, full_name) in linked {
            if let Some(link) = registration.link {
                link(node, &full_name, self)?;
            }
        }

        Ok(())
    }

    /// insert a device and wire it to the system trace buffer
    pub fn add_device(
        &mut self,
        full_name: impl Into<String>,
        device: SystemDevice,
    ) -> Result<(), Error> {
        let full_name = full_name.into();
        if self.devices.contains_key(&full_name) {
            return Err(Error::DuplicateDevice(full_name));
        }

        device.set_trace_buffer(self.trace_buffer.clone());
        log::debug!("added device {} (id {})", full_name, device.device_id());

        self.order.push(full_name.clone());
        self.devices.insert(full_name, device);
        Ok(())
    }

    pub fn get_device(&self, full_name: &str) -> Option<&SystemDevice> {
        self.devices.get(full_name)
    }

    pub fn get_target(&self, full_name: &str) -> Result<SharedTarget, Error> {
        match self.devices.get(full_name) {
            Some(SystemDevice::Target(target) | SystemDevice::Bus(_, target)) => Ok(target.clone()),
            Some(SystemDevice::Clocked(_)) => Err(Error::NotATarget(full_name.to_string())),
            None => Err(Error::UnknownDevice(full_name.to_string())),
        }
    }

    pub fn get_bus(&self, full_name: &str) -> Result<SharedBus, Error> {
        match self.devices.get(full_name) {
            Some(SystemDevice::Bus(bus, _)) => Ok(bus.clone()),
            Some(_) => Err(Error::NotABus(full_name.to_string())),
            None => Err(Error::UnknownDevice(full_name.to_string())),
        }
    }

    pub fn get_clocked(&self, full_name: &str) -> Result<SharedClocked, Error> {
        match self.devices.get(full_name) {
            Some(SystemDevice::Clocked(clocked)) => Ok(clocked.clone()),
            Some(_) => Err(Error::NotClocked(full_name.to_string())),
            None => Err(Error::UnknownDevice(full_name.to_string())),
        }
    }

    /// devices in insertion order
    pub fn devices(&self) -> impl Iterator<Item = (&str, &SystemDevice)> + '_ {
        self.order
            .iter()
            .filter_map(|name| self.devices.get(name).map(|device| (name.as_str(), device)))
    }

    pub fn trace_buffer(&self) -> &SharedTraceBuffer {
        &self.trace_buffer
    }

    pub fn ids(&self) -> &IdGenerator {
        &self.ids
    }

    pub fn ids_mut(&mut self) -> &mut IdGenerator {
        &mut self.ids
    }

    /// enable tracking for every id handed out so far, sub-devices included
    pub fn trace_all(&self) {
        let mut trace_buffer = self.trace_buffer.lock();
        for id in 0..self.ids.peek() {
            trace_buffer.trace_device(id, true);
        }
    }
}
