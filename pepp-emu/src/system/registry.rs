//! device registry
//!
//! maps a node's `compatible` string (and its storage kind or processor
//! name) to a constructor and an optional link step. linking runs after
//! every node has been constructed, so initiators can name targets that
//! appear later in the description.

use std::sync::Arc;

use parking_lot::Mutex;

use pepp_state::{DenseMemory, DevicePod, IdGenerator, Mmi, Mmo, SharedTarget, SimpleBus};

use crate::mtm::{Mtm0, Mtm1, Mtm2};
use crate::sim::{Initiator, SharedClocked};
use crate::system::{NodeDescriptor, Storage, System, SystemDevice};
use crate::Error;

/// build a device for `node`, whose full path is `path`
pub type Construct = fn(&NodeDescriptor, &str, &mut IdGenerator) -> Result<SystemDevice, Error>;

/// resolve cross-device references; `Ok(false)` if there was nothing to do
pub type Link = fn(&NodeDescriptor, &str, &System) -> Result<bool, Error>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Discriminant {
    Storage(Storage),
    Processor(&'static str),
}

#[derive(Clone, Copy)]
pub struct Registration {
    pub compatible: &'static str,
    pub discriminant: Discriminant,
    pub construct: Construct,
    pub link: Option<Link>,
}

impl Registration {
    pub fn matches(&self, node: &NodeDescriptor) -> bool {
        if node.compatible != self.compatible {
            return false;
        }
        match self.discriminant {
            Discriminant::Storage(storage) => node.storage == storage,
            Discriminant::Processor(processor) => node.processor.as_deref() == Some(processor),
        }
    }
}

/// every device a system description can name
pub fn registrations() -> &'static [Registration] {
    const REGISTRATIONS: &[Registration] = &[
        Registration {
            compatible: "memory",
            discriminant: Discriminant::Storage(Storage::Dense),
            construct: dense,
            link: None,
        },
        Registration {
            compatible: "memory",
            discriminant: Discriminant::Storage(Storage::Mmi),
            construct: mmi,
            link: None,
        },
        Registration {
            compatible: "memory",
            discriminant: Discriminant::Storage(Storage::Mmo),
            construct: mmo,
            link: None,
        },
        Registration {
            compatible: "memory",
            discriminant: Discriminant::Storage(Storage::Bus),
            construct: bus,
            link: Some(link_regions),
        },
        Registration {
            compatible: "mtm",
            discriminant: Discriminant::Processor("mcraven,mtm-v0"),
            construct: mtm0,
            link: Some(link_target),
        },
        Registration {
            compatible: "mtm",
            discriminant: Discriminant::Processor("mcraven,mtm-v1"),
            construct: mtm1,
            link: Some(link_target),
        },
        Registration {
            compatible: "mtm",
            discriminant: Discriminant::Processor("mcraven,mtm-v2"),
            construct: mtm2,
            link: Some(link_target),
        },
    ];
    REGISTRATIONS
}

pub fn find(node: &NodeDescriptor) -> Option<&'static Registration> {
    registrations().iter().find(|registration| registration.matches(node))
}

fn pod(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> DevicePod {
    DevicePod::new(&node.name, path, ids.next_id(), &node.compatible)
}

fn clock_name(node: &NodeDescriptor) -> String {
    node.clock.clone().unwrap_or_default()
}

fn dense(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device = DenseMemory::new(pod, node.min_offset, node.max_offset, node.default_value)?;
    let device: SharedTarget = Arc::new(Mutex::new(device));
    Ok(SystemDevice::Target(device))
}

fn mmi(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device = Mmi::new(pod, node.min_offset, node.max_offset, node.default_value)?;
    let device: SharedTarget = Arc::new(Mutex::new(device));
    Ok(SystemDevice::Target(device))
}

fn mmo(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device = Mmo::new(pod, node.min_offset, node.max_offset, node.default_value)?;
    let device: SharedTarget = Arc::new(Mutex::new(device));
    Ok(SystemDevice::Target(device))
}

fn bus(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let device = SimpleBus::new(pod(node, path, ids), node.min_offset, node.max_offset)?;
    Ok(SystemDevice::bus(device))
}

fn mtm0(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device: SharedClocked = Arc::new(Mutex::new(Mtm0::new(pod, clock_name(node), ids)?));
    Ok(SystemDevice::Clocked(device))
}

fn mtm1(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device: SharedClocked = Arc::new(Mutex::new(Mtm1::new(pod, clock_name(node), ids)?));
    Ok(SystemDevice::Clocked(device))
}

fn mtm2(node: &NodeDescriptor, path: &str, ids: &mut IdGenerator) -> Result<SystemDevice, Error> {
    let pod = pod(node, path, ids);
    let device: SharedClocked = Arc::new(Mutex::new(Mtm2::new(pod, clock_name(node), ids)?));
    Ok(SystemDevice::Clocked(device))
}

fn link_target(node: &NodeDescriptor, path: &str, system: &System) -> Result<bool, Error> {
    let Some(name) = node.target.as_deref() else {
        return Ok(false);
    };

    let target = system.get_target(name)?;
    system.get_clocked(path)?.lock().set_target(target);

    log::debug!("{}: linked to {}", path, name);
    Ok(true)
}

fn link_regions(node: &NodeDescriptor, path: &str, system: &System) -> Result<bool, Error> {
    if node.regions.is_empty() {
        return Ok(false);
    }

    let bus = system.get_bus(path)?;
    for region in node.regions.iter() {
        let target = system.get_target(&region.target)?;
        bus.lock().push_region(region.min_offset, region.max_offset, target)?;
    }

    log::debug!("{}: mapped {} regions", path, node.regions.len());
    Ok(true)
}
