pub mod bus;
pub use bus::{SharedBus, SimpleBus};

pub mod channel;
pub use channel::{Channel, ChannelReader, Endpoint, Event, EventId, PublisherId};

pub mod dense;
pub use dense::DenseMemory;

pub mod device;
pub use device::{Device, DevicePod, IdGenerator, SharedTarget, SystemTarget, Traceable};

pub mod error;
pub use error::Error;

pub mod interposer;
pub use interposer::{AddressBreakpoints, InterposeResult, Interposer, SharedInterposer};

pub mod mmi;
pub use mmi::Mmi;

pub mod mmo;
pub use mmo::Mmo;

pub mod target;
pub use target::*;

pub use pepp_trace::{DeviceId, SharedTraceBuffer};
