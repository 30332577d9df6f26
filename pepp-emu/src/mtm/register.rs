//! register bank shared by the test machines

use byteorder::{BigEndian, ByteOrder};

use pepp_state::{DenseMemory, DevicePod, Error};
use pepp_trace::DeviceId;

/// big-endian 16-bit registers, laid out back to back in the bank
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Register {
    Pc,
    A,
}

impl Register {
    pub const COUNT: u64 = 2;
    pub const WIDTH: usize = 2;

    pub fn offset(&self) -> u64 {
        match self {
            Self::Pc => 0,
            Self::A => 2,
        }
    }
}

pub(crate) fn bank(parent: &DevicePod, device_id: DeviceId) -> Result<DenseMemory, Error> {
    DenseMemory::new(
        parent.child("regbank", device_id, "memory"),
        0,
        Register::COUNT * Register::WIDTH as u64 - 1,
        0,
    )
}

/// side-effect free view of a register; zero if the bank no longer holds it
pub(crate) fn peek(bank: &DenseMemory, register: Register) -> u16 {
    let offset = register.offset() as usize;
    bank.storage().get(offset..).map_or(0, decode)
}

pub(crate) fn encode(value: u16) -> [u8; Register::WIDTH] {
    let mut bytes = [0u8; Register::WIDTH];
    BigEndian::write_u16(&mut bytes, value);
    bytes
}

/// zero when fewer than two bytes are available
pub(crate) fn decode(bytes: &[u8]) -> u16 {
    bytes.get(..Register::WIDTH).map_or(0, BigEndian::read_u16)
}
