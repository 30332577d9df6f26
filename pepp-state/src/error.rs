use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("invalid offset range [{min:#x}, {max:#x}]")]
    InvalidRange { min: u64, max: u64 },
    #[error("region [{min:#x}, {max:#x}] does not fit on the bus")]
    OutsideBus { min: u64, max: u64 },
}
