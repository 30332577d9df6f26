//! emulator errors
//!
//! only configuration problems surface as `Err`; everything that can go
//! wrong while ticking is reported through a `TickResult`.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("clock error: {0}")]
    Clock(String),
    #[error(transparent)]
    State(#[from] pepp_state::Error),
    #[error(transparent)]
    Trace(#[from] pepp_trace::Error),
    #[error("device `{0}` does not exist")]
    UnknownDevice(String),
    #[error("device `{0}` already exists")]
    DuplicateDevice(String),
    #[error("device `{0}` is not a target")]
    NotATarget(String),
    #[error("device `{0}` is not a bus")]
    NotABus(String),
    #[error("device `{0}` is not clocked")]
    NotClocked(String),
    #[error("no registration matches node `{name}` (compatible `{compatible}`)")]
    Unregistered { name: String, compatible: String },
    #[error("failed to parse system description: {0}")]
    Parse(#[from] serde_yaml::Error),
}
