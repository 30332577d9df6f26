#[cfg(feature = "emu")]
pub use pepp_emu as emu;

pub use pepp_state as state;
pub use pepp_trace as trace;
