//! simulation module
//!
//! the per-device tick contract: clocks, tick results and the traits a
//! clocked device implements

pub mod traits;
pub mod types;

pub use traits::*;
pub use types::*;
