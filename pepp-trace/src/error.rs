//! trace buffer errors

use thiserror::Error;

use crate::Tick;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Error {
    #[error("{count} pending trace(s) cannot persist into tick {tick}")]
    PendingAcrossTick { tick: Tick, count: usize },
}
