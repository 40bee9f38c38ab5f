use thiserror::Error;
use ulid::Ulid;

use crate::validate::ValidationError;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error(transparent)]
    Invalid(#[from] ValidationError),
    #[error("scheduling not allowed: the room is already booked in this period")]
    Overlap,
    #[error("schedule not found: {0}")]
    NotFound(Ulid),
    #[error("WAL error: {0}")]
    WalError(String),
}

impl EngineError {
    /// Short label for metrics.
    pub fn reason(&self) -> &'static str {
        match self {
            EngineError::Invalid(e) => e.kind(),
            EngineError::Overlap => "overlap",
            EngineError::NotFound(_) => "not_found",
            EngineError::WalError(_) => "wal",
        }
    }

    /// Client input or business-rule violation, as opposed to a storage failure.
    pub fn is_domain(&self) -> bool {
        !matches!(self, EngineError::WalError(_))
    }
}
