use thiserror::Error;

use crate::store::StoreError;

/// Typed outcomes surfaced to the messaging boundary. Storage faults always
/// propagate; an unreachable backend must never render as "zero responses".
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("survey not found")]
    NotFound,
    #[error("user has already responded to this survey")]
    AlreadyResponded,
    #[error("survey is closed")]
    AlreadyClosed,
    #[error("only the survey creator may perform this operation")]
    Forbidden,
    #[error("storage unavailable: {0}")]
    Storage(#[from] StoreError),
}

pub type CoreResult<T> = Result<T, CoreError>;
