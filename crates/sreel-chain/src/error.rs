//! Chain store error types.

use sreel_models::ClipId;
use thiserror::Error;

pub type ChainResult<T> = Result<T, ChainError>;

#[derive(Debug, Error)]
pub enum ChainError {
    #[error("a generation is already in flight for this chain")]
    AlreadyInFlight,

    #[error("no clip record with id {0}")]
    NotFound(ClipId),
}
