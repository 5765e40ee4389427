//! Simulation error types.

use sreel_models::JobId;
use thiserror::Error;

pub type SimResult<T> = Result<T, SimError>;

#[derive(Debug, Error)]
pub enum SimError {
    #[error("unknown job id: {0}")]
    UnknownJob(JobId),

    #[error("invalid request: {0}")]
    InvalidRequest(String),
}
