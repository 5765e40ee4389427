//! Engine error types.

use std::time::Duration;

use thiserror::Error;

use sreel_chain::ChainError;
use sreel_provider::ProviderError;

use crate::media::MediaError;

pub type EngineResult<T> = Result<T, EngineError>;

/// Terminal outcome causes for a generation attempt.
///
/// Nothing here is retried automatically; retry is always a fresh
/// user-triggered attempt that appends a new clip record.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("no input image selected")]
    NoInputImage,

    #[error("submission failed: {0}")]
    Submission(#[source] ProviderError),

    #[error("protocol error: {0}")]
    Protocol(#[source] ProviderError),

    #[error("provider reported generation failure")]
    ProviderFailed,

    #[error("generation timed out after {0:?}")]
    TimedOut(Duration),

    #[error("generation cancelled")]
    Cancelled,

    #[error("video download failed: {0}")]
    Download(#[source] MediaError),

    #[error(transparent)]
    Chain(#[from] ChainError),
}

impl EngineError {
    /// User-initiated cancellation is terminal but not surfaced as a
    /// failure to the user.
    pub fn is_cancellation(&self) -> bool {
        matches!(self, EngineError::Cancelled)
    }
}
