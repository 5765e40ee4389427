//! Provider client error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("provider rejected submission ({status}): {body}")]
    SubmissionRejected { status: u16, body: String },

    #[error("unexpected provider response: {0}")]
    Protocol(String),

    #[error("token minting failed: {0}")]
    TokenMint(String),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),
}
