//! Client for the video generation provider.
//!
//! This crate provides:
//! - The [`JobTransport`] seam: one submission call and one status check,
//!   stateless between calls
//! - An HTTP implementation against the provider REST API
//! - Per-call bearer-token minting
//!
//! Pacing, timeout, and cancellation policy live in the engine crate.

pub mod config;
pub mod error;
pub mod token;
pub mod transport;

pub use config::ProviderConfig;
pub use error::{ProviderError, ProviderResult};
pub use token::{KeyPairMinter, NoAuth, StaticToken, TokenMinter};
pub use transport::{HttpTransport, JobTransport};
