//! Stateless simulation of the generation provider.
//!
//! Job completion time is encoded inside the job identifier itself, so the
//! server side keeps no memory: status is purely a function of the id and
//! the clock, and requests may land on any server instance.
//!
//! This crate provides:
//! - The pure job-identity codec
//! - An in-process [`SimTransport`] for credential-less runs and tests
//! - An Axum server exposing the provider wire API

pub mod error;
pub mod idcodec;
pub mod server;
pub mod transport;

pub use error::{SimError, SimResult};
pub use idcodec::{decode_job_id, encode_job_id, status_at, SAMPLE_VIDEO_URL};
pub use server::{create_router, SimConfig, SimState};
pub use transport::{SimTransport, DEFAULT_GENERATION_DELAY};
