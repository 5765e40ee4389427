//! Shared data models for the StoryReel engine.
//!
//! This crate provides Serde-serializable types for:
//! - Clip records and the chain statuses they move through
//! - External generation jobs and their phases
//! - Opaque image/video references
//! - The provider wire schemas

pub mod clip;
pub mod job;
pub mod media;
pub mod wire;

// Re-export common types
pub use clip::{ClipId, ClipPatch, ClipRecord, ClipStatus};
pub use job::{JobId, JobPhase, JobStatus};
pub use media::{ImageRef, VideoRef};
pub use wire::{StatusResponse, SubmitRequest, SubmitResponse};
