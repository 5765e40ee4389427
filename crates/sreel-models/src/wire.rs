//! Provider wire schemas.
//!
//! These shapes are stable regardless of provider and are shared by the HTTP
//! transport and the simulation server: submission carries an encoded image
//! and a prompt; the response carries a job id; status responses carry a
//! phase string and, once finished, a video URL.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Generation submission request.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema, Validate)]
pub struct SubmitRequest {
    /// Base64-encoded seed image, or a remote reference the provider accepts
    #[validate(length(min = 1))]
    pub image: String,

    /// Scene description driving the generation
    #[validate(length(min = 1, max = 2500))]
    pub prompt: String,
}

/// Generation submission response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubmitResponse {
    pub job_id: String,
}

/// Status check response.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct StatusResponse {
    /// Provider status vocabulary, mapped by the client via
    /// [`crate::JobPhase::from_provider_status`]
    pub phase: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub video_url: Option<String>,
}
