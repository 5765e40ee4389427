//! Axum server exposing the provider wire API.
//!
//! Stateless across instances by construction: the ready-at instant lives
//! in the job id, never in server memory.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::info;
use validator::Validate;

use sreel_models::{JobId, StatusResponse, SubmitRequest, SubmitResponse};

use crate::error::SimError;
use crate::idcodec;
use crate::transport::DEFAULT_GENERATION_DELAY;

/// Server configuration.
#[derive(Debug, Clone)]
pub struct SimConfig {
    /// Simulated generation delay
    pub generation_delay: std::time::Duration,
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            generation_delay: DEFAULT_GENERATION_DELAY,
        }
    }
}

impl SimConfig {
    /// Create config from environment variables.
    pub fn from_env() -> Self {
        Self {
            generation_delay: std::time::Duration::from_secs(
                std::env::var("SIM_GENERATION_DELAY_SECS")
                    .ok()
                    .and_then(|s| s.parse().ok())
                    .unwrap_or(DEFAULT_GENERATION_DELAY.as_secs()),
            ),
        }
    }
}

/// Shared server state.
#[derive(Clone)]
pub struct SimState {
    pub config: SimConfig,
}

/// Create the provider-wire router.
pub fn create_router(state: SimState) -> Router {
    Router::new()
        .route("/v1/generations", post(submit_job))
        .route("/v1/generations/:job_id", get(job_status))
        .route("/health", get(health))
        .layer(TraceLayer::new_for_http())
        .layer(cors_layer())
        .with_state(state)
}

fn cors_layer() -> CorsLayer {
    CorsLayer::new()
        .allow_methods(Any)
        .allow_headers(Any)
        .allow_origin(Any)
}

/// API error with status code mapping.
#[derive(Debug)]
struct ApiError {
    status: StatusCode,
    message: String,
}

impl ApiError {
    fn not_found(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: message.into(),
        }
    }

    fn unprocessable(message: impl Into<String>) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = Json(serde_json::json!({ "error": self.message }));
        (self.status, body).into_response()
    }
}

impl From<SimError> for ApiError {
    fn from(e: SimError) -> Self {
        match e {
            SimError::UnknownJob(_) => ApiError::not_found(e.to_string()),
            SimError::InvalidRequest(_) => ApiError::unprocessable(e.to_string()),
        }
    }
}

/// Accept a generation job.
async fn submit_job(
    State(state): State<SimState>,
    Json(request): Json<SubmitRequest>,
) -> Result<Json<SubmitResponse>, ApiError> {
    request
        .validate()
        .map_err(|e| SimError::InvalidRequest(e.to_string()))?;

    let ready_at = Utc::now()
        + chrono::Duration::milliseconds(state.config.generation_delay.as_millis() as i64);
    let job_id = idcodec::encode_job_id(ready_at);

    info!(job_id = %job_id, ready_at = %ready_at.to_rfc3339(), "Accepted simulated job");

    Ok(Json(SubmitResponse {
        job_id: job_id.to_string(),
    }))
}

/// Report simulated job status.
async fn job_status(Path(job_id): Path<String>) -> Result<Json<StatusResponse>, ApiError> {
    let status = idcodec::status_at(&JobId::from_string(job_id), Utc::now())?;

    Ok(Json(StatusResponse {
        phase: status.phase.as_str().to_string(),
        video_url: status.video_url,
    }))
}

/// Health check endpoint.
async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "version": env!("CARGO_PKG_VERSION"),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::idcodec::SAMPLE_VIDEO_URL;
    use axum::body::Body;
    use axum::http::Request;
    use std::time::Duration;
    use tower::ServiceExt;

    fn app(generation_delay: Duration) -> Router {
        create_router(SimState {
            config: SimConfig { generation_delay },
        })
    }

    fn submit_request(prompt: &str) -> Request<Body> {
        let body = serde_json::json!({ "image": "aGVsbG8=", "prompt": prompt });
        Request::builder()
            .method("POST")
            .uri("/v1/generations")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_submit_then_poll_completes() {
        let app = app(Duration::ZERO);

        let response = app
            .clone()
            .oneshot(submit_request("A fox in the snow"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        let job_id = body["jobId"].as_str().unwrap().to_string();
        assert!(job_id.starts_with("sim-"));

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/generations/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let body = body_json(response).await;
        assert_eq!(body["phase"], "completed");
        assert_eq!(body["videoUrl"], SAMPLE_VIDEO_URL);
    }

    #[tokio::test]
    async fn test_pending_job_reports_processing() {
        let app = app(Duration::from_secs(3600));

        let response = app.clone().oneshot(submit_request("prompt")).await.unwrap();
        let body = body_json(response).await;
        let job_id = body["jobId"].as_str().unwrap().to_string();

        let response = app
            .oneshot(
                Request::builder()
                    .uri(format!("/v1/generations/{job_id}"))
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        let body = body_json(response).await;
        assert_eq!(body["phase"], "processing");
        assert!(body.get("videoUrl").is_none());
    }

    #[tokio::test]
    async fn test_unknown_job_is_404() {
        let app = app(Duration::ZERO);

        let response = app
            .oneshot(
                Request::builder()
                    .uri("/v1/generations/garbage")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_empty_prompt_is_rejected() {
        let app = app(Duration::ZERO);

        let response = app.oneshot(submit_request("")).await.unwrap();
        assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    }
}
