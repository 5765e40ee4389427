//! Job transport: one submission call and one status check.

use async_trait::async_trait;
use base64::Engine as _;
use reqwest::{Client, RequestBuilder};
use tracing::debug;

use sreel_models::{
    ImageRef, JobId, JobPhase, JobStatus, StatusResponse, SubmitRequest, SubmitResponse,
};

use crate::config::ProviderConfig;
use crate::error::{ProviderError, ProviderResult};
use crate::token::TokenMinter;

/// A provider that accepts generation jobs and reports their status.
///
/// Implementations hold no state between calls; all pacing and retry policy
/// belongs to the caller.
#[async_trait]
pub trait JobTransport: Send + Sync {
    /// Submit a generation job, returning the provider's job id.
    async fn submit(&self, image: &ImageRef, prompt: &str) -> ProviderResult<JobId>;

    /// Check the status of a previously submitted job.
    async fn check_status(&self, job_id: &JobId) -> ProviderResult<JobStatus>;
}

/// HTTP transport against the provider REST API.
pub struct HttpTransport {
    http: Client,
    config: ProviderConfig,
    minter: Box<dyn TokenMinter>,
}

impl HttpTransport {
    /// Create a new transport.
    pub fn new(config: ProviderConfig, minter: Box<dyn TokenMinter>) -> ProviderResult<Self> {
        let http = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(ProviderError::Network)?;

        Ok(Self {
            http,
            config,
            minter,
        })
    }

    fn submit_url(&self) -> String {
        format!("{}/v1/generations", self.config.base_url)
    }

    fn status_url(&self, job_id: &JobId) -> String {
        format!("{}/v1/generations/{}", self.config.base_url, job_id)
    }

    /// Attach a freshly minted credential, when one is configured.
    fn authorize(&self, request: RequestBuilder) -> ProviderResult<RequestBuilder> {
        Ok(match self.minter.mint()? {
            Some(token) => request.bearer_auth(token),
            None => request,
        })
    }

    /// Resolve the wire image payload from an opaque reference.
    ///
    /// Local files are read and base64 encoded; anything else is passed
    /// through for the provider to resolve.
    async fn encode_image(image: &ImageRef) -> String {
        match tokio::fs::read(image.as_str()).await {
            Ok(bytes) => base64::engine::general_purpose::STANDARD.encode(bytes),
            Err(_) => image.as_str().to_string(),
        }
    }
}

#[async_trait]
impl JobTransport for HttpTransport {
    async fn submit(&self, image: &ImageRef, prompt: &str) -> ProviderResult<JobId> {
        let request = SubmitRequest {
            image: Self::encode_image(image).await,
            prompt: prompt.to_string(),
        };

        debug!(url = %self.submit_url(), "Submitting generation job");

        let response = self
            .authorize(self.http.post(self.submit_url()).json(&request))?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::SubmissionRejected { status, body });
        }

        let submitted: SubmitResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("submit response: {e}")))?;

        if submitted.job_id.is_empty() {
            return Err(ProviderError::Protocol(
                "submit response carried an empty job id".to_string(),
            ));
        }

        Ok(JobId::from_string(submitted.job_id))
    }

    async fn check_status(&self, job_id: &JobId) -> ProviderResult<JobStatus> {
        let response = self
            .authorize(self.http.get(self.status_url(job_id)))?
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::Protocol(format!(
                "status check returned {status}: {body}"
            )));
        }

        let status: StatusResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Protocol(format!("status response: {e}")))?;

        debug!(job_id = %job_id, phase = %status.phase, "Status check");

        Ok(JobStatus {
            phase: JobPhase::from_provider_status(&status.phase),
            video_url: status.video_url,
        })
    }
}
