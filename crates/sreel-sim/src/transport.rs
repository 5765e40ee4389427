//! In-process simulated transport.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tracing::debug;

use sreel_models::{ImageRef, JobId, JobStatus};
use sreel_provider::{JobTransport, ProviderError, ProviderResult};

use crate::idcodec;

/// Default simulated generation delay.
pub const DEFAULT_GENERATION_DELAY: Duration = Duration::from_secs(8);

/// Transport that simulates the provider without network or state.
///
/// From the poller's point of view it behaves exactly like the HTTP
/// transport: submission yields a job id, status checks report processing
/// until the simulated delay elapses, then completed with the sample video.
pub struct SimTransport {
    generation_delay: Duration,
}

impl SimTransport {
    pub fn new(generation_delay: Duration) -> Self {
        Self { generation_delay }
    }
}

impl Default for SimTransport {
    fn default() -> Self {
        Self::new(DEFAULT_GENERATION_DELAY)
    }
}

#[async_trait]
impl JobTransport for SimTransport {
    async fn submit(&self, _image: &ImageRef, prompt: &str) -> ProviderResult<JobId> {
        let ready_at =
            Utc::now() + chrono::Duration::milliseconds(self.generation_delay.as_millis() as i64);
        let job_id = idcodec::encode_job_id(ready_at);
        debug!(job_id = %job_id, prompt, "Simulated job accepted");
        Ok(job_id)
    }

    async fn check_status(&self, job_id: &JobId) -> ProviderResult<JobStatus> {
        idcodec::status_at(job_id, Utc::now()).map_err(|e| ProviderError::Protocol(e.to_string()))
    }
}
