//! Stateless job identity.
//!
//! On submission the completion instant is computed once and encoded
//! directly into the returned job id (`sim-<ready-at-millis>`). A status
//! check decodes it back, so any server instance can answer with no shared
//! state: status is purely a function of (identifier, current time).

use chrono::{DateTime, TimeZone, Utc};

use sreel_models::{JobId, JobStatus};

use crate::error::{SimError, SimResult};

/// Tag prefixing every simulated job id.
const JOB_ID_PREFIX: &str = "sim-";

/// Fixed sample video returned for every completed simulated job.
pub const SAMPLE_VIDEO_URL: &str =
    "https://commondatastorage.googleapis.com/gtv-videos-bucket/sample/ForBiggerEscapes.mp4";

/// Encode a ready-at instant into a job id.
pub fn encode_job_id(ready_at: DateTime<Utc>) -> JobId {
    JobId::from_string(format!("{JOB_ID_PREFIX}{}", ready_at.timestamp_millis()))
}

/// Decode the ready-at instant from a job id.
///
/// Ids without the tag, or whose payload is not a valid millisecond
/// timestamp, are unknown.
pub fn decode_job_id(job_id: &JobId) -> SimResult<DateTime<Utc>> {
    let millis: i64 = job_id
        .as_str()
        .strip_prefix(JOB_ID_PREFIX)
        .ok_or_else(|| SimError::UnknownJob(job_id.clone()))?
        .parse()
        .map_err(|_| SimError::UnknownJob(job_id.clone()))?;

    Utc.timestamp_millis_opt(millis)
        .single()
        .ok_or_else(|| SimError::UnknownJob(job_id.clone()))
}

/// Status of a simulated job at `now`.
pub fn status_at(job_id: &JobId, now: DateTime<Utc>) -> SimResult<JobStatus> {
    let ready_at = decode_job_id(job_id)?;
    if now < ready_at {
        Ok(JobStatus::processing())
    } else {
        Ok(JobStatus::completed(SAMPLE_VIDEO_URL))
    }
}
