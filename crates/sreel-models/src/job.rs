//! External generation job types.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// External job identifier, assigned by the provider at submission.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct JobId(pub String);

impl JobId {
    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Phase of an external generation job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum JobPhase {
    /// Job accepted, output not ready yet
    Processing,
    /// Job finished, output available
    Completed,
    /// Job ran and the provider marked it failed
    Failed,
}

impl JobPhase {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobPhase::Processing => "processing",
            JobPhase::Completed => "completed",
            JobPhase::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, JobPhase::Processing)
    }

    /// Map a provider's own status vocabulary onto the three phases.
    ///
    /// Any status not recognized as terminal maps to `Processing` rather
    /// than misreporting failure.
    pub fn from_provider_status(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "completed" | "complete" | "succeeded" | "success" => JobPhase::Completed,
            "failed" | "error" | "cancelled" | "canceled" => JobPhase::Failed,
            _ => JobPhase::Processing,
        }
    }
}

impl fmt::Display for JobPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Result of a single status check against the provider.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobStatus {
    pub phase: JobPhase,
    /// Resolved video URL; present once the job completed
    pub video_url: Option<String>,
}

impl JobStatus {
    pub fn processing() -> Self {
        Self {
            phase: JobPhase::Processing,
            video_url: None,
        }
    }

    pub fn completed(video_url: impl Into<String>) -> Self {
        Self {
            phase: JobPhase::Completed,
            video_url: Some(video_url.into()),
        }
    }

    pub fn failed() -> Self {
        Self {
            phase: JobPhase::Failed,
            video_url: None,
        }
    }
}
