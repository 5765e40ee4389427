//! Clip chain data models.

use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

use crate::{ImageRef, JobId, VideoRef};

/// Unique identifier for a clip record.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ClipId(pub String);

impl ClipId {
    /// Generate a new random clip ID.
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Create from an existing string.
    pub fn from_string(s: impl Into<String>) -> Self {
        Self(s.into())
    }

    /// Get the inner string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for ClipId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for ClipId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Status of a clip record in the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema, Default)]
#[serde(rename_all = "snake_case")]
pub enum ClipStatus {
    /// Created, submission not started
    #[default]
    Pending,
    /// Generation job submitted or submitting
    InFlight,
    /// Video generated and materialized
    Done,
    /// Attempt failed; kept in the chain as the audit trail
    Failed,
}

impl ClipStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClipStatus::Pending => "pending",
            ClipStatus::InFlight => "in_flight",
            ClipStatus::Done => "done",
            ClipStatus::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, ClipStatus::Done | ClipStatus::Failed)
    }

    /// Whether a transition to `next` moves forward. Status never reverts.
    pub fn can_advance_to(&self, next: ClipStatus) -> bool {
        use ClipStatus::*;
        matches!(
            (self, next),
            (Pending, InFlight) | (Pending, Done) | (Pending, Failed) | (InFlight, Done) | (InFlight, Failed)
        )
    }
}

impl fmt::Display for ClipStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One attempted or completed generation unit in the chain.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ClipRecord {
    /// Unique record ID, assigned at creation
    pub id: ClipId,

    /// Image used as the generation's visual seed
    pub input_image: ImageRef,

    /// Raw, user-authored scene description (not the enriched one)
    pub prompt: String,

    /// Downloaded video; present only after terminal success
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_video: Option<VideoRef>,

    /// Final frame extracted from the output; seeds the next clip
    #[serde(skip_serializing_if = "Option::is_none")]
    pub continuation_frame: Option<ImageRef>,

    /// External job identifier; present once submission succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub job_id: Option<JobId>,

    /// Record status
    #[serde(default)]
    pub status: ClipStatus,

    /// Error message (if failed)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,

    /// Creation timestamp
    pub created_at: DateTime<Utc>,

    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl ClipRecord {
    /// Create a new pending record.
    pub fn new(input_image: ImageRef, prompt: impl Into<String>) -> Self {
        let now = Utc::now();
        Self {
            id: ClipId::new(),
            input_image,
            prompt: prompt.into(),
            output_video: None,
            continuation_frame: None,
            job_id: None,
            status: ClipStatus::Pending,
            error_message: None,
            created_at: now,
            updated_at: now,
        }
    }

    /// Mark the record in flight (submission starting).
    pub fn start(mut self) -> Self {
        self.status = ClipStatus::InFlight;
        self.updated_at = Utc::now();
        self
    }

    /// Merge a partial update into the record.
    ///
    /// A status that would move backward is ignored; all other fields are
    /// overwritten when present in the patch.
    pub fn apply(&mut self, patch: ClipPatch) {
        if let Some(status) = patch.status {
            if self.status.can_advance_to(status) {
                self.status = status;
            }
        }
        if let Some(job_id) = patch.job_id {
            self.job_id = Some(job_id);
        }
        if let Some(video) = patch.output_video {
            self.output_video = Some(video);
        }
        if let Some(frame) = patch.continuation_frame {
            self.continuation_frame = Some(frame);
        }
        if let Some(message) = patch.error_message {
            self.error_message = Some(message);
        }
        self.updated_at = Utc::now();
    }

    pub fn is_done(&self) -> bool {
        self.status == ClipStatus::Done
    }

    pub fn is_in_flight(&self) -> bool {
        self.status == ClipStatus::InFlight
    }
}

/// Partial update merged into a clip record by the chain store.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ClipPatch {
    pub status: Option<ClipStatus>,
    pub job_id: Option<JobId>,
    pub output_video: Option<VideoRef>,
    pub continuation_frame: Option<ImageRef>,
    pub error_message: Option<String>,
}

impl ClipPatch {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(mut self, status: ClipStatus) -> Self {
        self.status = Some(status);
        self
    }

    pub fn job_id(mut self, job_id: JobId) -> Self {
        self.job_id = Some(job_id);
        self
    }

    pub fn output_video(mut self, video: VideoRef) -> Self {
        self.output_video = Some(video);
        self
    }

    pub fn continuation_frame(mut self, frame: ImageRef) -> Self {
        self.continuation_frame = Some(frame);
        self
    }

    pub fn error_message(mut self, message: impl Into<String>) -> Self {
        self.error_message = Some(message.into());
        self
    }
}
