//! Media collaborators: video materialization and continuation frames.
//!
//! The session consumes these through narrow contracts. The bundled
//! implementations download over HTTP into a local work directory and shell
//! out to ffmpeg for the tail frame.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use thiserror::Error;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};
use uuid::Uuid;

use sreel_chain::MediaReleaser;
use sreel_models::{ImageRef, VideoRef};

pub type MediaResult<T> = Result<T, MediaError>;

/// Errors from media collaborators.
#[derive(Debug, Error)]
pub enum MediaError {
    #[error("download failed: {0}")]
    DownloadFailed(String),

    #[error("ffmpeg not found in PATH")]
    FfmpegNotFound,

    #[error("ffmpeg failed: {message}")]
    FfmpegFailed {
        message: String,
        exit_code: Option<i32>,
    },

    #[error("file not found: {0}")]
    FileNotFound(PathBuf),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Materializes resolved video URLs as local references.
///
/// A failure here is an attempt failure for the caller; the engine never
/// retries it automatically.
#[async_trait]
pub trait MediaStore: Send + Sync {
    async fn materialize(&self, url: &str) -> MediaResult<VideoRef>;
}

/// Extracts the continuation frame near the end of a clip.
///
/// Failure here is reported separately from job failure: the job already
/// succeeded by the time a frame is requested.
#[async_trait]
pub trait FrameExtractor: Send + Sync {
    async fn tail_frame(&self, video: &VideoRef) -> MediaResult<ImageRef>;
}

/// Downloads videos into a local work directory.
pub struct LocalMediaStore {
    http: reqwest::Client,
    work_dir: PathBuf,
}

impl LocalMediaStore {
    pub fn new(work_dir: impl Into<PathBuf>) -> Self {
        Self {
            http: reqwest::Client::new(),
            work_dir: work_dir.into(),
        }
    }

    /// Create from `SREEL_WORK_DIR`, defaulting to a temp subdirectory.
    pub fn from_env() -> Self {
        let work_dir = std::env::var("SREEL_WORK_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|_| std::env::temp_dir().join("storyreel"));
        Self::new(work_dir)
    }
}

#[async_trait]
impl MediaStore for LocalMediaStore {
    async fn materialize(&self, url: &str) -> MediaResult<VideoRef> {
        tokio::fs::create_dir_all(&self.work_dir).await?;
        let path = self.work_dir.join(format!("clip_{}.mp4", Uuid::new_v4()));

        let mut response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| MediaError::DownloadFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(MediaError::DownloadFailed(format!(
                "{} fetching {url}",
                response.status()
            )));
        }

        let mut file = tokio::fs::File::create(&path).await?;
        while let Some(chunk) = response
            .chunk()
            .await
            .map_err(|e| MediaError::DownloadFailed(e.to_string()))?
        {
            file.write_all(&chunk).await?;
        }
        file.flush().await?;

        debug!(path = %path.display(), url, "Video materialized");
        Ok(VideoRef::new(path.to_string_lossy()))
    }
}

impl MediaReleaser for LocalMediaStore {
    fn release(&self, video: &VideoRef) {
        if let Err(e) = std::fs::remove_file(video.as_str()) {
            warn!(video = %video, error = %e, "Failed to remove clip file");
        }
    }
}

/// Extracts frames by shelling out to the ffmpeg CLI.
pub struct FfmpegFrameExtractor {
    ffmpeg: PathBuf,
    /// Seek offset back from the end of the clip, in seconds
    tail_offset: f64,
}

impl FfmpegFrameExtractor {
    pub fn new() -> MediaResult<Self> {
        let ffmpeg = which::which("ffmpeg").map_err(|_| MediaError::FfmpegNotFound)?;
        Ok(Self {
            ffmpeg,
            tail_offset: 0.1,
        })
    }
}

#[async_trait]
impl FrameExtractor for FfmpegFrameExtractor {
    async fn tail_frame(&self, video: &VideoRef) -> MediaResult<ImageRef> {
        let input = Path::new(video.as_str());
        if !input.exists() {
            return Err(MediaError::FileNotFound(input.to_path_buf()));
        }

        let output = input.with_extension("frame.jpg");

        // Seek from the end of the file to grab the final frame
        let result = Command::new(&self.ffmpeg)
            .arg("-y")
            .arg("-sseof")
            .arg(format!("-{}", self.tail_offset))
            .arg("-i")
            .arg(input)
            .arg("-frames:v")
            .arg("1")
            .arg("-q:v")
            .arg("2")
            .arg(&output)
            .output()
            .await?;

        if !result.status.success() {
            return Err(MediaError::FfmpegFailed {
                message: String::from_utf8_lossy(&result.stderr).trim().to_string(),
                exit_code: result.status.code(),
            });
        }

        debug!(frame = %output.display(), "Continuation frame extracted");
        Ok(ImageRef::new(output.to_string_lossy()))
    }
}
