//! Chain orchestration session.
//!
//! Glues the chain store, the job transport, and the media collaborators
//! into the generate-one-clip pipeline: enrich, append, submit, poll,
//! materialize, extract the continuation frame, advance the chain.

use tracing::warn;

use sreel_chain::{ChainStore, MediaReleaser};
use sreel_models::{ClipId, ClipPatch, ClipStatus, ImageRef, JobId};
use sreel_provider::JobTransport;

use crate::cancel::CancelToken;
use crate::error::{EngineError, EngineResult};
use crate::media::{FrameExtractor, MediaError, MediaStore};
use crate::poller::{PollObserver, PollOutcome, PollState, Poller, PollerConfig};

/// Result of a successful generation attempt.
#[derive(Debug)]
pub struct ClipOutcome {
    pub clip_id: ClipId,
    /// Set when the job succeeded but the continuation frame could not be
    /// extracted; the clip is still done, the chain just cannot advance its
    /// input image automatically.
    pub frame_error: Option<MediaError>,
}

/// Drives the clip chain against a provider.
///
/// One session owns one chain; at most one generation attempt runs at a
/// time, sequenced by the exclusive borrow on `generate`.
pub struct ChainSession<T, M, F>
where
    T: JobTransport,
    M: MediaStore + MediaReleaser,
    F: FrameExtractor,
{
    store: ChainStore,
    transport: T,
    media: M,
    frames: F,
    poller_config: PollerConfig,
}

impl<T, M, F> ChainSession<T, M, F>
where
    T: JobTransport,
    M: MediaStore + MediaReleaser,
    F: FrameExtractor,
{
    pub fn new(transport: T, media: M, frames: F) -> Self {
        Self {
            store: ChainStore::new(),
            transport,
            media,
            frames,
            poller_config: PollerConfig::default(),
        }
    }

    pub fn with_poller_config(mut self, config: PollerConfig) -> Self {
        self.poller_config = config;
        self
    }

    /// Read access to the chain.
    pub fn store(&self) -> &ChainStore {
        &self.store
    }

    /// Select the input image for the next generation.
    pub fn select_image(&mut self, image: ImageRef) {
        self.store.set_current_image(image);
    }

    /// Run one generation attempt from the currently selected input image.
    ///
    /// The narrative context is computed exactly once, from the chain as it
    /// stands, before the new record is appended. Every terminal
    /// non-success outcome patches the record to failed; cancellation is
    /// surfaced as [`EngineError::Cancelled`] so callers can keep it out of
    /// error UX.
    pub async fn generate(
        &mut self,
        prompt: &str,
        cancel: CancelToken,
        observer: &mut dyn PollObserver,
    ) -> EngineResult<ClipOutcome> {
        let image = self
            .store
            .current_image()
            .cloned()
            .ok_or(EngineError::NoInputImage)?;

        let enriched = self.store.narrative_context(prompt);
        let clip_id = self.store.append(image.clone(), prompt)?;

        let outcome = {
            let Self {
                store,
                transport,
                poller_config,
                ..
            } = self;
            let mut recorder = RecordingObserver {
                store,
                clip_id: &clip_id,
                inner: observer,
            };
            Poller::new(transport, poller_config.clone(), cancel)
                .run(&image, &enriched, &mut recorder)
                .await
        };

        match outcome {
            PollOutcome::Succeeded { video_url, .. } => {
                let video = match self.media.materialize(&video_url).await {
                    Ok(video) => video,
                    Err(e) => {
                        let cause = EngineError::Download(e);
                        self.fail_clip(&clip_id, &cause);
                        return Err(cause);
                    }
                };

                self.store.patch(
                    &clip_id,
                    ClipPatch::new()
                        .status(ClipStatus::Done)
                        .output_video(video.clone()),
                )?;

                // The job already succeeded; a frame failure must not fail
                // the clip retroactively.
                match self.frames.tail_frame(&video).await {
                    Ok(frame) => {
                        self.store
                            .patch(&clip_id, ClipPatch::new().continuation_frame(frame.clone()))?;
                        self.store.set_current_image(frame);
                        Ok(ClipOutcome {
                            clip_id,
                            frame_error: None,
                        })
                    }
                    Err(e) => {
                        warn!(clip_id = %clip_id, error = %e, "Continuation frame extraction failed");
                        Ok(ClipOutcome {
                            clip_id,
                            frame_error: Some(e),
                        })
                    }
                }
            }
            PollOutcome::Failed { cause, .. } => {
                self.fail_clip(&clip_id, &cause);
                Err(cause)
            }
            PollOutcome::TimedOut { elapsed, .. } => {
                let cause = EngineError::TimedOut(elapsed);
                self.fail_clip(&clip_id, &cause);
                Err(cause)
            }
            PollOutcome::Cancelled { .. } => {
                // A cancelled record must never stay stuck in flight
                let cause = EngineError::Cancelled;
                self.fail_clip(&clip_id, &cause);
                Err(cause)
            }
        }
    }

    /// Clear the chain and delete the downloaded clips.
    pub fn reset(&mut self) {
        let Self { store, media, .. } = self;
        store.reset(&*media);
    }

    fn fail_clip(&mut self, clip_id: &ClipId, cause: &EngineError) {
        let patch = ClipPatch::new()
            .status(ClipStatus::Failed)
            .error_message(cause.to_string());
        if let Err(e) = self.store.patch(clip_id, patch) {
            warn!(clip_id = %clip_id, error = %e, "Failed to patch clip record");
        }
    }
}

/// Wraps the caller's observer to capture the job id on the owning record
/// the moment submission succeeds.
struct RecordingObserver<'a> {
    store: &'a mut ChainStore,
    clip_id: &'a ClipId,
    inner: &'a mut dyn PollObserver,
}

impl PollObserver for RecordingObserver<'_> {
    fn transition(&mut self, state: PollState) {
        self.inner.transition(state);
    }

    fn submitted(&mut self, job_id: &JobId) {
        if let Err(e) = self
            .store
            .patch(self.clip_id, ClipPatch::new().job_id(job_id.clone()))
        {
            warn!(clip_id = %self.clip_id, error = %e, "Failed to record job id");
        }
        self.inner.submitted(job_id);
    }
}
