//! The clip chain store.
//!
//! Exclusively owns the ordered clip records and the currently selected
//! input image. All mutation goes through the operations here; other
//! components read the chain, never write it directly.

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use sreel_models::{ClipId, ClipPatch, ClipRecord, ImageRef, VideoRef};

use crate::error::{ChainError, ChainResult};

/// Continuity instruction appended after the framed prompts.
const CONTINUITY_INSTRUCTION: &str =
    "Continue directly from the previous scene, keeping the same characters, setting, and visual style.";

/// Current phase of interaction, derived from the chain contents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChainPhase {
    /// No input image selected yet
    AwaitingImage,
    /// Input image selected, ready to generate
    Ready,
    /// A generation attempt is in flight
    Generating,
}

/// Callback used by [`ChainStore::reset`] to release downloaded videos.
pub trait MediaReleaser {
    fn release(&self, video: &VideoRef);
}

/// Releaser that leaves files in place.
pub struct NoopReleaser;

impl MediaReleaser for NoopReleaser {
    fn release(&self, _video: &VideoRef) {}
}

/// Ordered clip chain plus the currently selected input image.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ChainStore {
    records: Vec<ClipRecord>,
    current_image: Option<ImageRef>,
}

impl ChainStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a new in-flight record from the current chain tail.
    ///
    /// The caller computes any prompt enrichment *before* calling this (see
    /// [`ChainStore::narrative_context`]); the record stores the raw prompt.
    /// Rejected while another record is in flight: one active job at a time.
    pub fn append(&mut self, input_image: ImageRef, prompt: impl Into<String>) -> ChainResult<ClipId> {
        if self.in_flight().is_some() {
            return Err(ChainError::AlreadyInFlight);
        }

        let record = ClipRecord::new(input_image, prompt).start();
        let id = record.id.clone();
        debug!(clip_id = %id, position = self.records.len(), "Appending clip record");
        self.records.push(record);
        Ok(id)
    }

    /// Merge a partial update into the named record.
    ///
    /// Returns `NotFound` when the id is absent, which is also the case for
    /// any id issued before a `reset`.
    pub fn patch(&mut self, id: &ClipId, patch: ClipPatch) -> ChainResult<()> {
        let record = self
            .records
            .iter_mut()
            .find(|r| &r.id == id)
            .ok_or_else(|| ChainError::NotFound(id.clone()))?;

        if let Some(status) = patch.status {
            if !record.status.can_advance_to(status) && record.status != status {
                warn!(
                    clip_id = %id,
                    from = %record.status,
                    to = %status,
                    "Ignoring backward status patch"
                );
            }
        }

        record.apply(patch);
        Ok(())
    }

    /// The most recent record with status `Done`.
    ///
    /// Failed and in-flight records are skipped, so a failure never breaks
    /// continuity for the clips before it.
    pub fn last_good_clip(&self) -> Option<&ClipRecord> {
        self.records.iter().rev().find(|r| r.is_done())
    }

    /// Enrich a prompt with narrative context from recent successful clips.
    ///
    /// Pure function of the current done clips: the prompts of the one or
    /// two most recent `Done` records are framed with explicit ordinals,
    /// followed by the new prompt and a continuity instruction. With no done
    /// clips the prompt is returned unchanged.
    pub fn narrative_context(&self, prompt: &str) -> String {
        let mut recent = self.records.iter().rev().filter(|r| r.is_done());
        let previous = recent.next();
        let older = recent.next();

        match (previous, older) {
            (None, _) => prompt.to_string(),
            (Some(previous), None) => format!(
                "Previous scene: {}. Current scene: {}. {}",
                previous.prompt, prompt, CONTINUITY_INSTRUCTION
            ),
            (Some(previous), Some(older)) => format!(
                "Two scenes ago: {}. Previous scene: {}. Current scene: {}. {}",
                older.prompt, previous.prompt, prompt, CONTINUITY_INSTRUCTION
            ),
        }
    }

    /// Clear the chain and release the videos its records reference.
    ///
    /// Returns the store to the initial phase; previously issued clip ids
    /// become invalid.
    pub fn reset<R: MediaReleaser>(&mut self, releaser: &R) {
        let released = self
            .records
            .iter()
            .filter_map(|r| r.output_video.as_ref())
            .inspect(|video| releaser.release(video))
            .count();

        info!(clips = self.records.len(), released, "Resetting clip chain");
        self.records.clear();
        self.current_image = None;
    }

    /// The record currently in flight, if any.
    pub fn in_flight(&self) -> Option<&ClipRecord> {
        self.records.iter().find(|r| r.is_in_flight())
    }

    /// Derived interaction phase.
    pub fn phase(&self) -> ChainPhase {
        if self.in_flight().is_some() {
            ChainPhase::Generating
        } else if self.current_image.is_some() {
            ChainPhase::Ready
        } else {
            ChainPhase::AwaitingImage
        }
    }

    pub fn records(&self) -> &[ClipRecord] {
        &self.records
    }

    pub fn get(&self, id: &ClipId) -> Option<&ClipRecord> {
        self.records.iter().find(|r| &r.id == id)
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn current_image(&self) -> Option<&ImageRef> {
        self.current_image.as_ref()
    }

    /// Select the input image for the next generation.
    pub fn set_current_image(&mut self, image: ImageRef) {
        debug!(image = %image, "Selecting input image");
        self.current_image = Some(image);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sreel_models::ClipStatus;
    use std::cell::RefCell;

    fn done_patch(video: &str) -> ClipPatch {
        ClipPatch::new()
            .status(ClipStatus::Done)
            .output_video(VideoRef::new(video))
    }

    fn store_with_done_clips(prompts: &[&str]) -> ChainStore {
        let mut store = ChainStore::new();
        for (i, prompt) in prompts.iter().enumerate() {
            let id = store.append(ImageRef::new(format!("img-{i}")), *prompt).unwrap();
            store.patch(&id, done_patch(&format!("video-{i}.mp4"))).unwrap();
        }
        store
    }

    #[test]
    fn test_append_rejects_second_in_flight() {
        let mut store = ChainStore::new();
        store.append(ImageRef::new("a"), "first").unwrap();

        let err = store.append(ImageRef::new("b"), "second").unwrap_err();
        assert!(matches!(err, ChainError::AlreadyInFlight));
    }

    #[test]
    fn test_patch_unknown_id_is_not_found() {
        let mut store = ChainStore::new();
        let err = store
            .patch(&ClipId::from_string("missing"), ClipPatch::new())
            .unwrap_err();
        assert!(matches!(err, ChainError::NotFound(_)));
    }

    #[test]
    fn test_last_good_skips_failed_and_in_flight() {
        let mut store = store_with_done_clips(&["A"]);

        // A failed attempt after the done clip
        let failed = store.append(ImageRef::new("img"), "B").unwrap();
        store
            .patch(&failed, ClipPatch::new().status(ClipStatus::Failed))
            .unwrap();

        // And one currently in flight
        store.append(ImageRef::new("img"), "C").unwrap();

        let last_good = store.last_good_clip().expect("done clip present");
        assert_eq!(last_good.prompt, "A");
        assert_eq!(last_good.status, ClipStatus::Done);
    }

    #[test]
    fn test_last_good_none_without_done() {
        let mut store = ChainStore::new();
        assert!(store.last_good_clip().is_none());

        store.append(ImageRef::new("img"), "A").unwrap();
        assert!(store.last_good_clip().is_none());
    }

    #[test]
    fn test_narrative_context_empty_chain() {
        let store = ChainStore::new();
        assert_eq!(store.narrative_context("A fox"), "A fox");
    }

    #[test]
    fn test_narrative_context_one_done() {
        let store = store_with_done_clips(&["A"]);
        let context = store.narrative_context("B");

        assert!(context.contains("Previous scene: A"));
        assert!(context.contains("Current scene: B"));
    }

    #[test]
    fn test_narrative_context_two_done_with_ordinals() {
        let store = store_with_done_clips(&["A", "B"]);
        let context = store.narrative_context("C");

        assert!(context.contains("Two scenes ago: A"));
        assert!(context.contains("Previous scene: B"));
        assert!(context.contains("Current scene: C"));
    }

    #[test]
    fn test_narrative_context_omits_older_clips() {
        let store = store_with_done_clips(&["A", "B", "C"]);
        let context = store.narrative_context("D");

        assert!(!context.contains("A"));
        assert!(context.contains("Two scenes ago: B"));
        assert!(context.contains("Previous scene: C"));
    }

    #[test]
    fn test_narrative_context_skips_failed() {
        let mut store = store_with_done_clips(&["A"]);
        let failed = store.append(ImageRef::new("img"), "B").unwrap();
        store
            .patch(&failed, ClipPatch::new().status(ClipStatus::Failed))
            .unwrap();

        let context = store.narrative_context("C");
        assert!(context.contains("Previous scene: A"));
        assert!(!context.contains("B"));
    }

    struct RecordingReleaser {
        released: RefCell<Vec<String>>,
    }

    impl MediaReleaser for RecordingReleaser {
        fn release(&self, video: &VideoRef) {
            self.released.borrow_mut().push(video.as_str().to_string());
        }
    }

    #[test]
    fn test_reset_releases_videos_and_invalidates_ids() {
        let mut store = store_with_done_clips(&["A", "B"]);
        store.set_current_image(ImageRef::new("frame.jpg"));
        let stale_id = store.records()[0].id.clone();

        let releaser = RecordingReleaser {
            released: RefCell::new(Vec::new()),
        };
        store.reset(&releaser);

        assert!(store.is_empty());
        assert!(store.current_image().is_none());
        assert_eq!(
            releaser.released.borrow().as_slice(),
            &["video-0.mp4".to_string(), "video-1.mp4".to_string()]
        );

        // Patches against pre-reset ids are rejected
        let err = store.patch(&stale_id, ClipPatch::new()).unwrap_err();
        assert!(matches!(err, ChainError::NotFound(_)));
    }

    #[test]
    fn test_phase_derivation() {
        let mut store = ChainStore::new();
        assert_eq!(store.phase(), ChainPhase::AwaitingImage);

        store.set_current_image(ImageRef::new("seed.jpg"));
        assert_eq!(store.phase(), ChainPhase::Ready);

        let id = store.append(ImageRef::new("seed.jpg"), "A").unwrap();
        assert_eq!(store.phase(), ChainPhase::Generating);

        store.patch(&id, done_patch("out.mp4")).unwrap();
        assert_eq!(store.phase(), ChainPhase::Ready);
    }
}
