//! The submit → poll → resolve state machine.
//!
//! One poller drives one generation attempt: a single submission, then
//! strictly sequential status checks under a growing delay, until the job
//! resolves, fails, times out, or is cancelled.

use std::time::Duration;

use tokio::time::Instant;
use tracing::{debug, info, warn};

use sreel_models::{ImageRef, JobId, JobPhase};
use sreel_provider::{JobTransport, ProviderError};

use crate::cancel::CancelToken;
use crate::error::EngineError;

/// Observable states of a generation attempt.
///
/// `Idle` is the only re-entrant state; everything else is traversed at
/// most once per attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PollState {
    Idle,
    Submitting,
    Polling,
    Succeeded,
    Failed,
    Cancelled,
    TimedOut,
}

impl PollState {
    /// Human-readable progress label.
    pub fn label(&self) -> &'static str {
        match self {
            PollState::Idle => "Ready",
            PollState::Submitting => "Submitting generation job...",
            PollState::Polling => "Generating video...",
            PollState::Succeeded => "Generation complete",
            PollState::Failed => "Generation failed",
            PollState::Cancelled => "Generation cancelled",
            PollState::TimedOut => "Generation timed out",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PollState::Succeeded | PollState::Failed | PollState::Cancelled | PollState::TimedOut
        )
    }
}

/// Backoff and deadline policy for the polling loop.
///
/// Early checks are frequent because most jobs finish quickly; the cap
/// bounds worst-case latency to a fixed cadence, and the deadline bounds a
/// provider that hangs in processing forever.
#[derive(Debug, Clone)]
pub struct PollerConfig {
    /// Delay before the first status check
    pub initial_delay: Duration,
    /// Multiplier applied after every "still processing" answer
    pub backoff_factor: f64,
    /// Upper bound on the delay between checks
    pub max_delay: Duration,
    /// Wall-clock budget, counted from entry into polling
    pub deadline: Duration,
}

impl Default for PollerConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(3),
            backoff_factor: 1.3,
            max_delay: Duration::from_secs(10),
            deadline: Duration::from_secs(5 * 60),
        }
    }
}

/// Callbacks observing a generation attempt.
///
/// `transition` fires on every state change with a displayable label;
/// `submitted` fires once, as soon as the provider assigned a job id, so
/// the owning clip record can capture it before the attempt resolves.
pub trait PollObserver {
    fn transition(&mut self, state: PollState) {
        let _ = state;
    }

    fn submitted(&mut self, job_id: &JobId) {
        let _ = job_id;
    }
}

/// Observer that ignores everything.
pub struct NullObserver;

impl PollObserver for NullObserver {}

/// Terminal result of one generation attempt.
#[derive(Debug)]
pub enum PollOutcome {
    Succeeded {
        job_id: JobId,
        video_url: String,
    },
    Failed {
        job_id: Option<JobId>,
        cause: EngineError,
    },
    Cancelled {
        job_id: Option<JobId>,
    },
    TimedOut {
        job_id: JobId,
        elapsed: Duration,
    },
}

/// Drives one submit → poll → resolve pass against a transport.
pub struct Poller<'a, T: JobTransport> {
    transport: &'a T,
    config: PollerConfig,
    cancel: CancelToken,
}

impl<'a, T: JobTransport> Poller<'a, T> {
    pub fn new(transport: &'a T, config: PollerConfig, cancel: CancelToken) -> Self {
        Self {
            transport,
            config,
            cancel,
        }
    }

    /// Run the attempt to a terminal state.
    pub async fn run(
        mut self,
        image: &ImageRef,
        prompt: &str,
        observer: &mut dyn PollObserver,
    ) -> PollOutcome {
        observer.transition(PollState::Submitting);

        if self.cancel.is_cancelled() {
            observer.transition(PollState::Cancelled);
            return PollOutcome::Cancelled { job_id: None };
        }

        let job_id = match self.transport.submit(image, prompt).await {
            Ok(job_id) => job_id,
            Err(e) => {
                warn!(error = %e, "Submission failed");
                observer.transition(PollState::Failed);
                // A missing job id is a broken wire contract, anything else
                // is the provider declining the job
                let cause = if matches!(e, ProviderError::Protocol(_)) {
                    EngineError::Protocol(e)
                } else {
                    EngineError::Submission(e)
                };
                return PollOutcome::Failed { job_id: None, cause };
            }
        };

        info!(job_id = %job_id, "Generation job submitted");
        observer.submitted(&job_id);
        observer.transition(PollState::Polling);

        let started = Instant::now();
        let deadline = started + self.config.deadline;
        let mut delay = self.config.initial_delay;

        loop {
            if self.cancel.is_cancelled() {
                observer.transition(PollState::Cancelled);
                return PollOutcome::Cancelled {
                    job_id: Some(job_id),
                };
            }

            if Instant::now() >= deadline {
                warn!(job_id = %job_id, "Polling deadline exceeded");
                observer.transition(PollState::TimedOut);
                return PollOutcome::TimedOut {
                    job_id,
                    elapsed: started.elapsed(),
                };
            }

            // Interruptible sleep: a cancel request wakes it immediately
            tokio::select! {
                _ = self.cancel.cancelled() => {}
                _ = tokio::time::sleep(delay) => {}
            }

            // Re-check before spending a network call
            if self.cancel.is_cancelled() {
                observer.transition(PollState::Cancelled);
                return PollOutcome::Cancelled {
                    job_id: Some(job_id),
                };
            }

            match self.transport.check_status(&job_id).await {
                Ok(status) => match status.phase {
                    JobPhase::Completed => match status.video_url {
                        Some(video_url) => {
                            info!(job_id = %job_id, "Generation complete");
                            observer.transition(PollState::Succeeded);
                            return PollOutcome::Succeeded { job_id, video_url };
                        }
                        None => {
                            observer.transition(PollState::Failed);
                            return PollOutcome::Failed {
                                job_id: Some(job_id),
                                cause: EngineError::Protocol(ProviderError::Protocol(
                                    "job completed without a video url".to_string(),
                                )),
                            };
                        }
                    },
                    JobPhase::Failed => {
                        observer.transition(PollState::Failed);
                        return PollOutcome::Failed {
                            job_id: Some(job_id),
                            cause: EngineError::ProviderFailed,
                        };
                    }
                    JobPhase::Processing => {
                        delay = next_delay(delay, &self.config);
                        debug!(
                            job_id = %job_id,
                            next_delay_ms = delay.as_millis() as u64,
                            "Still processing"
                        );
                    }
                },
                Err(e) => {
                    warn!(job_id = %job_id, error = %e, "Status check failed");
                    observer.transition(PollState::Failed);
                    return PollOutcome::Failed {
                        job_id: Some(job_id),
                        cause: EngineError::Protocol(e),
                    };
                }
            }
        }
    }
}

/// Next backoff delay: multiply, then cap.
fn next_delay(delay: Duration, config: &PollerConfig) -> Duration {
    delay.mul_f64(config.backoff_factor).min(config.max_delay)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::cancel_pair;
    use async_trait::async_trait;
    use sreel_models::JobStatus;
    use sreel_provider::ProviderResult;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Transport whose job never leaves processing.
    #[derive(Default)]
    struct AlwaysProcessing {
        checks: AtomicUsize,
    }

    #[async_trait]
    impl JobTransport for AlwaysProcessing {
        async fn submit(&self, _image: &ImageRef, _prompt: &str) -> ProviderResult<JobId> {
            Ok(JobId::from_string("job-1"))
        }

        async fn check_status(&self, _job_id: &JobId) -> ProviderResult<JobStatus> {
            self.checks.fetch_add(1, Ordering::SeqCst);
            Ok(JobStatus::processing())
        }
    }

    /// Transport that completes after a fixed number of processing answers.
    struct CompletesAfter {
        processing_answers: usize,
        checks: AtomicUsize,
    }

    #[async_trait]
    impl JobTransport for CompletesAfter {
        async fn submit(&self, _image: &ImageRef, _prompt: &str) -> ProviderResult<JobId> {
            Ok(JobId::from_string("job-2"))
        }

        async fn check_status(&self, _job_id: &JobId) -> ProviderResult<JobStatus> {
            let check = self.checks.fetch_add(1, Ordering::SeqCst);
            if check < self.processing_answers {
                Ok(JobStatus::processing())
            } else {
                Ok(JobStatus::completed("https://example.com/out.mp4"))
            }
        }
    }

    struct RejectsSubmission;

    #[async_trait]
    impl JobTransport for RejectsSubmission {
        async fn submit(&self, _image: &ImageRef, _prompt: &str) -> ProviderResult<JobId> {
            Err(ProviderError::SubmissionRejected {
                status: 400,
                body: "bad image".to_string(),
            })
        }

        async fn check_status(&self, _job_id: &JobId) -> ProviderResult<JobStatus> {
            panic!("status must never be checked when submission fails");
        }
    }

    struct FailsJob;

    #[async_trait]
    impl JobTransport for FailsJob {
        async fn submit(&self, _image: &ImageRef, _prompt: &str) -> ProviderResult<JobId> {
            Ok(JobId::from_string("job-3"))
        }

        async fn check_status(&self, _job_id: &JobId) -> ProviderResult<JobStatus> {
            Ok(JobStatus::failed())
        }
    }

    struct CompletesWithoutUrl;

    #[async_trait]
    impl JobTransport for CompletesWithoutUrl {
        async fn submit(&self, _image: &ImageRef, _prompt: &str) -> ProviderResult<JobId> {
            Ok(JobId::from_string("job-4"))
        }

        async fn check_status(&self, _job_id: &JobId) -> ProviderResult<JobStatus> {
            Ok(JobStatus {
                phase: JobPhase::Completed,
                video_url: None,
            })
        }
    }

    /// Observer recording transitions and submitted job ids.
    #[derive(Default)]
    struct Recorder {
        states: Vec<PollState>,
        job_ids: Vec<JobId>,
    }

    impl PollObserver for Recorder {
        fn transition(&mut self, state: PollState) {
            self.states.push(state);
        }

        fn submitted(&mut self, job_id: &JobId) {
            self.job_ids.push(job_id.clone());
        }
    }

    fn seed() -> ImageRef {
        ImageRef::new("seed.jpg")
    }

    /// Mirror of the poller's schedule arithmetic: number of status checks
    /// issued before the deadline trips.
    fn expected_checks(config: &PollerConfig) -> usize {
        let mut elapsed = Duration::ZERO;
        let mut delay = config.initial_delay;
        let mut checks = 0;
        while elapsed < config.deadline {
            elapsed += delay;
            checks += 1;
            delay = delay.mul_f64(config.backoff_factor).min(config.max_delay);
        }
        checks
    }

    #[test]
    fn test_backoff_schedule_grows_and_caps() {
        let config = PollerConfig::default();
        let mut delay = config.initial_delay;
        let mut previous = delay;

        for _ in 0..20 {
            delay = next_delay(delay, &config);
            assert!(delay >= previous, "backoff must be non-decreasing");
            assert!(delay <= config.max_delay);
            previous = delay;
        }
        assert_eq!(delay, config.max_delay);
    }

    #[tokio::test(start_paused = true)]
    async fn test_hung_provider_times_out() {
        let transport = AlwaysProcessing::default();
        let config = PollerConfig::default();
        let expected = expected_checks(&config);

        let poller = Poller::new(&transport, config.clone(), CancelToken::never());
        let mut recorder = Recorder::default();
        let outcome = poller.run(&seed(), "prompt", &mut recorder).await;

        match outcome {
            PollOutcome::TimedOut { elapsed, .. } => {
                assert!(elapsed >= config.deadline);
            }
            other => panic!("expected TimedOut, got {other:?}"),
        }
        assert_eq!(transport.checks.load(Ordering::SeqCst), expected);
        assert_eq!(recorder.states.last(), Some(&PollState::TimedOut));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_poll_skips_status_checks() {
        let transport = AlwaysProcessing::default();
        let (handle, token) = cancel_pair();
        handle.cancel();

        let poller = Poller::new(&transport, PollerConfig::default(), token);
        let mut recorder = Recorder::default();
        let outcome = poller.run(&seed(), "prompt", &mut recorder).await;

        assert!(matches!(outcome, PollOutcome::Cancelled { .. }));
        assert_eq!(transport.checks.load(Ordering::SeqCst), 0);
        assert_eq!(recorder.states.last(), Some(&PollState::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_during_sleep_wakes_promptly() {
        let transport = AlwaysProcessing::default();
        let (handle, token) = cancel_pair();

        let poller = Poller::new(&transport, PollerConfig::default(), token);
        let mut recorder = Recorder::default();
        let seed = seed();
        let (outcome, _) = tokio::join!(poller.run(&seed, "prompt", &mut recorder), async {
            // Fire mid-sleep, well before the first 3s delay elapses
            tokio::time::sleep(Duration::from_secs(1)).await;
            handle.cancel();
        });

        match outcome {
            PollOutcome::Cancelled { job_id } => {
                // Submission had succeeded, so the job id is preserved
                assert!(job_id.is_some());
            }
            other => panic!("expected Cancelled, got {other:?}"),
        }
        assert_eq!(transport.checks.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_completes_after_processing_answers() {
        let transport = CompletesAfter {
            processing_answers: 3,
            checks: AtomicUsize::new(0),
        };

        let poller = Poller::new(&transport, PollerConfig::default(), CancelToken::never());
        let mut recorder = Recorder::default();
        let outcome = poller.run(&seed(), "prompt", &mut recorder).await;

        match outcome {
            PollOutcome::Succeeded { job_id, video_url } => {
                assert_eq!(job_id.as_str(), "job-2");
                assert_eq!(video_url, "https://example.com/out.mp4");
            }
            other => panic!("expected Succeeded, got {other:?}"),
        }
        assert_eq!(transport.checks.load(Ordering::SeqCst), 4);
        assert_eq!(recorder.job_ids.len(), 1);
        assert_eq!(
            recorder.states,
            vec![
                PollState::Submitting,
                PollState::Polling,
                PollState::Succeeded
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_submission_never_reaches_polling() {
        let transport = RejectsSubmission;
        let poller = Poller::new(&transport, PollerConfig::default(), CancelToken::never());
        let mut recorder = Recorder::default();
        let outcome = poller.run(&seed(), "prompt", &mut recorder).await;

        match outcome {
            PollOutcome::Failed { job_id, cause } => {
                assert!(job_id.is_none());
                assert!(matches!(cause, EngineError::Submission(_)));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
        assert!(!recorder.states.contains(&PollState::Polling));
        assert!(recorder.job_ids.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_provider_reported_failure() {
        let transport = FailsJob;
        let poller = Poller::new(&transport, PollerConfig::default(), CancelToken::never());
        let outcome = poller.run(&seed(), "prompt", &mut NullObserver).await;

        match outcome {
            PollOutcome::Failed { job_id, cause } => {
                assert!(job_id.is_some());
                assert!(matches!(cause, EngineError::ProviderFailed));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_completed_without_url_is_protocol_failure() {
        let transport = CompletesWithoutUrl;
        let poller = Poller::new(&transport, PollerConfig::default(), CancelToken::never());
        let outcome = poller.run(&seed(), "prompt", &mut NullObserver).await;

        match outcome {
            PollOutcome::Failed { cause, .. } => {
                assert!(matches!(cause, EngineError::Protocol(_)));
            }
            other => panic!("expected Failed, got {other:?}"),
        }
    }
}
