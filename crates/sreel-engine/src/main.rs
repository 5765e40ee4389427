//! Demo driver: generate a chain of clips against a provider.
//!
//! Usage: `sreel-engine <prompt> [prompt ...]`
//!
//! Environment:
//! - `SREEL_SEED_IMAGE`: path or URL of the first input image (required)
//! - `PROVIDER_URL`: provider base URL (default: local simulation server)
//! - `PROVIDER_ACCESS_KEY` / `PROVIDER_SECRET_KEY`: live credentials; when
//!   absent, calls go out unauthenticated against the simulation server
//! - `SREEL_WORK_DIR`: download directory for generated clips

use anyhow::Context;
use tracing::{info, warn};

use sreel_engine::{
    cancel_pair, ChainSession, FfmpegFrameExtractor, LocalMediaStore, PollObserver, PollState,
};
use sreel_models::{ImageRef, JobId};
use sreel_provider::{HttpTransport, KeyPairMinter, NoAuth, ProviderConfig, TokenMinter};

/// Observer that mirrors progress into the log.
struct LogObserver;

impl PollObserver for LogObserver {
    fn transition(&mut self, state: PollState) {
        info!("{}", state.label());
    }

    fn submitted(&mut self, job_id: &JobId) {
        info!(job_id = %job_id, "Job accepted by provider");
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let prompts: Vec<String> = std::env::args().skip(1).collect();
    anyhow::ensure!(!prompts.is_empty(), "usage: sreel-engine <prompt> [prompt ...]");

    let seed = std::env::var("SREEL_SEED_IMAGE").context("SREEL_SEED_IMAGE is required")?;

    let config = ProviderConfig::from_env();
    let minter: Box<dyn TokenMinter> = match KeyPairMinter::from_env() {
        Some(minter) => Box::new(minter),
        None => {
            info!("No provider credentials configured; running unauthenticated");
            Box::new(NoAuth)
        }
    };

    let transport = HttpTransport::new(config, minter)?;
    let media = LocalMediaStore::from_env();
    let frames = FfmpegFrameExtractor::new()?;

    let mut session = ChainSession::new(transport, media, frames);
    session.select_image(ImageRef::new(seed));

    let (handle, token) = cancel_pair();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling");
            handle.cancel();
        }
    });

    for prompt in &prompts {
        info!(prompt = %prompt, "Generating clip");
        match session
            .generate(prompt, token.clone(), &mut LogObserver)
            .await
        {
            Ok(outcome) => {
                let record = session
                    .store()
                    .get(&outcome.clip_id)
                    .expect("record exists for returned outcome");
                info!(
                    clip_id = %outcome.clip_id,
                    video = ?record.output_video,
                    "Clip ready"
                );
                if let Some(e) = outcome.frame_error {
                    warn!(error = %e, "No continuation frame; stopping the chain here");
                    break;
                }
            }
            Err(e) if e.is_cancellation() => {
                info!("Generation cancelled");
                break;
            }
            Err(e) => return Err(e).with_context(|| format!("generating {prompt:?}")),
        }
    }

    for record in session.store().records() {
        info!(
            clip_id = %record.id,
            status = %record.status,
            prompt = %record.prompt,
            "Chain entry"
        );
    }

    Ok(())
}
