//! Simulation provider server.
//!
//! Environment:
//! - `SIM_ADDR`: listen address (default `0.0.0.0:8787`)
//! - `SIM_GENERATION_DELAY_SECS`: simulated generation delay (default 8)

use anyhow::Context;
use tracing::info;

use sreel_sim::{create_router, SimConfig, SimState};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = SimConfig::from_env();
    let addr = std::env::var("SIM_ADDR").unwrap_or_else(|_| "0.0.0.0:8787".to_string());

    info!(
        %addr,
        delay_secs = config.generation_delay.as_secs(),
        "Starting simulation provider"
    );

    let app = create_router(SimState { config });
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("binding {addr}"))?;

    axum::serve(listener, app).await?;
    Ok(())
}
