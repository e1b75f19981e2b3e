use anyhow::{Context, Result};
use pvscan_ocr::{ExtractionPipeline, UploadStore};
use tokio::net::TcpListener;
use tracing::info;

mod config;
mod engine;
mod error;
mod routes;
mod telemetry;

use config::ServerConfig;
use routes::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    let config = ServerConfig::load()?;
    telemetry::init(config.log_format)?;

    // ── OCR engine ────────────────────────────────────────────────────────────
    // Loaded once here; every request shares this instance.
    let engine = engine::build(&config.engine).context("Failed to start OCR engine")?;

    let mut pipeline = ExtractionPipeline::new(engine, config.limits());
    if let Some(dir) = &config.uploads_dir {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("Failed to create uploads directory {}", dir.display()))?;
        info!("Storing uploads under {}", dir.display());
        pipeline = pipeline.with_store(UploadStore::new(dir));
    }

    for p in &config.profiles {
        info!(path = %p.path, digits = %p.digits, enhance = p.enhance, "extraction route");
    }

    let app = routes::router(AppState { pipeline }, config.profiles.clone(), config.max_request_bytes);

    let listener = TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind {}", config.bind))?;
    info!("pvscan listening on {}", config.bind);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("pvscan stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Failed to listen for shutdown signal: {e}");
    }
}
