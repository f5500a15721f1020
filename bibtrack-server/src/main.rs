//! BibTrack race timing server - main entry point
//!
//! Hosts the leaderboard store, race clock, REST API, and SSE fan-out, and
//! optionally replays recorded detector output through the tracking
//! pipeline on a dedicated thread.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio::sync::mpsc;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use bibtrack_common::config::TrackingConfig;
use bibtrack_server::api::{self, AppState};
use bibtrack_server::ingest;
use bibtrack_server::state::SharedState;
use bibtrack_server::tracking::source::{DisabledOcr, HttpOcrService, JsonlSource, OcrService};
use bibtrack_server::tracking::TrackingPipeline;

/// Command-line arguments for bibtrack-server
#[derive(Parser, Debug)]
#[command(name = "bibtrack-server")]
#[command(about = "Live bib tracking race server")]
#[command(version)]
struct Args {
    /// Port to listen on
    #[arg(short, long, default_value = "8000", env = "BIBTRACK_PORT")]
    port: u16,

    /// Recorded detector output to replay (JSONL, one frame per line).
    /// Without it the server runs in manual timing mode.
    #[arg(short, long, env = "BIBTRACK_DETECTIONS")]
    detections: Option<PathBuf>,

    /// OCR service endpoint for reading bib regions
    #[arg(long, env = "BIBTRACK_OCR_URL")]
    ocr_url: Option<String>,

    /// Tracking configuration file (TOML)
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "bibtrack_server=debug,tower_http=debug".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    let cfg = TrackingConfig::load(args.config.as_deref())
        .context("Failed to load tracking configuration")?;

    info!("Starting BibTrack server on port {}", args.port);

    // One shared state per race session; restart loses all race state by
    // design.
    let state = Arc::new(SharedState::new());

    let (finish_tx, finish_rx) = mpsc::channel(cfg.finish_channel_capacity);
    ingest::spawn_ingest(Arc::clone(&state), finish_rx);

    match &args.detections {
        Some(path) => {
            let source = JsonlSource::open(path)
                .with_context(|| format!("Failed to open detections file {}", path.display()))?;

            info!("Replaying detections from {}", path.display());
            let ocr_url = args.ocr_url.clone();
            let pipeline_cfg = cfg;

            // the pipeline (and the blocking OCR client) live on their own
            // thread; leaderboard writes can never stall frame processing
            std::thread::spawn(move || {
                let ocr: Box<dyn OcrService> = match ocr_url {
                    Some(url) => {
                        info!("Using OCR service at {}", url);
                        Box::new(HttpOcrService::new(url))
                    }
                    None => {
                        info!("No OCR service configured; finishers will carry placeholder bibs");
                        Box::new(DisabledOcr)
                    }
                };

                let pipeline = TrackingPipeline::new(source, ocr, pipeline_cfg, finish_tx);
                match pipeline.run() {
                    Ok(summary) => info!(
                        "Tracking pipeline done: {} frames, {} finishers",
                        summary.frames_processed, summary.finishers
                    ),
                    Err(e) => error!("Tracking pipeline halted: {}", e),
                }
            });
        }
        None => {
            info!("No detections source given; manual timing mode");
            drop(finish_tx);
        }
    }

    let app = api::create_router(AppState {
        shared: Arc::clone(&state),
    });

    let addr = SocketAddr::from(([0, 0, 0, 0], args.port));
    info!("Starting HTTP server on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
