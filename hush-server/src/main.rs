// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
//  Hush: HTTP exchange logging with masking
//
//  Demo server: axum app wrapped in the Hush logging middleware
//  Config:      YAML file + HUSH_ environment overrides
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

use clap::Parser;
use hush_core::{HushConfig, HushError, RecordFormat};
use hush_observability::sink::TracingSink;
use hush_server::{HushState, build_app};
use std::path::PathBuf;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "hush", version, about = "Hush: HTTP exchange logging with masking")]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config/hush.yaml")]
    config: PathBuf,

    /// Log level used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Listen address, overrides `server.addr`
    #[arg(long)]
    addr: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // ── Config (read before tracing so the output format is known) ──
    let loaded: Option<Result<HushConfig, HushError>> =
        cli.config.exists().then(|| HushConfig::load(&cli.config));
    let format = match &loaded {
        Some(Ok(config)) => config.logging.format,
        _ => RecordFormat::Text,
    };

    // ── Tracing ──
    init_tracing(&cli.log_level, format);

    info!(version = env!("CARGO_PKG_VERSION"), "Hush starting");

    let config = match loaded {
        Some(Ok(config)) => {
            info!(path = %cli.config.display(), routes = config.routes.len(), "Loaded config file");
            config
        }
        Some(Err(e)) => {
            warn!(path = %cli.config.display(), error = %e, "Invalid config file, using defaults");
            HushConfig::default()
        }
        None => {
            info!("No config file found, using defaults");
            HushConfig::default()
        }
    };

    // ── App ──
    let state = HushState::from_config(&config, Arc::new(TracingSink));
    let app = build_app(state);

    let addr = cli.addr.unwrap_or_else(|| config.server.addr.clone());
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!(addr = %addr, logging = config.logging.enabled, "Hush is ready, serving traffic");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("Hush stopped");
    Ok(())
}

fn init_tracing(level: &str, format: RecordFormat) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));
    match format {
        RecordFormat::Json => tracing_subscriber::fmt().with_env_filter(filter).json().init(),
        RecordFormat::Text => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .init(),
    }
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
    info!("Shutdown signal received, stopping...");
}
