//! tour-server binary.
//!
//! # Architecture Overview
//!
//! ```text
//!     Client Request
//!     ──────────────▶ security headers → CORS → request id → error renderer
//!                     → panic guard → access log / metrics → deadline
//!                     → rate limiter (/api)
//!                         ├─▶ POST /webhook-checkout (raw body, signature check)
//!                         └─▶ body parser → sanitize → dedupe → compression
//!                             → request time → pages | /api/v1/* | static
//!                                                            │
//!     Client Response                                         ▼
//!     ◀────────────── rendered errors / JSON / HTML ◀── document store
//! ```

use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;
use tokio::net::TcpListener;

use tour_server::config::{load_config, AppConfig, EnvOverrides};
use tour_server::lifecycle::{signals, Shutdown};
use tour_server::observability::{init_logging, init_metrics};
use tour_server::HttpServer;

#[derive(Debug, Parser)]
#[command(name = "tour-server", version, about = "Tour booking web server")]
struct Args {
    /// Path to a TOML configuration file.
    #[arg(short, long, env = "TOUR_SERVER_CONFIG")]
    config: Option<PathBuf>,

    /// Port to listen on, overriding the configured bind address.
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let config = match &args.config {
        Some(path) => load_config(path)
            .with_context(|| format!("loading configuration from {}", path.display()))?,
        None => AppConfig::default(),
    };
    let mut overrides = EnvOverrides::from_env();
    if let Some(port) = args.port {
        overrides.port = Some(port.to_string());
    }
    let config = overrides.apply(config).context("applying environment overrides")?;

    init_logging(config.environment, &config.observability);
    tracing::info!(
        environment = %config.environment,
        bind_address = %config.listener.bind_address,
        request_timeout_secs = config.timeouts.request_secs,
        rate_limit = config.rate_limit.max_requests,
        webhook_enabled = !config.payments.webhook_secret.is_empty(),
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => init_metrics(addr),
            Err(e) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                error = %e,
                "Failed to parse metrics address"
            ),
        }
    }

    let listener = TcpListener::bind(&config.listener.bind_address)
        .await
        .with_context(|| format!("binding {}", config.listener.bind_address))?;

    let shutdown = Shutdown::new();
    tokio::spawn(signals::listen(shutdown.clone()));

    let server = HttpServer::new(config)?;
    server.run(listener, shutdown).await?;

    tracing::info!("Shutdown complete");
    Ok(())
}
