//! Marquee daemon - multi-zone home AV control hub.

use anyhow::{Context, Result};
use clap::Parser;
use marquee::catalog::Catalog;
use marquee::drivers;
use marquee::router::Router;
use marquee::web::{self, WebState};
use marqueeconf::MarqueeConfig;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing_subscriber::EnvFilter;

/// The Marquee control hub
#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Cli {
    /// Config file (replaces the local marquee.toml override)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Port to listen on (overrides config)
    #[arg(short, long)]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let (config, sources) = MarqueeConfig::load_with_override(cli.config.as_deref())
        .context("Failed to load configuration")?;

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.infra.telemetry.log_level.clone()));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    for file in &sources.files {
        tracing::info!("loaded config: {}", file.display());
    }
    for var in &sources.env_overrides {
        tracing::info!("config override from {}", var);
    }

    let timeout = Duration::from_millis(config.infra.defaults.driver_timeout_ms);
    let registry = Arc::new(
        drivers::build_registry(&config.catalog, timeout)
            .context("Failed to build driver registry")?,
    );
    tracing::info!("driver registry ready ({} drivers)", registry.len());

    let catalog = Arc::new(Catalog::from_config(&config.catalog));
    tracing::info!(
        "catalog ready ({} scenes, {} zones)",
        catalog.scenes().count(),
        catalog.zones().count()
    );

    let router = Arc::new(Router::new(catalog.clone(), registry.clone()));

    let state = WebState {
        router,
        catalog,
        registry,
        start_time: Instant::now(),
    };
    let app = web::router(state);

    let port = cli.port.unwrap_or(config.infra.bind.http_port);
    let addr = format!("0.0.0.0:{}", port);
    let bind_addr: std::net::SocketAddr = addr.parse().context("Failed to parse bind address")?;
    let listener = tokio::net::TcpListener::bind(bind_addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    tracing::info!("Marquee listening on http://{}", addr);
    tracing::info!("   Activate: POST http://{}/zone/:zone/activate/:scene", addr);
    tracing::info!("   Status:   GET  http://{}/zone/:zone", addr);
    tracing::info!("   Health:   GET  http://{}/health", addr);

    let server = axum::serve(listener, app).with_graceful_shutdown(shutdown_signal());
    server.await.context("Server error")?;

    tracing::info!("Shutdown complete");
    Ok(())
}

/// Resolve on SIGINT (Ctrl+C) or SIGTERM (systemd, cargo-watch, etc.)
async fn shutdown_signal() {
    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT (Ctrl+C), shutting down gracefully...");
        }
        _ = async {
            #[cfg(unix)]
            {
                use tokio::signal::unix::{signal, SignalKind};
                let mut sigterm = signal(SignalKind::terminate()).expect("Failed to setup SIGTERM handler");
                sigterm.recv().await;
            }
            #[cfg(not(unix))]
            {
                std::future::pending::<()>().await;
            }
        } => {
            tracing::info!("Received SIGTERM, shutting down gracefully...");
        }
    }
}
