use agro_core_rs::services::alert_dedup::{AlertDedup, DedupSweepService};
use agro_core_rs::services::broadcast::Broadcaster;
use agro_core_rs::{cli, config, db, routes, state};
use anyhow::{Context, Result};
use axum::http::HeaderValue;
use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tower_http::cors::{Any, CorsLayer};

async fn bind_listener(addr: &str) -> Result<TcpListener> {
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if err.kind() == std::io::ErrorKind::AddrInUse => {
            anyhow::bail!(
                "Failed to bind agro-core-rs listener on {addr}: port already in use. Stop the other service using this port or re-run with --port to choose another port.",
            );
        }
        Err(err) => {
            Err(err).with_context(|| format!("failed to bind agro-core-rs listener on {addr}"))
        }
    }
}

fn cors_layer(origin: Option<&str>) -> Result<CorsLayer> {
    let Some(origin) = origin else {
        return Ok(CorsLayer::permissive());
    };
    let origin = origin
        .parse::<HeaderValue>()
        .with_context(|| format!("invalid AGRO_CORS_ORIGIN value {origin}"))?;
    Ok(CorsLayer::new()
        .allow_origin(origin)
        .allow_methods(Any)
        .allow_headers(Any))
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "failed to listen for shutdown signal");
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = cli::Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = config::CoreConfig::from_env()?;
    let pool = db::connect_lazy(&config.database_url)?;

    let alert_dedup = Arc::new(AlertDedup::new(chrono::Duration::seconds(
        config.dedup_window_seconds,
    )));
    let broadcaster = Broadcaster::new(config.broadcast_capacity);

    let state = state::AppState {
        config: config.clone(),
        db: pool,
        broadcaster,
        alert_dedup: alert_dedup.clone(),
    };

    let cancel = CancellationToken::new();
    DedupSweepService::new(
        alert_dedup,
        Duration::from_secs(config.dedup_sweep_interval_seconds.max(1)),
    )
    .start(cancel.clone());

    let app = routes::router(state).layer(cors_layer(config.cors_origin.as_deref())?);
    let addr = format!("{}:{}", args.host, args.port);
    let listener = bind_listener(&addr).await?;
    tracing::info!(%addr, "agro-core-rs listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    cancel.cancel();
    Ok(())
}
