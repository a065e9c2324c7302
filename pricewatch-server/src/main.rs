//! # Pricewatch Server
//!
//! Unattended price-refresh service. On a fixed interval (or at a
//! configured time of day) it lists tracked instruments from the
//! backend registry, scrapes each one's live quote through a headless
//! browser with bounded retry, and writes successful prices back.
//! A liveness endpoint runs alongside the scheduler; the two share
//! nothing but the shutdown token.

mod routes;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::Parser;
use futures::FutureExt;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pricewatch_config::Config;
use pricewatch_core::browser::BrowserConfig;
use pricewatch_core::{
    FetchOrchestrator, FtQuoteScraper, RegistryClient, Scheduler, Trigger,
};

/// Tick interval of the scheduler loop; bounds cancellation latency.
const SCHEDULER_TICK: Duration = Duration::from_secs(1);

/// CLI entry point
#[derive(Parser, Debug)]
#[command(name = "pricewatch-server")]
#[command(about = "Scheduled price-refresh service with registry sync and a liveness endpoint")]
struct Cli {
    /// Health listener host (overrides config)
    #[arg(long, env = "SERVER_HOST")]
    host: Option<String>,

    /// Health listener port (overrides config)
    #[arg(short, long, env = "SERVER_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                // Keep request traces (health probes included) out of
                // the operational stream. Override via RUST_LOG.
                .unwrap_or_else(|_| "info,tower_http=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let mut config =
        Config::from_env().context("failed to load configuration")?;
    if let Some(host) = cli.host {
        config.server.host = host;
    }
    if let Some(port) = cli.port {
        config.server.port = port;
    }

    info!(
        backend = %config.backend_url,
        webdriver = %config.webdriver_url,
        quote_page = %config.quote_url,
        headless = config.headless,
        "configuration loaded"
    );

    let registry = RegistryClient::new(
        reqwest::Client::new(),
        config.backend_url.clone(),
    );
    let scraper = FtQuoteScraper::new(
        BrowserConfig {
            webdriver_url: config.webdriver_url.clone(),
            headless: config.headless,
        },
        config.quote_url.clone(),
    );
    let orchestrator = Arc::new(FetchOrchestrator::new(registry, scraper));

    let trigger = match config.fetch_at {
        Some(time) => {
            info!(%time, "scheduling daily fetch cycle");
            Trigger::DailyAt(time)
        }
        None => {
            info!(
                interval_secs = config.fetch_interval.as_secs(),
                "scheduling fixed-interval fetch cycle"
            );
            Trigger::FixedInterval(config.fetch_interval)
        }
    };

    let mut scheduler = Scheduler::new();
    scheduler
        .register(trigger, move || {
            let orchestrator = orchestrator.clone();
            async move {
                orchestrator.run_cycle().await;
            }
            .boxed()
        })
        .context("failed to register the fetch cycle")?;

    let shutdown = CancellationToken::new();

    let addr: SocketAddr =
        format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .context("invalid health listener host/port")?;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind health listener on {addr}"))?;
    info!(%addr, "health endpoint listening");

    let server_shutdown = shutdown.clone();
    let server = tokio::spawn(async move {
        let app = routes::create_router();
        let result = axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                server_shutdown.cancelled().await;
            })
            .await;
        if let Err(err) = result {
            error!(error = %err, "health server failed");
        }
    });

    let scheduler_task =
        tokio::spawn(scheduler.run(SCHEDULER_TICK, shutdown.clone()));

    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for the shutdown signal")?;
    info!("shutdown signal received");
    shutdown.cancel();

    // An in-flight cycle runs to completion; nothing new is scheduled.
    scheduler_task.await.context("scheduler task panicked")?;
    server.await.context("health server task panicked")?;
    info!("shutdown complete");

    Ok(())
}
