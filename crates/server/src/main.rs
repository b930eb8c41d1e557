mod api;
mod bootstrap;
mod health;

use anyhow::Result;
use pubscope_core::config::{AppConfig, LoadOptions};
use tracing::{error, info};

fn init_logging(config: &AppConfig) {
    use pubscope_core::config::LogFormat::*;
    use tracing::Level;

    let log_level = config.logging.level.parse::<Level>().unwrap_or(Level::INFO);

    match config.logging.format {
        Compact => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).compact().init();
        }
        Pretty => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).pretty().init();
        }
        Json => {
            tracing_subscriber::fmt().with_target(false).with_max_level(log_level).json().init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    run().await
}

pub async fn run() -> Result<()> {
    // Logging must be configured before bootstrap emits its first event.
    let config = AppConfig::load(LoadOptions::default())?;
    init_logging(&config);

    let app = bootstrap::bootstrap_with_config(config).await?;
    let (config, db_pool, api_state) = app.api_state();

    let address = format!("{}:{}", config.server.bind_address, config.server.port);
    let listener = tokio::net::TcpListener::bind(&address).await?;
    let router = api::router(api_state).merge(health::router(db_pool.clone()));

    info!(
        event_name = "system.server.started",
        correlation_id = "bootstrap",
        bind_address = %address,
        tier_a_max_pct = %config.engine.tier_a_max_pct,
        tier_b_max_pct = %config.engine.tier_b_max_pct,
        "pubscope-server listening"
    );

    if let Err(serve_error) =
        axum::serve(listener, router).with_graceful_shutdown(wait_for_shutdown()).await
    {
        error!(
            event_name = "system.server.error",
            correlation_id = "shutdown",
            error = %serve_error,
            "server terminated unexpectedly"
        );
        return Err(serve_error.into());
    }

    info!(event_name = "system.server.stopping", correlation_id = "shutdown", "pubscope-server stopping");
    db_pool.close().await;

    Ok(())
}

async fn wait_for_shutdown() {
    if let Err(signal_error) = tokio::signal::ctrl_c().await {
        error!(
            event_name = "system.server.signal_error",
            correlation_id = "shutdown",
            error = %signal_error,
            "failed to listen for shutdown signal"
        );
    }
}
