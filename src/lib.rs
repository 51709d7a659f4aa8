pub mod aggregate;
pub mod api;
pub mod config;
pub mod core;
pub mod providers;
pub mod sdmx;

use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::{debug, info};

use crate::aggregate::Aggregator;
use crate::config::AppConfig;

pub enum AppCommand {
    Serve,
    Lookup { country: String },
}

pub fn load_config(config_path: Option<&str>) -> Result<AppConfig> {
    let config = match config_path {
        Some(path) => AppConfig::load_from_path(path)?,
        None => AppConfig::load()?,
    };
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(command: AppCommand, config_path: Option<&str>) -> Result<()> {
    let config = load_config(config_path)?;
    let aggregator = Aggregator::from_config(&config);

    match command {
        AppCommand::Serve => serve(&config, aggregator).await,
        AppCommand::Lookup { country } => {
            println!("{}", lookup_body(&aggregator, &country).await?);
            Ok(())
        }
    }
}

/// Renders the endpoint's JSON body for `country`, including the
/// `{"error": ...}` shape when aggregation fails.
pub async fn lookup_body(aggregator: &Aggregator, country: &str) -> Result<String> {
    let body = match aggregator.aggregate(country).await {
        Ok(response) => serde_json::to_string_pretty(&response)?,
        Err(e) => {
            tracing::error!(error = ?e, country, "Error fetching data");
            serde_json::to_string_pretty(&api::ErrorBody {
                error: api::FETCH_FAILED,
            })?
        }
    };
    Ok(body)
}

pub async fn serve(config: &AppConfig, aggregator: Aggregator) -> Result<()> {
    let addr = config.server.bind_addr();
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {addr}"))?;
    info!("Listening on {}", listener.local_addr()?);

    axum::serve(listener, api::router(Arc::new(aggregator)))
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
    info!("Shutting down");
}
