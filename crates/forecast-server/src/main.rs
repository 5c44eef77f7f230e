//! Forecast server - weather-driven beer sales forecasts over HTTP
//!
//! Loads every model once at startup, then serves `/forecast` alongside
//! health and metrics endpoints until interrupted.

use anyhow::{Context, Result};
use forecast_lib::{
    health::components,
    predictor::{ModelRegistry, OnnxLoader},
    weather::OpenMeteoClient,
    ForecastAssembler, ForecastMetrics, HealthRegistry, StructuredLogger,
};
use forecast_server::{api, config::ServiceConfig};
use std::sync::Arc;
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const SERVICE_VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize tracing with JSON output and env filter
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(fmt::layer().json())
        .init();

    info!("Starting forecast-server");

    let config = ServiceConfig::load().context("Failed to load configuration")?;
    info!(
        timezone = %config.weather.timezone,
        latitude = config.weather.latitude,
        longitude = config.weather.longitude,
        "Service configured"
    );

    let health_registry = HealthRegistry::new();
    health_registry.register(components::WEATHER).await;
    health_registry.register(components::MODELS).await;

    let metrics = ForecastMetrics::new();
    let logger = StructuredLogger::new(&config.weather.timezone);

    // Models load before the listener binds; a bad primary model is fatal
    let model_config = config.models.clone();
    let registry = tokio::task::spawn_blocking(move || ModelRegistry::load(&model_config, &OnnxLoader))
        .await
        .context("Model loading task panicked")?
        .context("Failed to load models")?;
    let registry = Arc::new(registry);
    metrics.set_variant_models_loaded(registry.variant_count() as i64);

    let weather = Arc::new(OpenMeteoClient::new(config.weather.clone())?);
    let assembler = ForecastAssembler::new(weather, registry.clone(), config.weather.timezone.clone())
        .with_health(health_registry.clone())
        .with_logger(logger.clone());

    let app_state = Arc::new(api::AppState::new(
        Arc::new(assembler),
        health_registry.clone(),
        metrics,
    ));

    health_registry.set_ready(true).await;
    logger.log_startup(SERVICE_VERSION, &registry.variant_ids());

    let shutdown_logger = logger.clone();
    api::serve(&config.server, app_state, async move {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for shutdown signal");
        }
        shutdown_logger.log_shutdown("SIGINT received");
    })
    .await?;

    info!("Shutting down");
    Ok(())
}
