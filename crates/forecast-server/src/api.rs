//! HTTP API: forecast, health checks and Prometheus metrics

use crate::config::ServerConfig;
use crate::error::{ApiError, ApiResult};
use axum::{
    extract::{rejection::QueryRejection, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use forecast_lib::{
    ComponentStatus, ForecastAssembler, ForecastMetrics, ForecastResponse, HealthRegistry,
    DEFAULT_HORIZON_DAYS,
};
use prometheus::{Encoder, TextEncoder};
use serde::Deserialize;
use std::future::Future;
use std::sync::Arc;
use tracing::info;

/// Shared application state
#[derive(Clone)]
pub struct AppState {
    pub assembler: Arc<ForecastAssembler>,
    pub health_registry: HealthRegistry,
    pub metrics: ForecastMetrics,
}

impl AppState {
    pub fn new(
        assembler: Arc<ForecastAssembler>,
        health_registry: HealthRegistry,
        metrics: ForecastMetrics,
    ) -> Self {
        Self {
            assembler,
            health_registry,
            metrics,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub days: Option<i64>,
}

/// `GET /forecast?days=N`
async fn forecast(
    State(state): State<Arc<AppState>>,
    query: Result<Query<ForecastQuery>, QueryRejection>,
) -> ApiResult<Json<ForecastResponse>> {
    let Query(query) = query.map_err(|rejection| {
        state.metrics.inc_invalid_requests();
        ApiError::from(rejection)
    })?;
    let days = query.days.unwrap_or(DEFAULT_HORIZON_DAYS);
    let predictions = state.assembler.build_forecast(days).await?;
    Ok(Json(ForecastResponse { predictions }))
}

/// 200 while operational, 503 once a component is unhealthy
async fn healthz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let health = state.health_registry.health().await;

    let status_code = match health.status {
        ComponentStatus::Healthy | ComponentStatus::Degraded => StatusCode::OK,
        ComponentStatus::Unhealthy => StatusCode::SERVICE_UNAVAILABLE,
    };

    (status_code, Json(health))
}

async fn readyz(State(state): State<Arc<AppState>>) -> impl IntoResponse {
    let readiness = state.health_registry.readiness().await;

    let status_code = if readiness.ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };

    (status_code, Json(readiness))
}

async fn metrics() -> ApiResult<impl IntoResponse> {
    let encoder = TextEncoder::new();
    let metric_families = prometheus::gather();
    let mut buffer = Vec::new();

    encoder.encode(&metric_families, &mut buffer)?;

    Ok((
        StatusCode::OK,
        [("content-type", "text/plain; charset=utf-8")],
        buffer,
    ))
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/forecast", get(forecast))
        .route("/healthz", get(healthz))
        .route("/readyz", get(readyz))
        .route("/metrics", get(metrics))
        .with_state(state)
}

/// Serve until `shutdown` resolves
pub async fn serve<F>(config: &ServerConfig, state: Arc<AppState>, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let app = create_router(state);

    let addr = config.bind_addr();
    info!(addr = %addr, "Starting API server");

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown)
        .await?;

    Ok(())
}
