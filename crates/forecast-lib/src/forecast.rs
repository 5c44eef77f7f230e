//! Forecast assembly
//!
//! Runs weather fetch, feature encoding and model fan-out for one request,
//! then lays the per-model outputs back onto their days.

use crate::error::{ForecastError, InferenceError};
use crate::health::{components, HealthRegistry};
use crate::models::{DailyWeather, ForecastDay};
use crate::observability::{ForecastMetrics, StructuredLogger};
use crate::predictor::{predict, FeatureEncoder, FeatureMatrix, ModelRegistry, PredictionModel, PRIMARY_MODEL};
use crate::weather::WeatherSource;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;
use tokio::task::JoinHandle;
use tracing::debug;

pub const MIN_HORIZON_DAYS: i64 = 1;
pub const MAX_HORIZON_DAYS: i64 = 11;
pub const DEFAULT_HORIZON_DAYS: i64 = 7;

/// Validate a requested horizon, returning it as a day count
pub fn validate_horizon(days: i64) -> Result<u32, ForecastError> {
    if !(MIN_HORIZON_DAYS..=MAX_HORIZON_DAYS).contains(&days) {
        return Err(ForecastError::InvalidRequest(format!(
            "days must be between {} and {}, got {}",
            MIN_HORIZON_DAYS, MAX_HORIZON_DAYS, days
        )));
    }
    Ok(days as u32)
}

/// Per-model outputs for one feature matrix, aligned by row
#[derive(Debug, Clone, PartialEq)]
pub struct ModelOutputs {
    pub primary: Vec<f32>,
    pub variants: BTreeMap<String, Vec<f32>>,
}

type InferenceTask = JoinHandle<(Result<Vec<f32>, InferenceError>, f64)>;

/// Builds forecasts from a weather source and a loaded model registry
pub struct ForecastAssembler {
    weather: Arc<dyn WeatherSource>,
    registry: Arc<ModelRegistry>,
    encoder: FeatureEncoder,
    timezone: String,
    metrics: ForecastMetrics,
    logger: StructuredLogger,
    health: Option<HealthRegistry>,
}

impl ForecastAssembler {
    pub fn new(
        weather: Arc<dyn WeatherSource>,
        registry: Arc<ModelRegistry>,
        timezone: impl Into<String>,
    ) -> Self {
        let timezone = timezone.into();
        Self {
            weather,
            registry,
            encoder: FeatureEncoder::new(),
            logger: StructuredLogger::new(timezone.clone()),
            timezone,
            metrics: ForecastMetrics::new(),
            health: None,
        }
    }

    /// Report weather provider and model status to `health`
    pub fn with_health(mut self, health: HealthRegistry) -> Self {
        self.health = Some(health);
        self
    }

    pub fn with_logger(mut self, logger: StructuredLogger) -> Self {
        self.logger = logger;
        self
    }

    /// Build the per-day forecast for the next `days` days.
    ///
    /// The horizon is validated before any network or model call. Any model
    /// failure aborts the whole request; no partial forecast is returned.
    pub async fn build_forecast(&self, days: i64) -> Result<Vec<ForecastDay>, ForecastError> {
        let horizon = match validate_horizon(days) {
            Ok(h) => h,
            Err(e) => {
                self.metrics.inc_invalid_requests();
                return Err(e);
            }
        };
        let start = Instant::now();

        let rows = self.fetch_weather(horizon).await?;
        let matrix = Arc::new(self.encoder.encode_matrix(&rows));
        let outputs = self.run_models(matrix).await?;
        let forecast = assemble(&rows, &outputs);

        let elapsed = start.elapsed();
        self.metrics.observe_forecast_latency(elapsed.as_secs_f64());
        self.metrics.inc_forecasts_generated();
        self.logger.log_forecast(
            forecast.len(),
            outputs.variants.len(),
            elapsed.as_millis() as u64,
        );
        Ok(forecast)
    }

    async fn fetch_weather(&self, horizon: u32) -> Result<Vec<DailyWeather>, ForecastError> {
        let start = Instant::now();
        let result = self.weather.fetch(horizon, &self.timezone).await;
        self.metrics.observe_weather_latency(start.elapsed().as_secs_f64());

        match result {
            Ok(rows) => {
                if let Some(health) = &self.health {
                    health.set_healthy(components::WEATHER).await;
                }
                debug!(days = rows.len(), "Weather rows received");
                Ok(rows)
            }
            Err(e) => {
                self.metrics.inc_weather_errors();
                self.logger.log_weather_failure(&e.to_string());
                if let Some(health) = &self.health {
                    health.set_degraded(components::WEATHER, e.to_string()).await;
                }
                Err(e.into())
            }
        }
    }

    /// Score `matrix` with every model in parallel.
    ///
    /// All outcomes are collected before deciding; the reported failure is the
    /// first in primary-then-variant-identifier order.
    pub async fn run_models(&self, matrix: Arc<FeatureMatrix>) -> Result<ModelOutputs, ForecastError> {
        let primary_task = spawn_inference(self.registry.primary(), &matrix);
        let variant_tasks: Vec<(String, InferenceTask)> = self
            .registry
            .variants()
            .iter()
            .map(|(id, model)| (id.clone(), spawn_inference(model, &matrix)))
            .collect();

        let primary = self
            .join_inference(PRIMARY_MODEL, primary_task)
            .await
            .map_err(|e| InferenceError::new(PRIMARY_MODEL, e.cause));

        let mut variants = BTreeMap::new();
        let mut first_variant_error = None;
        for (id, task) in variant_tasks {
            match self.join_inference(&id, task).await {
                Ok(values) => {
                    variants.insert(id, values);
                }
                Err(e) => {
                    first_variant_error.get_or_insert(e);
                }
            }
        }

        self.report_model_health(primary.as_ref().err(), first_variant_error.as_ref())
            .await;

        let primary = primary?;
        if let Some(e) = first_variant_error {
            return Err(e.into());
        }
        Ok(ModelOutputs { primary, variants })
    }

    /// Primary failures make the service unable to forecast; variant
    /// failures only degrade it.
    async fn report_model_health(
        &self,
        primary_error: Option<&InferenceError>,
        variant_error: Option<&InferenceError>,
    ) {
        let Some(health) = &self.health else {
            return;
        };
        match (primary_error, variant_error) {
            (Some(e), _) => health.set_unhealthy(components::MODELS, e.to_string()).await,
            (None, Some(e)) => health.set_degraded(components::MODELS, e.to_string()).await,
            (None, None) => health.set_healthy(components::MODELS).await,
        }
    }

    async fn join_inference(&self, id: &str, task: InferenceTask) -> Result<Vec<f32>, InferenceError> {
        let outcome = match task.await {
            Ok((result, elapsed_secs)) => {
                self.metrics.observe_inference_latency(id, elapsed_secs);
                result
            }
            Err(e) => Err(InferenceError::new(id, format!("inference task failed: {}", e))),
        };
        if let Err(e) = &outcome {
            self.metrics.inc_inference_errors(id);
            self.logger.log_inference_failure(id, &e.cause);
        }
        outcome
    }
}

fn spawn_inference(model: &Arc<dyn PredictionModel>, matrix: &Arc<FeatureMatrix>) -> InferenceTask {
    let model = Arc::clone(model);
    let matrix = Arc::clone(matrix);
    tokio::task::spawn_blocking(move || {
        let start = Instant::now();
        let result = predict(model.as_ref(), &matrix);
        (result, start.elapsed().as_secs_f64())
    })
}

/// Lay model outputs onto their days, nulling every prediction on the
/// suppressed weekday.
pub fn assemble(rows: &[DailyWeather], outputs: &ModelOutputs) -> Vec<ForecastDay> {
    rows.iter()
        .enumerate()
        .map(|(i, day)| {
            let suppressed = day.is_suppressed();
            let value = |values: &[f32]| {
                if suppressed {
                    None
                } else {
                    values.get(i).map(|&v| v as f64)
                }
            };

            ForecastDay {
                date: day.date,
                weekday: day.weekday_label().to_string(),
                total: value(&outputs.primary),
                variants: outputs
                    .variants
                    .iter()
                    .map(|(id, values)| (id.clone(), value(values)))
                    .collect(),
            }
        })
        .collect()
}
