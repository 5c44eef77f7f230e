//! Observability infrastructure for the forecast service
//!
//! Provides:
//! - Prometheus metrics (weather fetch latency, per-model inference latency,
//!   forecast latency, error counters, loaded variant count)
//! - Structured JSON logging with tracing

use prometheus::{
    register_histogram, register_histogram_vec, register_int_counter, register_int_counter_vec,
    register_int_gauge, Histogram, HistogramVec, IntCounter, IntCounterVec, IntGauge,
};
use std::sync::OnceLock;
use tracing::{info, warn};

/// Histogram buckets for latency measurements (in seconds)
const LATENCY_BUCKETS: &[f64] = &[
    0.0005, 0.001, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0,
];

/// Global metrics instance (registered once)
static GLOBAL_METRICS: OnceLock<ForecastMetricsInner> = OnceLock::new();

struct ForecastMetricsInner {
    forecast_latency_seconds: Histogram,
    weather_fetch_latency_seconds: Histogram,
    inference_latency_seconds: HistogramVec,
    forecasts_generated: IntCounter,
    invalid_requests: IntCounter,
    weather_errors: IntCounter,
    inference_errors: IntCounterVec,
    variant_models_loaded: IntGauge,
}

impl ForecastMetricsInner {
    fn new() -> Self {
        Self {
            forecast_latency_seconds: register_histogram!(
                "sales_forecast_request_latency_seconds",
                "End-to-end time to build a forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register request_latency_seconds"),

            weather_fetch_latency_seconds: register_histogram!(
                "sales_forecast_weather_fetch_latency_seconds",
                "Time spent fetching and aggregating the weather forecast",
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register weather_fetch_latency_seconds"),

            inference_latency_seconds: register_histogram_vec!(
                "sales_forecast_inference_latency_seconds",
                "Time spent scoring the feature matrix, per model",
                &["model"],
                LATENCY_BUCKETS.to_vec()
            )
            .expect("Failed to register inference_latency_seconds"),

            forecasts_generated: register_int_counter!(
                "sales_forecast_forecasts_generated_total",
                "Total number of forecasts returned"
            )
            .expect("Failed to register forecasts_generated"),

            invalid_requests: register_int_counter!(
                "sales_forecast_invalid_requests_total",
                "Total number of rejected forecast requests"
            )
            .expect("Failed to register invalid_requests"),

            weather_errors: register_int_counter!(
                "sales_forecast_weather_errors_total",
                "Total number of weather provider failures"
            )
            .expect("Failed to register weather_errors"),

            inference_errors: register_int_counter_vec!(
                "sales_forecast_inference_errors_total",
                "Total number of model inference failures",
                &["model"]
            )
            .expect("Failed to register inference_errors"),

            variant_models_loaded: register_int_gauge!(
                "sales_forecast_variant_models_loaded",
                "Number of variant models in the registry"
            )
            .expect("Failed to register variant_models_loaded"),
        }
    }
}

/// Forecast metrics for Prometheus exposition
///
/// Lightweight handle to the global metrics instance; clones share the same
/// underlying metrics.
#[derive(Clone)]
pub struct ForecastMetrics {
    _private: (),
}

impl Default for ForecastMetrics {
    fn default() -> Self {
        Self::new()
    }
}

impl ForecastMetrics {
    pub fn new() -> Self {
        GLOBAL_METRICS.get_or_init(ForecastMetricsInner::new);
        Self { _private: () }
    }

    fn inner(&self) -> &ForecastMetricsInner {
        GLOBAL_METRICS.get().expect("Metrics not initialized")
    }

    pub fn observe_forecast_latency(&self, duration_secs: f64) {
        self.inner().forecast_latency_seconds.observe(duration_secs);
    }

    pub fn observe_weather_latency(&self, duration_secs: f64) {
        self.inner().weather_fetch_latency_seconds.observe(duration_secs);
    }

    pub fn observe_inference_latency(&self, model: &str, duration_secs: f64) {
        self.inner()
            .inference_latency_seconds
            .with_label_values(&[model])
            .observe(duration_secs);
    }

    pub fn inc_forecasts_generated(&self) {
        self.inner().forecasts_generated.inc();
    }

    pub fn inc_invalid_requests(&self) {
        self.inner().invalid_requests.inc();
    }

    pub fn inc_weather_errors(&self) {
        self.inner().weather_errors.inc();
    }

    pub fn inc_inference_errors(&self, model: &str) {
        self.inner().inference_errors.with_label_values(&[model]).inc();
    }

    pub fn set_variant_models_loaded(&self, count: i64) {
        self.inner().variant_models_loaded.set(count);
    }
}

/// Structured logger for service events
#[derive(Clone)]
pub struct StructuredLogger {
    location: String,
}

impl StructuredLogger {
    /// `location` tags every event, e.g. the forecast site name
    pub fn new(location: impl Into<String>) -> Self {
        Self {
            location: location.into(),
        }
    }

    pub fn log_startup(&self, version: &str, variant_ids: &[String]) {
        info!(
            event = "service_started",
            location = %self.location,
            service_version = %version,
            variant_models = ?variant_ids,
            "Forecast service started"
        );
    }

    pub fn log_shutdown(&self, reason: &str) {
        info!(
            event = "service_shutdown",
            location = %self.location,
            reason = %reason,
            "Forecast service shutting down"
        );
    }

    pub fn log_forecast(&self, days: usize, variants: usize, elapsed_ms: u64) {
        info!(
            event = "forecast_generated",
            location = %self.location,
            days = days,
            variant_models = variants,
            elapsed_ms = elapsed_ms,
            "Generated sales forecast"
        );
    }

    pub fn log_inference_failure(&self, model: &str, cause: &str) {
        warn!(
            event = "inference_failed",
            location = %self.location,
            model = %model,
            cause = %cause,
            "Model inference failed"
        );
    }

    pub fn log_weather_failure(&self, error: &str) {
        warn!(
            event = "weather_fetch_failed",
            location = %self.location,
            error = %error,
            "Weather forecast unavailable"
        );
    }
}
