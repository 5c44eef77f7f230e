//! Library for weather-driven beer sales forecasting
//!
//! This crate provides the core functionality for:
//! - Fetching and aggregating hourly weather forecasts
//! - Encoding daily weather into model features
//! - Loading and running ONNX sales models
//! - Assembling per-day forecasts
//! - Health checks and observability

pub mod error;
pub mod forecast;
pub mod health;
pub mod models;
pub mod observability;
pub mod predictor;
pub mod weather;

pub use error::{ForecastError, InferenceError, ModelLoadError, WeatherError};
pub use forecast::{ForecastAssembler, DEFAULT_HORIZON_DAYS, MAX_HORIZON_DAYS, MIN_HORIZON_DAYS};
pub use health::{
    ComponentHealth, ComponentStatus, HealthRegistry, HealthResponse, ReadinessResponse,
};
pub use models::*;
pub use observability::{ForecastMetrics, StructuredLogger};
