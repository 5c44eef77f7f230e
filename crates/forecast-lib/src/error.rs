//! Error types for the forecast pipeline

use std::path::PathBuf;
use thiserror::Error;

/// Failures talking to, or decoding data from, the weather provider
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WeatherError {
    #[error("weather provider unavailable: {0}")]
    UpstreamUnavailable(String),

    #[error("malformed weather data: {0}")]
    MalformedUpstreamData(String),
}

/// A single model failed to score a feature matrix
#[derive(Error, Debug, Clone, PartialEq)]
#[error("inference failed for model '{model}': {cause}")]
pub struct InferenceError {
    pub model: String,
    pub cause: String,
}

impl InferenceError {
    pub fn new(model: impl Into<String>, cause: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            cause: cause.into(),
        }
    }
}

/// Startup-time failure loading a model file
#[derive(Error, Debug)]
pub enum ModelLoadError {
    #[error("failed to read model {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to build model {path:?}: {message}")]
    Invalid { path: PathBuf, message: String },
}

/// Request-level failure of `ForecastAssembler::build_forecast`
#[derive(Error, Debug)]
pub enum ForecastError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Weather(#[from] WeatherError),

    #[error("prediction failed for model '{model}': {cause}")]
    PredictionFailed { model: String, cause: String },
}

impl From<InferenceError> for ForecastError {
    fn from(err: InferenceError) -> Self {
        ForecastError::PredictionFailed {
            model: err.model,
            cause: err.cause,
        }
    }
}
