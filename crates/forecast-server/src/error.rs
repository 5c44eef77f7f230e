//! HTTP error responses

use axum::{
    extract::rejection::QueryRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use forecast_lib::{ForecastError, WeatherError};
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ApiError {
    #[error(transparent)]
    Forecast(#[from] ForecastError),

    #[error("invalid query: {0}")]
    InvalidQuery(#[from] QueryRejection),

    #[error("Metrics encoding failed: {0}")]
    Metrics(#[from] prometheus::Error),
}

/// Error body: `{"error": {"code", "message", "model"?}}`
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            model: None,
        }
    }
}

impl ApiError {
    fn status_and_detail(&self) -> (StatusCode, ErrorDetail) {
        match self {
            ApiError::Forecast(ForecastError::InvalidRequest(msg)) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_REQUEST", msg.clone()),
            ),
            ApiError::InvalidQuery(rejection) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("INVALID_REQUEST", rejection.body_text()),
            ),
            ApiError::Forecast(ForecastError::Weather(WeatherError::UpstreamUnavailable(msg))) => (
                StatusCode::SERVICE_UNAVAILABLE,
                ErrorDetail::new(
                    "WEATHER_UNAVAILABLE",
                    format!("Weather provider unavailable: {}", msg),
                ),
            ),
            ApiError::Forecast(ForecastError::Weather(WeatherError::MalformedUpstreamData(msg))) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new(
                    "MALFORMED_WEATHER_DATA",
                    format!("Weather provider returned unusable data: {}", msg),
                ),
            ),
            ApiError::Forecast(ForecastError::PredictionFailed { model, cause }) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "PREDICTION_FAILED".to_string(),
                    message: cause.clone(),
                    model: Some(model.clone()),
                },
            ),
            ApiError::Metrics(e) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", e.to_string()),
            ),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = self.status_and_detail();

        if status.is_server_error() {
            tracing::error!(code = %detail.code, error = %self, "Request failed");
        } else {
            tracing::warn!(code = %detail.code, error = %self, "Request rejected");
        }

        (status, Json(ErrorResponse { error: detail })).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    fn status_of(err: ForecastError) -> (StatusCode, ErrorDetail) {
        ApiError::from(err).status_and_detail()
    }

    #[test]
    fn test_status_mapping() {
        let (status, detail) = status_of(ForecastError::InvalidRequest("days".into()));
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(detail.code, "INVALID_REQUEST");

        let (status, _) = status_of(WeatherError::UpstreamUnavailable("down".into()).into());
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);

        let (status, _) = status_of(WeatherError::MalformedUpstreamData("no hourly".into()).into());
        assert_eq!(status, StatusCode::BAD_GATEWAY);
    }

    #[test]
    fn test_prediction_failure_names_model() {
        let (status, detail) = status_of(ForecastError::PredictionFailed {
            model: "asahi".into(),
            cause: "shape mismatch".into(),
        });
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(detail.model.as_deref(), Some("asahi"));

        let json = serde_json::to_value(ErrorResponse { error: detail }).unwrap();
        assert_eq!(json["error"]["code"], "PREDICTION_FAILED");
        assert_eq!(json["error"]["model"], "asahi");
    }

    #[test]
    fn test_model_omitted_when_absent() {
        let (_, detail) = status_of(ForecastError::InvalidRequest("days".into()));
        let json = serde_json::to_value(ErrorResponse { error: detail }).unwrap();
        assert!(json["error"].get("model").is_none());
    }
}
