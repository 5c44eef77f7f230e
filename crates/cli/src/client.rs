//! API client for communicating with the forecast service

use anyhow::{Context, Result};
use reqwest::{Client, StatusCode};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use url::Url;

/// Non-success response from the service
#[derive(Debug, Error)]
#[error("API error ({status}): {message}")]
pub struct ApiError {
    pub status: StatusCode,
    pub code: Option<String>,
    pub message: String,
    pub model: Option<String>,
}

impl ApiError {
    fn from_body(status: StatusCode, body: &str) -> Self {
        match serde_json::from_str::<ErrorResponse>(body) {
            Ok(parsed) => Self {
                status,
                code: Some(parsed.error.code),
                message: parsed.error.message,
                model: parsed.error.model,
            },
            Err(_) => Self {
                status,
                code: None,
                message: body.to_string(),
                model: None,
            },
        }
    }
}

/// API client for the forecast service
pub struct ApiClient {
    client: Client,
    base_url: Url,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;

        let base_url = Url::parse(base_url).context("Invalid API URL")?;

        Ok(Self { client, base_url })
    }

    /// Make a GET request, failing on any non-success status
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        let (status, body) = self.fetch(path).await?;
        if !status.is_success() {
            return Err(ApiError::from_body(status, &body).into());
        }
        serde_json::from_str(&body).context("Failed to parse response")
    }

    /// Make a GET request whose body is meaningful on 503 too (health checks)
    pub async fn get_with_status<T: DeserializeOwned>(&self, path: &str) -> Result<(StatusCode, T)> {
        let (status, body) = self.fetch(path).await?;
        if !status.is_success() && status != StatusCode::SERVICE_UNAVAILABLE {
            return Err(ApiError::from_body(status, &body).into());
        }
        let parsed = serde_json::from_str(&body).context("Failed to parse response")?;
        Ok((status, parsed))
    }

    async fn fetch(&self, path: &str) -> Result<(StatusCode, String)> {
        let url = self.base_url.join(path).context("Invalid path")?;

        let response = self
            .client
            .get(url)
            .send()
            .await
            .context("Failed to send request")?;

        let status = response.status();
        let body = response.text().await.context("Failed to read response body")?;
        Ok((status, body))
    }

    pub async fn forecast(&self, days: i64) -> Result<ForecastResponse> {
        self.get(&format!("forecast?days={}", days)).await
    }

    pub async fn health(&self) -> Result<(StatusCode, HealthResponse)> {
        self.get_with_status("healthz").await
    }

    pub async fn readiness(&self) -> Result<(StatusCode, ReadinessResponse)> {
        self.get_with_status("readyz").await
    }
}

// API response types

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub predictions: Vec<ForecastDay>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastDay {
    pub date: String,
    pub weekday: String,
    pub total: Option<f64>,
    /// Per-variant predictions
    #[serde(flatten)]
    pub variants: BTreeMap<String, Option<f64>>,
}

impl ForecastResponse {
    /// Variant identifiers present in the response, ascending
    pub fn variant_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self
            .predictions
            .iter()
            .flat_map(|day| day.variants.keys().cloned())
            .collect();
        ids.sort();
        ids.dedup();
        ids
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub components: BTreeMap<String, ComponentHealth>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub last_check_timestamp: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReadinessResponse {
    pub ready: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_forecast_parses_variants() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("GET", "/forecast?days=2")
            .with_status(200)
            .with_header("content-type", "application/json")
            .with_body(
                r#"{"predictions": [
                    {"date": "2025-06-21", "weekday": "土", "total": 120.5, "asahi": 40.0},
                    {"date": "2025-06-22", "weekday": "日", "total": null, "asahi": null}
                ]}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let forecast = client.forecast(2).await.unwrap();

        mock.assert_async().await;
        assert_eq!(forecast.predictions.len(), 2);
        assert_eq!(forecast.predictions[0].total, Some(120.5));
        assert_eq!(forecast.predictions[0].variants["asahi"], Some(40.0));
        assert_eq!(forecast.predictions[1].total, None);
        assert_eq!(forecast.variant_ids(), vec!["asahi".to_string()]);
    }

    #[tokio::test]
    async fn test_error_body_is_decoded() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/forecast?days=3")
            .with_status(500)
            .with_body(
                r#"{"error": {"code": "PREDICTION_FAILED", "message": "bad shape", "model": "kirin"}}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.forecast(3).await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();

        assert_eq!(api_err.status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(api_err.code.as_deref(), Some("PREDICTION_FAILED"));
        assert_eq!(api_err.model.as_deref(), Some("kirin"));
    }

    #[tokio::test]
    async fn test_plain_error_body_kept_verbatim() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/forecast?days=0")
            .with_status(400)
            .with_body("Bad Request")
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let err = client.forecast(0).await.unwrap_err();
        let api_err = err.downcast_ref::<ApiError>().unwrap();

        assert_eq!(api_err.code, None);
        assert_eq!(api_err.message, "Bad Request");
    }

    #[tokio::test]
    async fn test_health_accepts_unavailable() {
        let mut server = mockito::Server::new_async().await;
        let _mock = server
            .mock("GET", "/healthz")
            .with_status(503)
            .with_body(
                r#"{"status": "unhealthy", "components": {
                    "models": {"status": "unhealthy", "message": "missing", "last_check_timestamp": 1750000000}
                }}"#,
            )
            .create_async()
            .await;

        let client = ApiClient::new(&server.url()).unwrap();
        let (status, health) = client.health().await.unwrap();

        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(health.status, "unhealthy");
        assert_eq!(health.components["models"].message.as_deref(), Some("missing"));
    }

    #[test]
    fn test_invalid_base_url() {
        assert!(ApiClient::new("not a url").is_err());
    }
}
