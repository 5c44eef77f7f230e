//! Open-Meteo forecast client
//!
//! Queries the JMA-backed Open-Meteo endpoint for hourly temperature,
//! humidity, wind speed and precipitation at a fixed location.

use super::aggregate::{aggregate_daily, HourlySeries};
use super::{async_trait, WeatherSource};
use crate::error::WeatherError;
use crate::models::DailyWeather;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

/// Default Open-Meteo endpoint backed by Japan Meteorological Agency models
pub const JMA_ENDPOINT: &str = "https://api.open-meteo.com/v1/jma";

/// Hourly variables requested from the provider
pub const HOURLY_VARIABLES: [&str; 4] = [
    "temperature_2m",
    "relativehumidity_2m",
    "windspeed_10m",
    "precipitation",
];

/// Configuration for the Open-Meteo client
#[derive(Debug, Clone, Deserialize)]
pub struct OpenMeteoConfig {
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_latitude")]
    pub latitude: f64,
    #[serde(default = "default_longitude")]
    pub longitude: f64,
    /// Timezone used to render timestamps and therefore to group days
    #[serde(default = "default_timezone")]
    pub timezone: String,
    /// Upper bound on a single provider request
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    /// Only needed for commercial Open-Meteo plans
    #[serde(default = "default_api_key")]
    pub api_key: Option<String>,
}

fn default_base_url() -> String {
    JMA_ENDPOINT.to_string()
}

// Tokyo
fn default_latitude() -> f64 {
    35.6895
}

fn default_longitude() -> f64 {
    139.6917
}

fn default_timezone() -> String {
    "Asia/Tokyo".to_string()
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_api_key() -> Option<String> {
    std::env::var("OPEN_METEO_API_KEY").ok().filter(|k| !k.is_empty())
}

impl Default for OpenMeteoConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            latitude: default_latitude(),
            longitude: default_longitude(),
            timezone: default_timezone(),
            timeout_secs: default_timeout_secs(),
            api_key: default_api_key(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ForecastPayload {
    hourly: Option<HourlySeries>,
}

/// Weather source backed by the Open-Meteo HTTP API
pub struct OpenMeteoClient {
    client: Client,
    endpoint: Url,
    config: OpenMeteoConfig,
}

impl OpenMeteoClient {
    pub fn new(config: OpenMeteoConfig) -> anyhow::Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        let endpoint = Url::parse(&config.base_url)?;
        Ok(Self {
            client,
            endpoint,
            config,
        })
    }

    fn query(&self, horizon_days: u32, timezone: &str) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("latitude", self.config.latitude.to_string()),
            ("longitude", self.config.longitude.to_string()),
            ("hourly", HOURLY_VARIABLES.join(",")),
            ("forecast_days", horizon_days.to_string()),
            ("timezone", timezone.to_string()),
        ];
        if let Some(key) = &self.config.api_key {
            params.push(("apikey", key.clone()));
        }
        params
    }

    async fn fetch_hourly(
        &self,
        horizon_days: u32,
        timezone: &str,
    ) -> Result<HourlySeries, WeatherError> {
        let response = self
            .client
            .get(self.endpoint.clone())
            .query(&self.query(horizon_days, timezone))
            .send()
            .await
            .map_err(|e| WeatherError::UpstreamUnavailable(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(WeatherError::UpstreamUnavailable(format!(
                "provider returned {}: {}",
                status, body
            )));
        }

        let bytes = response
            .bytes()
            .await
            .map_err(|e| WeatherError::UpstreamUnavailable(e.to_string()))?;
        let payload: ForecastPayload = serde_json::from_slice(&bytes)
            .map_err(|e| WeatherError::MalformedUpstreamData(e.to_string()))?;

        payload
            .hourly
            .ok_or_else(|| WeatherError::MalformedUpstreamData("missing 'hourly' block".to_string()))
    }
}

#[async_trait]
impl WeatherSource for OpenMeteoClient {
    async fn fetch(
        &self,
        horizon_days: u32,
        timezone: &str,
    ) -> Result<Vec<DailyWeather>, WeatherError> {
        let start = Instant::now();
        let hourly = self.fetch_hourly(horizon_days, timezone).await?;
        let days = aggregate_daily(&hourly, horizon_days as usize)?;

        if days.len() < horizon_days as usize {
            warn!(
                requested = horizon_days,
                received = days.len(),
                "Provider returned fewer days than requested"
            );
            return Err(WeatherError::MalformedUpstreamData(format!(
                "provider returned {} days, expected {}",
                days.len(),
                horizon_days
            )));
        }

        debug!(
            days = days.len(),
            elapsed_ms = start.elapsed().as_millis() as u64,
            "Weather forecast fetched"
        );
        Ok(days)
    }
}
