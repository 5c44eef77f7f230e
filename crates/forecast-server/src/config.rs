//! Service configuration
//!
//! Sources, later overriding earlier:
//! 1. Defaults in code (honouring `MODEL_PATH`, `MODEL_DIR`, `OPEN_METEO_API_KEY`)
//! 2. Optional `config/forecast.{toml,yaml,json}`
//! 3. `FORECAST_` environment variables, `__` between sections
//!    (e.g. `FORECAST_SERVER__PORT=9000`)

use anyhow::Result;
use forecast_lib::predictor::ModelConfig;
use forecast_lib::weather::OpenMeteoConfig;
use serde::Deserialize;

const CONFIG_FILE: &str = "config/forecast";
const ENV_PREFIX: &str = "FORECAST";

/// Top-level service configuration
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceConfig {
    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub weather: OpenMeteoConfig,

    #[serde(default)]
    pub models: ModelConfig,
}

/// HTTP listener settings
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
        }
    }
}

impl ServerConfig {
    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

fn environment() -> config::Environment {
    config::Environment::with_prefix(ENV_PREFIX)
        .prefix_separator("_")
        .separator("__")
        .try_parsing(true)
}

impl ServiceConfig {
    /// Load configuration from the optional config file and environment
    pub fn load() -> Result<Self> {
        Self::from_builder(
            config::Config::builder()
                .add_source(config::File::with_name(CONFIG_FILE).required(false))
                .add_source(environment()),
        )
    }

    fn from_builder(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<Self> {
        Ok(builder.build()?.try_deserialize()?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_defaults() {
        let config = ServiceConfig::from_builder(config::Config::builder()).unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.weather.timezone, "Asia/Tokyo");
        assert_eq!(config.weather.latitude, 35.6895);
        assert_eq!(config.models.variant_prefix, "sales_forecast_");
        assert_eq!(config.models.variant_extension, "onnx");
    }

    #[test]
    fn test_file_overrides() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forecast.toml");
        std::fs::write(
            &path,
            r#"
[server]
port = 9100

[weather]
timezone = "Asia/Osaka"
timeout_secs = 3

[models]
variant_dir = "/srv/models"
"#,
        )
        .unwrap();

        let config = ServiceConfig::from_builder(
            config::Config::builder().add_source(config::File::from(path.as_path())),
        )
        .unwrap();
        assert_eq!(config.server.port, 9100);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.weather.timezone, "Asia/Osaka");
        assert_eq!(config.weather.timeout_secs, 3);
        assert_eq!(config.models.variant_dir.to_str(), Some("/srv/models"));
    }

    #[test]
    fn test_environment_overrides() {
        let vars: HashMap<String, String> = [
            ("FORECAST_SERVER__PORT", "9200"),
            ("FORECAST_WEATHER__LATITUDE", "34.69"),
            ("FORECAST_MODELS__VARIANT_PREFIX", "beer_"),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let config = ServiceConfig::from_builder(
            config::Config::builder().add_source(environment().source(Some(vars))),
        )
        .unwrap();
        assert_eq!(config.server.port, 9200);
        assert_eq!(config.weather.latitude, 34.69);
        assert_eq!(config.models.variant_prefix, "beer_");
    }

    #[test]
    fn test_bind_addr() {
        let server = ServerConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
        };
        assert_eq!(server.bind_addr(), "127.0.0.1:8080");
    }
}
