//! Weather forecast acquisition
//!
//! Fetches hourly forecasts from an external provider and aggregates them
//! into one [`DailyWeather`] record per calendar day.

mod aggregate;
mod open_meteo;


pub use aggregate::{aggregate_daily, HourlySeries};
pub use open_meteo::{OpenMeteoClient, OpenMeteoConfig, HOURLY_VARIABLES, JMA_ENDPOINT};

use crate::error::WeatherError;
use crate::models::DailyWeather;

pub use async_trait::async_trait;

/// Trait for weather forecast providers
#[async_trait]
pub trait WeatherSource: Send + Sync {
    /// Fetch the first `horizon_days` daily aggregates, ascending by date.
    ///
    /// Dates are taken from the provider's timestamps as rendered in `timezone`.
    async fn fetch(
        &self,
        horizon_days: u32,
        timezone: &str,
    ) -> Result<Vec<DailyWeather>, WeatherError>;
}
