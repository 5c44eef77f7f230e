//! Core data models for the forecast service

use chrono::{Datelike, NaiveDate, Weekday};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Weekday labels in Monday-first order, as served to clients
pub const WEEKDAY_LABELS: [&str; 7] = ["月", "火", "水", "木", "金", "土", "日"];

/// Day of week whose predictions are always reported as null
pub const SUPPRESSED_WEEKDAY: Weekday = Weekday::Sun;

/// Response keys a variant identifier may not shadow
pub const RESERVED_FIELDS: [&str; 3] = ["date", "weekday", "total"];

/// One calendar day of aggregated weather observations.
///
/// Numeric fields are `None` when every hourly sample for that day was null
/// upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyWeather {
    pub date: NaiveDate,
    /// Mean air temperature at 2m (°C)
    pub temperature: Option<f64>,
    /// Mean relative humidity (%)
    pub humidity: Option<f64>,
    /// Mean wind speed at 10m (m/s)
    pub wind_speed: Option<f64>,
    /// Total precipitation (mm)
    pub precipitation: Option<f64>,
}

impl DailyWeather {
    pub fn weekday_label(&self) -> &'static str {
        weekday_label(self.date.weekday())
    }

    pub fn is_suppressed(&self) -> bool {
        self.date.weekday() == SUPPRESSED_WEEKDAY
    }
}

pub fn weekday_label(weekday: Weekday) -> &'static str {
    WEEKDAY_LABELS[weekday.num_days_from_monday() as usize]
}

/// Feature vector for ML inference, one per forecast day
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureVector {
    pub precipitation: f32,
    pub mean_temperature: f32,
    pub mean_humidity: f32,
    pub mean_wind_speed: f32,
    /// One-hot day of week, Monday first
    pub weekday: [f32; 7],
}

/// One row of the forecast response
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastDay {
    #[serde(with = "date_format")]
    pub date: NaiveDate,
    pub weekday: String,
    /// Primary model prediction
    pub total: Option<f64>,
    /// Variant model predictions keyed by variant identifier
    #[serde(flatten)]
    pub variants: BTreeMap<String, Option<f64>>,
}

/// Body of `GET /forecast`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastResponse {
    pub predictions: Vec<ForecastDay>,
}

mod date_format {
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer};

    const FORMAT: &str = "%Y-%m-%d";

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format(FORMAT).to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let s = String::deserialize(deserializer)?;
        NaiveDate::parse_from_str(&s, FORMAT).map_err(serde::de::Error::custom)
    }
}
