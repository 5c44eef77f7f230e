//! Feature encoding for ML inference
//!
//! Turns daily weather aggregates into the fixed 11-column layout every
//! sales model was trained on: precipitation, mean temperature, mean
//! humidity, mean wind speed, then a one-hot weekday block (Monday..Sunday).

use crate::models::{DailyWeather, FeatureVector};
use chrono::Datelike;
use tract_onnx::prelude::*;

/// Number of input features expected by every model
pub const FEATURE_COUNT: usize = 11;

/// Column names in matrix order
pub const FEATURE_NAMES: [&str; FEATURE_COUNT] = [
    "precipitation",
    "mean_temperature",
    "mean_humidity",
    "mean_wind_speed",
    "weekday_mon",
    "weekday_tue",
    "weekday_wed",
    "weekday_thu",
    "weekday_fri",
    "weekday_sat",
    "weekday_sun",
];

impl FeatureVector {
    pub fn to_array(&self) -> [f32; FEATURE_COUNT] {
        let mut out = [0.0; FEATURE_COUNT];
        out[0] = self.precipitation;
        out[1] = self.mean_temperature;
        out[2] = self.mean_humidity;
        out[3] = self.mean_wind_speed;
        out[4..].copy_from_slice(&self.weekday);
        out
    }
}

/// Row-major feature matrix, one row per forecast day
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    values: tract_ndarray::Array2<f32>,
}

impl FeatureMatrix {
    /// Wrap an arbitrary 2-D array. Callers are responsible for column layout.
    pub fn from_array(values: tract_ndarray::Array2<f32>) -> Self {
        Self { values }
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    pub fn row(&self, index: usize) -> Vec<f32> {
        self.values.row(index).to_vec()
    }

    /// Whole matrix as a `[nrows, ncols]` tensor
    pub fn to_tensor(&self) -> Tensor {
        self.values.clone().into()
    }
}

/// Encodes daily weather into model input features.
///
/// Missing weather values are encoded as `0.0` rather than rejected, matching
/// the zero-fill the models were trained with.
#[derive(Debug, Clone, Copy, Default)]
pub struct FeatureEncoder;

impl FeatureEncoder {
    pub fn new() -> Self {
        Self
    }

    pub fn encode_row(&self, day: &DailyWeather) -> FeatureVector {
        let mut weekday = [0.0; 7];
        weekday[day.date.weekday().num_days_from_monday() as usize] = 1.0;

        FeatureVector {
            precipitation: day.precipitation.unwrap_or(0.0) as f32,
            mean_temperature: day.temperature.unwrap_or(0.0) as f32,
            mean_humidity: day.humidity.unwrap_or(0.0) as f32,
            mean_wind_speed: day.wind_speed.unwrap_or(0.0) as f32,
            weekday,
        }
    }

    pub fn encode_matrix(&self, days: &[DailyWeather]) -> FeatureMatrix {
        let mut values = tract_ndarray::Array2::<f32>::zeros((days.len(), FEATURE_COUNT));
        for (mut row, day) in values.rows_mut().into_iter().zip(days) {
            for (cell, v) in row.iter_mut().zip(self.encode_row(day).to_array()) {
                *cell = v;
            }
        }
        FeatureMatrix { values }
    }
}
