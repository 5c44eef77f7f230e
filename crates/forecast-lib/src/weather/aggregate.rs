//! Hourly to daily aggregation

use crate::error::WeatherError;
use crate::models::DailyWeather;
use chrono::NaiveDate;
use serde::Deserialize;
use std::collections::BTreeMap;

/// Index-aligned hourly series as returned by the provider.
///
/// Every series is optional so that a missing one can be reported as
/// malformed data instead of a decode failure.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HourlySeries {
    pub time: Option<Vec<String>>,
    pub temperature_2m: Option<Vec<Option<f64>>>,
    pub relativehumidity_2m: Option<Vec<Option<f64>>>,
    pub windspeed_10m: Option<Vec<Option<f64>>>,
    pub precipitation: Option<Vec<Option<f64>>>,
}

/// Running totals for one variable. Null samples are skipped.
#[derive(Debug, Default)]
struct Accumulator {
    sum: f64,
    count: usize,
}

impl Accumulator {
    fn push(&mut self, value: Option<f64>) {
        if let Some(v) = value {
            self.sum += v;
            self.count += 1;
        }
    }

    fn mean(&self) -> Option<f64> {
        (self.count > 0).then(|| self.sum / self.count as f64)
    }

    fn total(&self) -> Option<f64> {
        (self.count > 0).then_some(self.sum)
    }
}

#[derive(Debug, Default)]
struct DayBucket {
    samples: usize,
    temperature: Accumulator,
    humidity: Accumulator,
    wind_speed: Accumulator,
    precipitation: Accumulator,
}

impl DayBucket {
    fn finish(self, date: NaiveDate) -> Result<DailyWeather, WeatherError> {
        if self.samples == 0 {
            return Err(WeatherError::MalformedUpstreamData(format!(
                "no hourly samples for {}",
                date
            )));
        }
        Ok(DailyWeather {
            date,
            temperature: self.temperature.mean(),
            humidity: self.humidity.mean(),
            wind_speed: self.wind_speed.mean(),
            precipitation: self.precipitation.total(),
        })
    }
}

fn require<'a, T>(series: &'a Option<Vec<T>>, name: &str) -> Result<&'a [T], WeatherError> {
    series
        .as_deref()
        .ok_or_else(|| WeatherError::MalformedUpstreamData(format!("missing hourly series '{}'", name)))
}

/// Parse the calendar date of an hourly timestamp such as `2025-06-17T03:00`.
///
/// Only the date portion is used; the provider already renders timestamps in
/// the requested timezone.
fn timestamp_date(timestamp: &str) -> Result<NaiveDate, WeatherError> {
    let date_part = timestamp.split('T').next().unwrap_or(timestamp);
    NaiveDate::parse_from_str(date_part, "%Y-%m-%d").map_err(|e| {
        WeatherError::MalformedUpstreamData(format!("bad timestamp '{}': {}", timestamp, e))
    })
}

/// Group hourly samples by date and keep the first `horizon_days` days.
///
/// Temperature, humidity and wind speed are averaged; precipitation is summed.
pub fn aggregate_daily(
    hourly: &HourlySeries,
    horizon_days: usize,
) -> Result<Vec<DailyWeather>, WeatherError> {
    let times = require(&hourly.time, "time")?;
    let temps = require(&hourly.temperature_2m, "temperature_2m")?;
    let hums = require(&hourly.relativehumidity_2m, "relativehumidity_2m")?;
    let winds = require(&hourly.windspeed_10m, "windspeed_10m")?;
    let rains = require(&hourly.precipitation, "precipitation")?;

    let n = times.len();
    if [temps.len(), hums.len(), winds.len(), rains.len()]
        .iter()
        .any(|&len| len != n)
    {
        return Err(WeatherError::MalformedUpstreamData(format!(
            "hourly series lengths differ: time={} temperature={} humidity={} wind={} precipitation={}",
            n,
            temps.len(),
            hums.len(),
            winds.len(),
            rains.len()
        )));
    }

    let mut buckets: BTreeMap<NaiveDate, DayBucket> = BTreeMap::new();
    for i in 0..n {
        let bucket = buckets.entry(timestamp_date(&times[i])?).or_default();
        bucket.samples += 1;
        bucket.temperature.push(temps[i]);
        bucket.humidity.push(hums[i]);
        bucket.wind_speed.push(winds[i]);
        bucket.precipitation.push(rains[i]);
    }

    buckets
        .into_iter()
        .take(horizon_days)
        .map(|(date, bucket)| bucket.finish(date))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn series(times: &[&str], temps: &[f64], rains: &[f64]) -> HourlySeries {
        let n = times.len();
        HourlySeries {
            time: Some(times.iter().map(|t| t.to_string()).collect()),
            temperature_2m: Some(temps.iter().copied().map(Some).collect()),
            relativehumidity_2m: Some(vec![Some(60.0); n]),
            windspeed_10m: Some(vec![Some(3.0); n]),
            precipitation: Some(rains.iter().copied().map(Some).collect()),
        }
    }

    #[test]
    fn test_mean_and_sum() {
        let hourly = series(
            &["2025-06-17T00:00", "2025-06-17T01:00"],
            &[10.0, 20.0],
            &[1.0, 2.5],
        );
        let days = aggregate_daily(&hourly, 11).unwrap();
        assert_eq!(days.len(), 1);
        assert_eq!(days[0].temperature, Some(15.0));
        assert_eq!(days[0].precipitation, Some(3.5));
        assert_eq!(days[0].humidity, Some(60.0));
        assert_eq!(days[0].wind_speed, Some(3.0));
    }

    #[test]
    fn test_groups_sorted_and_truncated() {
        let hourly = series(
            &[
                "2025-06-19T00:00",
                "2025-06-17T00:00",
                "2025-06-18T00:00",
                "2025-06-17T12:00",
            ],
            &[30.0, 10.0, 20.0, 12.0],
            &[0.0, 0.0, 0.0, 0.0],
        );
        let days = aggregate_daily(&hourly, 2).unwrap();
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, NaiveDate::from_ymd_opt(2025, 6, 17).unwrap());
        assert_eq!(days[0].temperature, Some(11.0));
        assert_eq!(days[1].date, NaiveDate::from_ymd_opt(2025, 6, 18).unwrap());
    }

    #[test]
    fn test_null_samples_skipped() {
        let mut hourly = series(
            &["2025-06-17T00:00", "2025-06-17T01:00", "2025-06-17T02:00"],
            &[10.0, 0.0, 20.0],
            &[1.0, 1.0, 1.0],
        );
        hourly.temperature_2m = Some(vec![Some(10.0), None, Some(20.0)]);
        hourly.windspeed_10m = Some(vec![None, None, None]);

        let days = aggregate_daily(&hourly, 11).unwrap();
        assert_eq!(days[0].temperature, Some(15.0));
        assert_eq!(days[0].wind_speed, None);
    }

    #[test]
    fn test_missing_series_is_malformed() {
        let mut hourly = series(&["2025-06-17T00:00"], &[10.0], &[0.0]);
        hourly.relativehumidity_2m = None;
        let err = aggregate_daily(&hourly, 11).unwrap_err();
        assert!(matches!(err, WeatherError::MalformedUpstreamData(msg) if msg.contains("relativehumidity_2m")));
    }

    #[test]
    fn test_length_mismatch_is_malformed() {
        let mut hourly = series(&["2025-06-17T00:00", "2025-06-17T01:00"], &[10.0, 11.0], &[0.0, 0.0]);
        hourly.precipitation = Some(vec![Some(0.0)]);
        assert!(matches!(
            aggregate_daily(&hourly, 11),
            Err(WeatherError::MalformedUpstreamData(_))
        ));
    }

    #[test]
    fn test_bad_timestamp_is_malformed() {
        let hourly = series(&["17/06/2025 00:00"], &[10.0], &[0.0]);
        assert!(matches!(
            aggregate_daily(&hourly, 11),
            Err(WeatherError::MalformedUpstreamData(_))
        ));
    }

    #[test]
    fn test_empty_bucket_rejected() {
        let bucket = DayBucket::default();
        let date = NaiveDate::from_ymd_opt(2025, 6, 17).unwrap();
        assert!(bucket.finish(date).is_err());
    }

    #[test]
    fn test_empty_series_yields_no_days() {
        let hourly = series(&[], &[], &[]);
        assert!(aggregate_daily(&hourly, 7).unwrap().is_empty());
    }
}
