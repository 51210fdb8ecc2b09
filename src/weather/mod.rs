//! Weather lookup behind the `get_weather_forecast` tool.
//!
//! The [`WeatherBackend`] trait is the seam to the outside world (geocoder
//! plus weather provider); [`lookup_forecast`] turns its raw samples into
//! the report returned as structured tool content.

pub mod openweather;

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::protocol::ToolResult;

pub use openweather::OpenWeatherBackend;

/// Number of calendar days kept in the daily forecast.
const FORECAST_DAYS: usize = 5;

#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum WeatherError {
    #[error("OpenWeather API key is not configured")]
    MissingApiKey,
    #[error("Could not find location: {0}")]
    LocationNotFound(String),
    #[error("Could not fetch weather data: {0}")]
    Upstream(String),
    #[error("Weather lookup timed out after {0} seconds")]
    Timeout(u64),
}

/// A weather failure is a business fault: the caller gets a readable
/// sentence in `content` and no structured payload.
impl From<WeatherError> for ToolResult {
    fn from(err: WeatherError) -> Self {
        Self::error(err.to_string())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinates {
    pub lat: f64,
    pub lon: f64,
}

/// Current conditions as reported upstream, before rounding.
#[derive(Debug, Clone, PartialEq)]
pub struct CurrentConditions {
    pub temperature: f64,
    pub feels_like: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
}

/// One timestamped forecast sample (providers typically emit one per 3h).
#[derive(Debug, Clone, PartialEq)]
pub struct ForecastSample {
    pub timestamp: i64,
    pub temperature: f64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
}

#[async_trait]
pub trait WeatherBackend: Send + Sync {
    /// Fails fast when the backend cannot serve requests at all.
    fn ensure_ready(&self) -> Result<(), WeatherError> {
        Ok(())
    }

    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, WeatherError>;

    async fn current(&self, coords: Coordinates) -> Result<CurrentConditions, WeatherError>;

    async fn forecast(&self, coords: Coordinates) -> Result<Vec<ForecastSample>, WeatherError>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WeatherReport {
    pub location: ReportLocation,
    pub current: CurrentReport,
    pub forecast: Vec<DailyForecast>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReportLocation {
    pub name: String,
    pub coordinates: [f64; 2],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CurrentReport {
    pub temperature: i64,
    pub feels_like: i64,
    pub humidity: f64,
    pub description: String,
    pub wind_speed: f64,
    pub timestamp: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    pub date: String,
    pub temp_min: i64,
    pub temp_max: i64,
    pub description: String,
    pub humidity: f64,
    pub wind_speed: f64,
}

/// Geocode `location`, fetch current conditions and forecast, and build the
/// report. The whole lookup is bounded by `timeout`.
pub async fn lookup_forecast(
    backend: &dyn WeatherBackend,
    location: &str,
    timeout: Duration,
) -> Result<WeatherReport, WeatherError> {
    backend.ensure_ready()?;

    let lookup = async {
        let coords = backend
            .geocode(location)
            .await?
            .ok_or_else(|| WeatherError::LocationNotFound(location.to_string()))?;
        let current = backend.current(coords).await?;
        let samples = backend.forecast(coords).await?;
        Ok(build_report(location, coords, current, &samples, Utc::now()))
    };

    match tokio::time::timeout(timeout, lookup).await {
        Ok(result) => result,
        Err(_) => {
            tracing::warn!(location, "weather lookup timed out after {}s", timeout.as_secs());
            Err(WeatherError::Timeout(timeout.as_secs()))
        }
    }
}

pub fn build_report(
    location: &str,
    coords: Coordinates,
    current: CurrentConditions,
    samples: &[ForecastSample],
    now: DateTime<Utc>,
) -> WeatherReport {
    WeatherReport {
        location: ReportLocation {
            name: location.to_string(),
            coordinates: [coords.lat, coords.lon],
        },
        current: CurrentReport {
            temperature: current.temperature.round() as i64,
            feels_like: current.feels_like.round() as i64,
            humidity: current.humidity,
            description: current.description,
            wind_speed: current.wind_speed,
            timestamp: now.to_rfc3339(),
        },
        forecast: aggregate_daily(samples),
    }
}

struct DayAccumulator<'a> {
    temp_min: f64,
    temp_max: f64,
    humidity: f64,
    wind_speed: f64,
    descriptions: Vec<&'a str>,
}

/// Group samples by UTC calendar day, keeping the first [`FORECAST_DAYS`]
/// days in date order. Humidity and wind come from the day's first sample.
pub fn aggregate_daily(samples: &[ForecastSample]) -> Vec<DailyForecast> {
    let mut days: BTreeMap<NaiveDate, DayAccumulator<'_>> = BTreeMap::new();

    for sample in samples {
        let Some(date) = DateTime::from_timestamp(sample.timestamp, 0).map(|dt| dt.date_naive())
        else {
            tracing::debug!(timestamp = sample.timestamp, "skipping sample with invalid timestamp");
            continue;
        };

        let day = days.entry(date).or_insert_with(|| DayAccumulator {
            temp_min: sample.temperature,
            temp_max: sample.temperature,
            humidity: sample.humidity,
            wind_speed: sample.wind_speed,
            descriptions: Vec::new(),
        });
        day.temp_min = day.temp_min.min(sample.temperature);
        day.temp_max = day.temp_max.max(sample.temperature);
        day.descriptions.push(&sample.description);
    }

    days.into_iter()
        .take(FORECAST_DAYS)
        .map(|(date, day)| DailyForecast {
            date: date.format("%Y-%m-%d").to_string(),
            temp_min: day.temp_min.round() as i64,
            temp_max: day.temp_max.round() as i64,
            description: most_frequent(&day.descriptions).to_string(),
            humidity: day.humidity,
            wind_speed: day.wind_speed,
        })
        .collect()
}

/// Most frequent entry; ties go to the one seen first.
fn most_frequent<'a>(items: &[&'a str]) -> &'a str {
    let mut best = "";
    let mut best_count = 0;
    for (i, item) in items.iter().enumerate() {
        if items[..i].contains(item) {
            continue;
        }
        let count = items.iter().filter(|other| *other == item).count();
        if count > best_count {
            best = *item;
            best_count = count;
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn sample(timestamp: i64, temperature: f64, description: &str) -> ForecastSample {
        ForecastSample {
            timestamp,
            temperature,
            humidity: 80.0,
            description: description.to_string(),
            wind_speed: 3.5,
        }
    }

    // 2024-03-01T00:00:00Z
    const DAY0: i64 = 1_709_251_200;
    const HOUR: i64 = 3_600;
    const DAY: i64 = 24 * HOUR;

    #[test]
    fn groups_samples_per_day_with_min_max() {
        let samples = vec![
            sample(DAY0, 4.4, "light rain"),
            sample(DAY0 + 3 * HOUR, 7.6, "light rain"),
            sample(DAY0 + 6 * HOUR, 2.5, "overcast clouds"),
            sample(DAY0 + DAY, 10.0, "clear sky"),
        ];

        let days = aggregate_daily(&samples);
        assert_eq!(days.len(), 2);
        assert_eq!(days[0].date, "2024-03-01");
        assert_eq!(days[0].temp_min, 3);
        assert_eq!(days[0].temp_max, 8);
        assert_eq!(days[0].description, "light rain");
        assert_eq!(days[1].date, "2024-03-02");
        assert_eq!(days[1].temp_min, 10);
    }

    #[test]
    fn keeps_only_first_five_days_in_order() {
        let samples: Vec<_> = (0..7)
            .rev()
            .map(|d| sample(DAY0 + d * DAY, d as f64, "clear sky"))
            .collect();

        let days = aggregate_daily(&samples);
        assert_eq!(days.len(), FORECAST_DAYS);
        assert_eq!(days[0].date, "2024-03-01");
        assert_eq!(days[4].date, "2024-03-05");
    }

    #[test]
    fn most_frequent_prefers_first_seen_on_tie() {
        assert_eq!(most_frequent(&["rain", "snow", "snow", "rain"]), "rain");
        assert_eq!(most_frequent(&["rain", "snow", "snow"]), "snow");
        assert_eq!(most_frequent(&[]), "");
    }

    #[test]
    fn report_rounds_current_temperatures() {
        let now = Utc.timestamp_opt(DAY0, 0).unwrap();
        let report = build_report(
            "Bergen",
            Coordinates { lat: 60.39, lon: 5.32 },
            CurrentConditions {
                temperature: 6.6,
                feels_like: 3.2,
                humidity: 93.0,
                description: "moderate rain".into(),
                wind_speed: 7.2,
            },
            &[],
            now,
        );

        assert_eq!(report.location.coordinates, [60.39, 5.32]);
        assert_eq!(report.current.temperature, 7);
        assert_eq!(report.current.feels_like, 3);
        assert!(report.current.timestamp.starts_with("2024-03-01T00:00:00"));
        assert!(report.forecast.is_empty());
    }

    #[test]
    fn weather_error_becomes_business_fault() {
        let result: ToolResult = WeatherError::LocationNotFound("Atlantis".into()).into();
        assert!(result.is_error);
        assert!(result.structured_content.is_none());
        assert_eq!(result.first_text(), Some("Could not find location: Atlantis"));
    }
}
