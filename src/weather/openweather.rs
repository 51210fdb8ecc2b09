use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::Deserialize;

use super::{Coordinates, CurrentConditions, ForecastSample, WeatherBackend, WeatherError};
use crate::config::WeatherConfig;

const USER_AGENT: &str = concat!("tool-gateway/", env!("CARGO_PKG_VERSION"));

/// Production backend: Nominatim for geocoding, OpenWeather for conditions.
#[derive(Debug, Clone)]
pub struct OpenWeatherBackend {
    http: reqwest::Client,
    config: WeatherConfig,
}

impl OpenWeatherBackend {
    pub fn new(config: WeatherConfig) -> Result<Self, WeatherError> {
        let http = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| WeatherError::Upstream(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { http, config })
    }

    fn api_key(&self) -> Result<&str, WeatherError> {
        self.config.api_key.as_deref().ok_or(WeatherError::MissingApiKey)
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T, WeatherError> {
        let response = self
            .http
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| upstream(url, e))?;

        let status = response.status();
        if !status.is_success() {
            tracing::error!(%url, %status, "upstream weather request failed");
            return Err(WeatherError::Upstream(format!("{url} returned HTTP {status}")));
        }

        response.json::<T>().await.map_err(|e| upstream(url, e))
    }

    fn weather_query(&self, coords: Coordinates) -> Result<Vec<(&'static str, String)>, WeatherError> {
        Ok(vec![
            ("lat", coords.lat.to_string()),
            ("lon", coords.lon.to_string()),
            ("appid", self.api_key()?.to_string()),
            ("units", "metric".to_string()),
        ])
    }
}

fn upstream(url: &str, err: reqwest::Error) -> WeatherError {
    tracing::error!(%url, error = %err, "upstream weather request failed");
    WeatherError::Upstream(err.to_string())
}

#[derive(Debug, Deserialize)]
struct NominatimPlace {
    lat: String,
    lon: String,
}

#[derive(Debug, Deserialize)]
struct OwMain {
    temp: f64,
    #[serde(default)]
    feels_like: f64,
    humidity: f64,
}

#[derive(Debug, Deserialize)]
struct OwWeather {
    description: String,
}

#[derive(Debug, Deserialize)]
struct OwWind {
    speed: f64,
}

#[derive(Debug, Deserialize)]
struct OwCurrent {
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

#[derive(Debug, Deserialize)]
struct OwForecast {
    list: Vec<OwForecastItem>,
}

#[derive(Debug, Deserialize)]
struct OwForecastItem {
    dt: i64,
    main: OwMain,
    weather: Vec<OwWeather>,
    wind: OwWind,
}

fn first_description(weather: &[OwWeather]) -> String {
    weather
        .first()
        .map(|w| w.description.clone())
        .unwrap_or_default()
}

#[async_trait]
impl WeatherBackend for OpenWeatherBackend {
    fn ensure_ready(&self) -> Result<(), WeatherError> {
        self.api_key().map(|_| ())
    }

    async fn geocode(&self, location: &str) -> Result<Option<Coordinates>, WeatherError> {
        let url = format!("{}/search", self.config.geocoder_api_base.trim_end_matches('/'));
        let places: Vec<NominatimPlace> = self
            .get_json(
                &url,
                &[
                    ("q", location.to_string()),
                    ("format", "json".to_string()),
                    ("limit", "1".to_string()),
                ],
            )
            .await?;

        let Some(place) = places.into_iter().next() else {
            return Ok(None);
        };
        match (place.lat.parse::<f64>(), place.lon.parse::<f64>()) {
            (Ok(lat), Ok(lon)) => Ok(Some(Coordinates { lat, lon })),
            _ => {
                tracing::warn!(location, "geocoder returned unparseable coordinates");
                Ok(None)
            }
        }
    }

    async fn current(&self, coords: Coordinates) -> Result<CurrentConditions, WeatherError> {
        let url = format!("{}/weather", self.config.weather_api_base.trim_end_matches('/'));
        let current: OwCurrent = self.get_json(&url, &self.weather_query(coords)?).await?;
        Ok(CurrentConditions {
            temperature: current.main.temp,
            feels_like: current.main.feels_like,
            humidity: current.main.humidity,
            description: first_description(&current.weather),
            wind_speed: current.wind.speed,
        })
    }

    async fn forecast(&self, coords: Coordinates) -> Result<Vec<ForecastSample>, WeatherError> {
        let url = format!("{}/forecast", self.config.weather_api_base.trim_end_matches('/'));
        let forecast: OwForecast = self.get_json(&url, &self.weather_query(coords)?).await?;
        Ok(forecast
            .list
            .into_iter()
            .map(|item| ForecastSample {
                timestamp: item.dt,
                temperature: item.main.temp,
                humidity: item.main.humidity,
                description: first_description(&item.weather),
                wind_speed: item.wind.speed,
            })
            .collect())
    }
}
