//! Live weather from the Open-Meteo forecast API (no key required).

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;

use super::{CITIES, City, CurrentWeather, DailyForecast, WeatherClient, describe_weather_code};
use crate::error::{Result, WeatherError};

pub const DEFAULT_BASE_URL: &str = "https://api.open-meteo.com/v1/forecast";
const TIMEZONE: &str = "Asia/Tokyo";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CurrentResponse {
    current: CurrentBlock,
}

#[derive(Debug, Deserialize)]
struct CurrentBlock {
    temperature_2m: f64,
    relative_humidity_2m: f64,
    weather_code: u16,
    #[serde(default)]
    wind_speed_10m: Option<f64>,
}

#[derive(Debug, Deserialize)]
struct DailyResponse {
    daily: DailyBlock,
}

#[derive(Debug, Deserialize)]
struct DailyBlock {
    time: Vec<String>,
    weather_code: Vec<u16>,
    temperature_2m_max: Vec<Option<f64>>,
    temperature_2m_min: Vec<Option<f64>>,
    #[serde(default)]
    precipitation_probability_max: Vec<Option<f64>>,
}

fn parse_current(body: &str) -> Result<CurrentWeather> {
    let response: CurrentResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Response(e.to_string()))?;
    let current = response.current;

    Ok(CurrentWeather {
        temperature_c: current.temperature_2m,
        description: describe_weather_code(current.weather_code),
        humidity_pct: current.relative_humidity_2m,
        wind_speed_kmh: current.wind_speed_10m,
    })
}

fn parse_daily(body: &str) -> Result<Vec<DailyForecast>> {
    let response: DailyResponse =
        serde_json::from_str(body).map_err(|e| WeatherError::Response(e.to_string()))?;
    let daily = response.daily;

    if daily.weather_code.len() != daily.time.len() {
        return Err(WeatherError::Response(format!(
            "{} dates but {} weather codes",
            daily.time.len(),
            daily.weather_code.len()
        )));
    }

    Ok(daily
        .time
        .iter()
        .zip(&daily.weather_code)
        .enumerate()
        .map(|(i, (date, &code))| DailyForecast {
            label: date.clone(),
            description: describe_weather_code(code),
            temp_min_c: daily.temperature_2m_min.get(i).copied().flatten(),
            temp_max_c: daily.temperature_2m_max.get(i).copied().flatten(),
            precipitation_probability_pct: daily.precipitation_probability_max.get(i).copied().flatten(),
        })
        .collect())
}

/// Open-Meteo client for the full city table
pub struct OpenMeteoClient {
    http: reqwest::Client,
    base_url: String,
}

impl OpenMeteoClient {
    pub fn new() -> Result<Self> {
        Self::with_base_url(DEFAULT_BASE_URL)
    }

    pub fn with_base_url(base_url: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder().timeout(REQUEST_TIMEOUT).build()?;
        Ok(Self {
            http,
            base_url: base_url.into(),
        })
    }

    async fn fetch(&self, city: &City, query: &[(&str, String)]) -> Result<String> {
        tracing::debug!(city = city.name, url = %self.base_url, "Querying Open-Meteo");

        let response = self
            .http
            .get(&self.base_url)
            .query(&[
                ("latitude", city.latitude.to_string()),
                ("longitude", city.longitude.to_string()),
                ("timezone", TIMEZONE.to_string()),
            ])
            .query(query)
            .send()
            .await?
            .error_for_status()?;

        Ok(response.text().await?)
    }
}

#[async_trait]
impl WeatherClient for OpenMeteoClient {
    fn name(&self) -> &'static str {
        "open-meteo"
    }

    fn cities(&self) -> &'static [City] {
        CITIES
    }

    fn max_forecast_days(&self) -> u8 {
        7
    }

    async fn current(&self, city: &City) -> Result<CurrentWeather> {
        let body = self
            .fetch(
                city,
                &[(
                    "current",
                    "temperature_2m,relative_humidity_2m,weather_code,wind_speed_10m".to_string(),
                )],
            )
            .await?;
        parse_current(&body)
    }

    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<DailyForecast>> {
        let body = self
            .fetch(
                city,
                &[
                    (
                        "daily",
                        "weather_code,temperature_2m_max,temperature_2m_min,precipitation_probability_max"
                            .to_string(),
                    ),
                    ("forecast_days", days.to_string()),
                ],
            )
            .await?;
        parse_daily(&body)
    }
}
