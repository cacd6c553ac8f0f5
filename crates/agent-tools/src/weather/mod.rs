//! Weather tools
//!
//! The tools hold an `Arc<dyn WeatherClient>`, so the same tool set runs
//! against the live Open-Meteo API or the canned [`MockWeatherClient`].

pub mod mock;
pub mod open_meteo;

use std::fmt::Write as _;
use std::sync::Arc;

use agent_core::{Arguments, ParameterSchema, Tool, ToolSchema};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::error::{Result, WeatherError};

pub use mock::MockWeatherClient;
pub use open_meteo::OpenMeteoClient;

/// A city the weather tools know about
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct City {
    pub name: &'static str,
    pub local_name: &'static str,
    pub latitude: f64,
    pub longitude: f64,
}

impl City {
    /// Case-insensitive match on the English or Japanese name
    pub fn matches(&self, query: &str) -> bool {
        let query = query.trim();
        self.name.eq_ignore_ascii_case(query) || self.local_name == query
    }
}

pub const CITIES: &[City] = &[
    City { name: "Tokyo", local_name: "東京", latitude: 35.6762, longitude: 139.6503 },
    City { name: "Osaka", local_name: "大阪", latitude: 34.6937, longitude: 135.5023 },
    City { name: "Nagoya", local_name: "名古屋", latitude: 35.1815, longitude: 136.9066 },
    City { name: "Sapporo", local_name: "札幌", latitude: 43.0618, longitude: 141.3545 },
    City { name: "Fukuoka", local_name: "福岡", latitude: 33.5904, longitude: 130.4017 },
    City { name: "Kyoto", local_name: "京都", latitude: 35.0116, longitude: 135.7681 },
    City { name: "Yokohama", local_name: "横浜", latitude: 35.4437, longitude: 139.6380 },
    City { name: "Kobe", local_name: "神戸", latitude: 34.6901, longitude: 135.1956 },
];

/// Conditions right now
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CurrentWeather {
    pub temperature_c: f64,
    pub description: String,
    pub humidity_pct: f64,
    pub wind_speed_kmh: Option<f64>,
}

/// One day of a forecast
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DailyForecast {
    /// Calendar date, or "Day N" when the source has no dates
    pub label: String,
    pub description: String,
    pub temp_min_c: Option<f64>,
    pub temp_max_c: Option<f64>,
    pub precipitation_probability_pct: Option<f64>,
}

/// Source of weather data
#[async_trait]
pub trait WeatherClient: Send + Sync {
    fn name(&self) -> &'static str;

    /// Cities this client can answer for
    fn cities(&self) -> &'static [City];

    /// Longest forecast this client serves
    fn max_forecast_days(&self) -> u8;

    async fn current(&self, city: &City) -> Result<CurrentWeather>;

    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<DailyForecast>>;

    /// Look up a supported city by name
    fn resolve(&self, query: &str) -> Result<&'static City> {
        self.cities()
            .iter()
            .find(|c| c.matches(query))
            .ok_or_else(|| WeatherError::UnknownCity {
                city: query.to_string(),
                available: city_list(self.cities()),
            })
    }
}

fn city_list(cities: &[City]) -> String {
    cities.iter().map(|c| c.name).collect::<Vec<_>>().join(", ")
}

/// Human description of a WMO weather interpretation code
pub fn describe_weather_code(code: u16) -> String {
    let text = match code {
        0 => "Clear sky",
        1 => "Mainly clear",
        2 => "Partly cloudy",
        3 => "Overcast",
        45 => "Fog",
        48 => "Depositing rime fog",
        51 => "Light drizzle",
        53 => "Moderate drizzle",
        55 => "Dense drizzle",
        61 => "Slight rain",
        63 => "Moderate rain",
        65 => "Heavy rain",
        71 => "Slight snow",
        73 => "Moderate snow",
        75 => "Heavy snow",
        80 => "Slight rain showers",
        81 => "Moderate rain showers",
        82 => "Violent rain showers",
        95 => "Thunderstorm",
        96 => "Thunderstorm with slight hail",
        99 => "Thunderstorm with heavy hail",
        other => return format!("Unknown ({other})"),
    };
    text.to_string()
}

/// Clamp a requested forecast length into `1..=max`
pub fn clamp_days(requested: i64, max: u8) -> u8 {
    let clamped = requested.clamp(1, i64::from(max.max(1)));
    u8::try_from(clamped).unwrap_or(1)
}

pub fn format_current(city: &City, weather: &CurrentWeather) -> String {
    let mut out = format!(
        "Current weather in {}:\n  Conditions: {}\n  Temperature: {}°C\n  Humidity: {}%",
        city.name, weather.description, weather.temperature_c, weather.humidity_pct
    );
    if let Some(wind) = weather.wind_speed_kmh {
        let _ = write!(out, "\n  Wind: {wind} km/h");
    }
    out
}

pub fn format_forecast(city: &City, days: &[DailyForecast]) -> String {
    let mut out = format!("{}-day forecast for {}:", days.len(), city.name);
    for day in days {
        let _ = write!(out, "\n  {}: {}", day.label, day.description);
        if let (Some(min), Some(max)) = (day.temp_min_c, day.temp_max_c) {
            let _ = write!(out, ", {min}°C to {max}°C");
        }
        if let Some(p) = day.precipitation_probability_pct {
            let _ = write!(out, ", {p}% chance of precipitation");
        }
    }
    out
}

fn city_param() -> ParameterSchema {
    ParameterSchema::required("city", "string", "City name, e.g. Tokyo or 東京")
}

/// `get_weather(city)`
pub struct GetWeatherTool {
    client: Arc<dyn WeatherClient>,
}

impl GetWeatherTool {
    pub fn new(client: Arc<dyn WeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for GetWeatherTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("get_weather", "Get the current weather for a Japanese city")
            .param(city_param())
            .returns("string")
            .category("weather")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let city = self.client.resolve(args.str("city")?)?;
        tracing::debug!(client = self.client.name(), city = city.name, "get_weather");

        let weather = self.client.current(city).await?;
        Ok(json!(format_current(city, &weather)))
    }
}

/// `get_weather_forecast(city, days = 3)`
pub struct WeatherForecastTool {
    client: Arc<dyn WeatherClient>,
}

impl WeatherForecastTool {
    pub fn new(client: Arc<dyn WeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for WeatherForecastTool {
    fn schema(&self) -> ToolSchema {
        let max = self.client.max_forecast_days();
        ToolSchema::new("get_weather_forecast", "Get a daily weather forecast for a Japanese city")
            .param(city_param())
            .param(ParameterSchema::optional(
                "days",
                "integer",
                format!("Number of days (1-{max})"),
                Some(json!(3)),
            ))
            .returns("string")
            .category("weather")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let city = self.client.resolve(args.str("city")?)?;
        let requested = args.optional_integer("days").unwrap_or(3);
        let days = clamp_days(requested, self.client.max_forecast_days());
        tracing::debug!(client = self.client.name(), city = city.name, requested, days, "get_weather_forecast");

        let forecast = self.client.forecast(city, days).await?;
        Ok(json!(format_forecast(city, &forecast)))
    }
}

/// `list_available_cities()`
pub struct ListCitiesTool {
    client: Arc<dyn WeatherClient>,
}

impl ListCitiesTool {
    pub fn new(client: Arc<dyn WeatherClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Tool for ListCitiesTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("list_available_cities", "List the cities with weather data")
            .returns("string")
            .category("weather")
    }

    async fn execute(&self, _args: &Arguments) -> anyhow::Result<Value> {
        let lines: Vec<String> = self
            .client
            .cities()
            .iter()
            .map(|c| format!("  - {} ({})", c.name, c.local_name))
            .collect();
        Ok(json!(format!("Available cities:\n{}", lines.join("\n"))))
    }
}
