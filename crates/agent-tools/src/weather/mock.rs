//! Canned weather data for demos and tests

use async_trait::async_trait;

use super::{CITIES, City, CurrentWeather, DailyForecast, WeatherClient};
use crate::error::{Result, WeatherError};

struct CannedCity {
    temperature_c: f64,
    condition: &'static str,
    humidity_pct: f64,
    forecast: [&'static str; 5],
}

fn canned(city: &City) -> Option<CannedCity> {
    let data = match city.name {
        "Tokyo" => CannedCity {
            temperature_c: 22.0,
            condition: "Sunny",
            humidity_pct: 45.0,
            forecast: ["Sunny", "Sunny", "Cloudy", "Rain", "Sunny"],
        },
        "Osaka" => CannedCity {
            temperature_c: 24.0,
            condition: "Cloudy",
            humidity_pct: 55.0,
            forecast: ["Cloudy", "Rain", "Rain", "Sunny", "Sunny"],
        },
        "Nagoya" => CannedCity {
            temperature_c: 23.0,
            condition: "Sunny",
            humidity_pct: 50.0,
            forecast: ["Sunny", "Sunny", "Sunny", "Cloudy", "Cloudy"],
        },
        "Sapporo" => CannedCity {
            temperature_c: 15.0,
            condition: "Rain",
            humidity_pct: 70.0,
            forecast: ["Rain", "Cloudy", "Sunny", "Sunny", "Snow"],
        },
        "Fukuoka" => CannedCity {
            temperature_c: 25.0,
            condition: "Sunny",
            humidity_pct: 60.0,
            forecast: ["Sunny", "Sunny", "Cloudy", "Cloudy", "Sunny"],
        },
        _ => return None,
    };
    Some(data)
}

/// Offline weather source covering the five largest cities
#[derive(Debug, Default)]
pub struct MockWeatherClient;

impl MockWeatherClient {
    pub fn new() -> Self {
        Self
    }

    fn lookup(city: &City) -> Result<CannedCity> {
        canned(city).ok_or_else(|| WeatherError::UnknownCity {
            city: city.name.to_string(),
            available: super::city_list(&CITIES[..5]),
        })
    }
}

#[async_trait]
impl WeatherClient for MockWeatherClient {
    fn name(&self) -> &'static str {
        "mock"
    }

    fn cities(&self) -> &'static [City] {
        &CITIES[..5]
    }

    fn max_forecast_days(&self) -> u8 {
        5
    }

    async fn current(&self, city: &City) -> Result<CurrentWeather> {
        let data = Self::lookup(city)?;
        Ok(CurrentWeather {
            temperature_c: data.temperature_c,
            description: data.condition.to_string(),
            humidity_pct: data.humidity_pct,
            wind_speed_kmh: None,
        })
    }

    async fn forecast(&self, city: &City, days: u8) -> Result<Vec<DailyForecast>> {
        let data = Self::lookup(city)?;
        Ok(data
            .forecast
            .iter()
            .take(usize::from(days))
            .enumerate()
            .map(|(i, condition)| DailyForecast {
                label: format!("Day {}", i + 1),
                description: (*condition).to_string(),
                temp_min_c: None,
                temp_max_c: None,
                precipitation_probability_pct: None,
            })
            .collect())
    }
}
