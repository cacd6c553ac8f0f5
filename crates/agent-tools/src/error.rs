//! Error Types for the weather tools

use thiserror::Error;

pub type Result<T> = std::result::Result<T, WeatherError>;

#[derive(Error, Debug)]
pub enum WeatherError {
    #[error("No weather data for '{city}'. Available cities: {available}")]
    UnknownCity { city: String, available: String },

    #[error("Weather service request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("Unexpected weather service response: {0}")]
    Response(String),
}
