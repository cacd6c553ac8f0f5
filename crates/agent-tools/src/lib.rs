//! # agent-tools
//!
//! Concrete tools for the tool-calling agent.
//!
//! | Tool | Parameters | Returns |
//! |------|------------|---------|
//! | `add_numbers` | `a`, `b` (integer) | integer |
//! | `multiply_numbers` | `a`, `b` (integer) | integer |
//! | `calculate` | `expression` (string) | number |
//! | `get_current_time` | `utc_offset_hours` = 9, `format` = human | string |
//! | `get_weather` | `city` | string |
//! | `get_weather_forecast` | `city`, `days` = 3 | string |
//! | `list_available_cities` | | string |
//!
//! Weather tools are backed by a [`WeatherClient`]: the live
//! [`OpenMeteoClient`] or the offline [`MockWeatherClient`].

pub mod arithmetic;
pub mod clock;
pub mod error;
pub mod weather;

use std::sync::Arc;

use agent_core::ToolRegistry;

pub use arithmetic::{AddNumbersTool, CalculatorTool, MultiplyNumbersTool, evaluate_expression};
pub use clock::{CurrentTimeTool, TimeFormat};
pub use error::{Result, WeatherError};
pub use weather::{
    GetWeatherTool, ListCitiesTool, MockWeatherClient, OpenMeteoClient, WeatherClient,
    WeatherForecastTool,
};

/// Re-export tools for easy registration
pub mod tools {
    pub use crate::arithmetic::{AddNumbersTool, CalculatorTool, MultiplyNumbersTool};
    pub use crate::clock::CurrentTimeTool;
    pub use crate::weather::{GetWeatherTool, ListCitiesTool, WeatherForecastTool};
}

/// Register the arithmetic and clock tools
pub fn register_local_tools(registry: &mut ToolRegistry) -> agent_core::Result<()> {
    registry.register(AddNumbersTool)?;
    registry.register(MultiplyNumbersTool)?;
    registry.register(CalculatorTool)?;
    registry.register(CurrentTimeTool)?;
    Ok(())
}

/// Register the three weather tools over one shared client
pub fn register_weather_tools(
    registry: &mut ToolRegistry,
    client: Arc<dyn WeatherClient>,
) -> agent_core::Result<()> {
    registry.register(GetWeatherTool::new(Arc::clone(&client)))?;
    registry.register(WeatherForecastTool::new(Arc::clone(&client)))?;
    registry.register(ListCitiesTool::new(client))?;
    Ok(())
}

/// System prompt for a general tool-using assistant
pub const TOOL_AGENT_PROMPT: &str = r"You are a helpful assistant with access to tools.

Use a tool whenever the question needs arithmetic, the current time, or weather data.
Never guess a number you could compute. After the tools answer, reply in plain language.";

/// System prompt for the weather assistant
pub const WEATHER_AGENT_PROMPT: &str = r"You are a friendly weather assistant for cities in Japan.

## Guidelines

- For current conditions use `get_weather`
- For upcoming days use `get_weather_forecast`
- If you are unsure which cities are supported use `list_available_cities`
- Explain the weather in simple, friendly language
- Add clothing advice when it helps";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_all_tools() {
        let mut registry = ToolRegistry::new();
        register_local_tools(&mut registry).unwrap();
        register_weather_tools(&mut registry, Arc::new(MockWeatherClient::new())).unwrap();

        assert_eq!(
            registry.names(),
            vec![
                "add_numbers",
                "multiply_numbers",
                "calculate",
                "get_current_time",
                "get_weather",
                "get_weather_forecast",
                "list_available_cities",
            ]
        );

        let time = registry.get("get_current_time").unwrap();
        assert!(!time.descriptor.parameter("format").unwrap().required);
    }

    #[test]
    fn test_registering_twice_is_rejected() {
        let mut registry = ToolRegistry::new();
        register_local_tools(&mut registry).unwrap();
        assert!(register_local_tools(&mut registry).is_err());
    }
}
