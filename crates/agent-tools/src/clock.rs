//! Current-time tool

use agent_core::{Arguments, ParameterSchema, Tool, ToolSchema};
use anyhow::{anyhow, bail};
use async_trait::async_trait;
use chrono::{DateTime, FixedOffset, Utc};
use serde_json::{Value, json};

/// Offset used when the model does not pass one (JST)
pub const DEFAULT_UTC_OFFSET_HOURS: i64 = 9;

const HUMAN_FORMAT: &str = "%A, %B %d, %Y at %H:%M:%S (UTC%:z)";

/// How `get_current_time` renders the instant
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TimeFormat {
    Human,
    Iso,
    Unix,
}

impl std::str::FromStr for TimeFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "human" => Ok(Self::Human),
            "iso" => Ok(Self::Iso),
            "unix" => Ok(Self::Unix),
            other => bail!("unknown time format '{other}'"),
        }
    }
}

/// Render `now` in the zone `utc_offset_hours` east of UTC
pub fn render_time(now: DateTime<Utc>, utc_offset_hours: i64, format: TimeFormat) -> anyhow::Result<String> {
    if !(-12..=14).contains(&utc_offset_hours) {
        bail!("UTC offset {utc_offset_hours} is outside -12..=14");
    }

    let seconds = i32::try_from(utc_offset_hours * 3600)?;
    let zone = FixedOffset::east_opt(seconds).ok_or_else(|| anyhow!("invalid UTC offset {utc_offset_hours}"))?;
    let local = now.with_timezone(&zone);

    Ok(match format {
        TimeFormat::Human => local.format(HUMAN_FORMAT).to_string(),
        TimeFormat::Iso => local.to_rfc3339(),
        TimeFormat::Unix => local.timestamp().to_string(),
    })
}

/// `get_current_time(utc_offset_hours = 9, format = human)`
pub struct CurrentTimeTool;

#[async_trait]
impl Tool for CurrentTimeTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema::new("get_current_time", "Get the current date and time")
            .param(ParameterSchema::optional(
                "utc_offset_hours",
                "integer",
                "Hours east of UTC (9 for Japan)",
                Some(json!(DEFAULT_UTC_OFFSET_HOURS)),
            ))
            .param(
                ParameterSchema::optional(
                    "format",
                    "string",
                    "Output format",
                    Some(json!("human")),
                )
                .with_enum(["human", "iso", "unix"]),
            )
            .returns("string")
            .category("time")
    }

    async fn execute(&self, args: &Arguments) -> anyhow::Result<Value> {
        let offset = args.optional_integer("utc_offset_hours").unwrap_or(DEFAULT_UTC_OFFSET_HOURS);
        let format = args.optional_str("format").unwrap_or("human").parse()?;

        Ok(json!(render_time(Utc::now(), offset, format)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn instant() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 15, 1, 30, 0).unwrap()
    }

    #[test]
    fn test_render_human_in_jst() {
        let text = render_time(instant(), 9, TimeFormat::Human).unwrap();
        assert_eq!(text, "Friday, March 15, 2024 at 10:30:00 (UTC+09:00)");
    }

    #[test]
    fn test_render_iso_and_unix() {
        assert_eq!(render_time(instant(), 0, TimeFormat::Iso).unwrap(), "2024-03-15T01:30:00+00:00");
        assert_eq!(render_time(instant(), -5, TimeFormat::Unix).unwrap(), "1710466200");
    }

    #[test]
    fn test_offset_out_of_range() {
        assert!(render_time(instant(), 15, TimeFormat::Iso).is_err());
        assert!(render_time(instant(), -13, TimeFormat::Iso).is_err());
    }

    #[tokio::test]
    async fn test_tool_uses_defaults() {
        let out = CurrentTimeTool.execute(&Arguments::new()).await.unwrap();
        assert!(out.as_str().unwrap().ends_with("(UTC+09:00)"));

        let args = Arguments::new().with("format", "fortnight");
        assert!(CurrentTimeTool.execute(&args).await.is_err());
    }
}
