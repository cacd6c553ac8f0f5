//! tool-agent
//!
//! Command-line front end for the tool orchestration core.
//!
//! ```text
//! tool-agent ask "What is 12 * 7?"          # answer with local + bridged tools
//! tool-agent tools                          # print the merged catalog
//! tool-agent serve-tools --mock             # be a tool provider on stdio
//! ```
//!
//! Logs go to stderr so `serve-tools` can keep stdout for protocol frames.

mod commands;
mod config;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use crate::commands::LocalTools;
use crate::config::AppConfig;

#[derive(Parser, Debug)]
#[command(name = "tool-agent", version, about = "Tool-calling agent over local and bridged tools")]
struct Cli {
    /// TOML config file (default: ./tool-agent.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Ask the agent a question
    Ask {
        /// The question; multiple words are joined
        #[arg(required = true)]
        question: Vec<String>,

        /// Use canned weather data instead of Open-Meteo
        #[arg(long)]
        mock_weather: bool,

        /// Only use tools from configured bridges
        #[arg(long)]
        no_local_tools: bool,

        /// Model name (overrides config and TOOL_AGENT_MODEL)
        #[arg(long)]
        model: Option<String>,
    },

    /// Print every tool in the merged catalog
    Tools {
        #[arg(long)]
        mock_weather: bool,

        #[arg(long)]
        no_local_tools: bool,
    },

    /// Serve the built-in tools over stdin/stdout
    ServeTools {
        /// Use canned weather data instead of Open-Meteo
        #[arg(long)]
        mock: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::Ask {
            question,
            mock_weather,
            no_local_tools,
            model,
        } => {
            let mut config = AppConfig::load(cli.config.as_deref())?;
            if let Some(model) = model {
                config.model = model;
            }
            let local = LocalTools {
                enabled: !no_local_tools,
                mock_weather,
            };

            let answer = commands::ask(config, &question.join(" "), local).await?;
            println!("{answer}");
        }
        Command::Tools {
            mock_weather,
            no_local_tools,
        } => {
            let config = AppConfig::load(cli.config.as_deref())?;
            let local = LocalTools {
                enabled: !no_local_tools,
                mock_weather,
            };

            for line in commands::list_tools(config, local).await? {
                println!("{line}");
            }
        }
        Command::ServeTools { mock } => commands::serve_tools(mock).await?,
    }

    Ok(())
}
