//! Subcommand implementations

use std::sync::Arc;

use agent_core::{
    Agent, AgentError, Catalog, GenerationOptions, LlmProvider, PromptedBackend,
    PromptedBackendConfig, RemoteTools, ToolDescriptor, ToolRegistry,
};
use agent_runtime::bridge::Capabilities;
use agent_runtime::{BridgeConfig, OllamaProvider, ToolServer, TransportBridge};
use agent_tools::{MockWeatherClient, OpenMeteoClient, TOOL_AGENT_PROMPT, WeatherClient};
use anyhow::Context;
use tracing::{info, warn};

use crate::config::AppConfig;

/// Which in-process tools to offer
#[derive(Clone, Copy, Debug)]
pub struct LocalTools {
    pub enabled: bool,
    pub mock_weather: bool,
}

fn weather_client(mock: bool) -> anyhow::Result<Arc<dyn WeatherClient>> {
    if mock {
        Ok(Arc::new(MockWeatherClient::new()))
    } else {
        Ok(Arc::new(OpenMeteoClient::new().context("building weather client")?))
    }
}

pub fn local_registry(local: LocalTools) -> anyhow::Result<ToolRegistry> {
    let mut registry = ToolRegistry::new();
    if local.enabled {
        agent_tools::register_local_tools(&mut registry)?;
        agent_tools::register_weather_tools(&mut registry, weather_client(local.mock_weather)?)?;
    }
    Ok(registry)
}

/// Start every configured bridge. If one fails, the ones already running
/// are closed before the error is returned.
pub async fn start_bridges(configs: &[BridgeConfig]) -> anyhow::Result<Vec<Arc<dyn RemoteTools>>> {
    let mut started: Vec<Arc<dyn RemoteTools>> = Vec::with_capacity(configs.len());

    for config in configs {
        match TransportBridge::start(config.clone()).await {
            Ok(bridge) => {
                info!(bridge = %config.name, server = %bridge.server_capabilities().name, "Bridge ready");
                started.push(Arc::new(bridge));
            }
            Err(e) => {
                for remote in &started {
                    remote.close().await;
                }
                return Err(AgentError::from(e)).with_context(|| format!("starting bridge '{}'", config.name));
            }
        }
    }

    Ok(started)
}

/// `tool-agent ask`
pub async fn ask(config: AppConfig, question: &str, local: LocalTools) -> anyhow::Result<String> {
    let provider = Arc::new(OllamaProvider::from_config(config.ollama.clone()));
    if !provider.health_check().await.unwrap_or(false) {
        warn!(host = %config.ollama.host, port = config.ollama.port, "Ollama not reachable; is `ollama serve` running?");
    }

    let backend = PromptedBackend::new(
        provider,
        PromptedBackendConfig {
            system_prompt: config.system_prompt.unwrap_or_else(|| TOOL_AGENT_PROMPT.into()),
            generation: GenerationOptions {
                model: config.model,
                ..GenerationOptions::default()
            },
            inject_tool_descriptions: true,
        },
    );

    let registry = local_registry(local)?;
    let remotes = start_bridges(&config.bridges).await?;

    let mut builder = Agent::builder()
        .backend(Arc::new(backend))
        .tools(registry)
        .config(config.agent);
    for remote in remotes {
        builder = builder.remote(remote);
    }
    let agent = builder.build().await?;
    info!(tools = ?agent.catalog().names(), "Agent ready");

    let answer = agent.ask(question).await;
    agent.shutdown().await;

    Ok(answer?)
}

/// `tool-agent tools`
pub async fn list_tools(config: AppConfig, local: LocalTools) -> anyhow::Result<Vec<String>> {
    let registry = local_registry(local)?;
    let remotes = start_bridges(&config.bridges).await?;

    let catalog = Catalog::build(registry, &remotes).await;
    for remote in &remotes {
        remote.close().await;
    }

    let catalog = catalog?;
    Ok(catalog
        .descriptors()
        .iter()
        .map(|d| describe(d, catalog.origin(&d.name).unwrap_or("?")))
        .collect())
}

fn describe(descriptor: &ToolDescriptor, origin: &str) -> String {
    let params: Vec<String> = descriptor
        .parameters
        .iter()
        .map(|p| {
            let marker = if p.required { "" } else { "?" };
            format!("{}{marker}: {}", p.name, p.kind.type_name())
        })
        .collect();

    format!(
        "{}({}) -> {}  [{origin}]\n    {}",
        descriptor.name,
        params.join(", "),
        descriptor.return_type.type_name(),
        descriptor.description
    )
}

/// `tool-agent serve-tools`: the provider side, on stdin/stdout
pub async fn serve_tools(mock_weather: bool) -> anyhow::Result<()> {
    let registry = local_registry(LocalTools {
        enabled: true,
        mock_weather,
    })?;

    let server = ToolServer::new(registry, Capabilities::new("tool-agent"));
    server
        .serve(tokio::io::stdin(), tokio::io::stdout())
        .await
        .context("serving tools on stdio")?;

    info!("Tool server stopped");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_local_registry_can_be_disabled() {
        let none = local_registry(LocalTools { enabled: false, mock_weather: true }).unwrap();
        assert!(none.is_empty());

        let all = local_registry(LocalTools { enabled: true, mock_weather: true }).unwrap();
        assert_eq!(all.len(), 7);
    }

    #[tokio::test]
    async fn test_list_tools_without_bridges() {
        let lines = list_tools(AppConfig::default(), LocalTools { enabled: true, mock_weather: true })
            .await
            .unwrap();

        assert_eq!(lines.len(), 7);
        assert!(lines[0].starts_with("add_numbers(a: integer, b: integer) -> integer  [local]"));
        assert!(lines[3].starts_with("get_current_time(utc_offset_hours?: integer, format?: string)"));
    }

    #[tokio::test]
    async fn test_failed_bridge_start_is_reported() {
        let bridges = vec![BridgeConfig::new("ghost", "/nonexistent/tool-provider-binary")];
        let err = start_bridges(&bridges).await.err().unwrap();
        assert!(format!("{err:#}").contains("ghost"));
    }
}
