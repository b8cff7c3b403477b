//! Application configuration and wiring
//!
//! Reads the environment (after an optional `.env`), then connects the tool
//! endpoints and the model into a ready [`TurnController`].

use std::path::PathBuf;
use std::sync::Arc;

use chat_core::{Error, Result};
use chat_llm::providers::{GeminiConfig, GeminiProvider};
use chat_llm::{GenerationSettings, LLMProvider, ModelAdapter};
use chat_mcp::{McpConfig, ToolRegistryClient};
use chat_utils::{ConfigError, env_parse, env_var, load_dotenv};
use tracing::info;

use crate::controller::{ControllerConfig, DEFAULT_MAX_ITERATIONS, TurnController};

/// Path of a JSON file listing the tool endpoints
pub const MCP_CONFIG_ENV: &str = "CHAT_MCP_CONFIG";
/// URL of the single `math` endpoint used without a config file
pub const MCP_URL_ENV: &str = "CHAT_MCP_URL";
/// Bound on model calls per run
pub const MAX_ITERATIONS_ENV: &str = "CHAT_MAX_ITERATIONS";

pub const DEFAULT_MCP_URL: &str = "http://127.0.0.1:8000/mcp";
pub const DEFAULT_ENDPOINT_LABEL: &str = "math";

/// Everything needed to build a controller
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub gemini: GeminiConfig,
    pub mcp: McpConfig,
    pub controller: ControllerConfig,
}

impl AppConfig {
    /// Load `.env` if present, then read the process environment
    pub fn from_env() -> Result<Self> {
        load_dotenv().map_err(config_error)?;
        Self::from_current_env()
    }

    /// Read the process environment as it is
    pub fn from_current_env() -> Result<Self> {
        let gemini = GeminiConfig::from_env()?;
        gemini.validate()?;

        let mcp = match env_var(MCP_CONFIG_ENV) {
            Some(path) => McpConfig::from_file(PathBuf::from(path))?,
            None => McpConfig::single(
                DEFAULT_ENDPOINT_LABEL,
                env_var(MCP_URL_ENV).unwrap_or_else(|| DEFAULT_MCP_URL.to_string()),
            ),
        };
        mcp.validate()?;

        let controller = ControllerConfig {
            max_iterations: env_parse(MAX_ITERATIONS_ENV, DEFAULT_MAX_ITERATIONS)
                .map_err(config_error)?,
        };
        controller.validate()?;

        Ok(Self {
            gemini,
            mcp,
            controller,
        })
    }

    /// Create the Gemini provider and connect every tool endpoint
    pub async fn connect(&self) -> Result<TurnController> {
        let provider: Arc<dyn LLMProvider> =
            Arc::new(GeminiProvider::with_config(self.gemini.clone())?);
        let settings = GenerationSettings::new(&self.gemini.model);

        build_controller(provider, settings, &self.mcp, self.controller.clone()).await
    }
}

/// Fetch the tools of `mcp` and bind them to a provider
///
/// Fails before any model call when an endpoint cannot be reached.
pub async fn build_controller(
    provider: Arc<dyn LLMProvider>,
    settings: GenerationSettings,
    mcp: &McpConfig,
    config: ControllerConfig,
) -> Result<TurnController> {
    let tools = ToolRegistryClient::new(mcp.clone())?.fetch_tools().await?;

    info!(
        provider = provider.name(),
        model = %settings.model,
        tools = ?tools.names(),
        "Controller ready"
    );

    TurnController::builder()
        .adapter(ModelAdapter::new(provider, settings))
        .tools(Arc::new(tools))
        .config(config)
        .build()
}

fn config_error(err: ConfigError) -> Error {
    Error::Configuration(err.to_string())
}
