//! Endpoint configuration for the tool registry
//!
//! A configuration maps endpoint labels to streamable-HTTP endpoints:
//!
//! ```json
//! {
//!   "math": {
//!     "transport": "streamable_http",
//!     "url": "http://127.0.0.1:8000/mcp"
//!   }
//! }
//! ```
//!
//! The same map may also be nested under an `mcpServers` key. URLs and header
//! values support `${VAR}` and `$VAR` expansion when loaded from a file.

use crate::error::MCPError;
use reqwest::header::{HeaderName, HeaderValue};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;

/// Default request timeout for a tool endpoint, in seconds
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Transport kinds an endpoint may name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transport {
    /// MCP streamable HTTP (POST JSON-RPC, JSON or SSE replies)
    StreamableHttp,
}

impl FromStr for Transport {
    type Err = MCPError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "streamable_http" | "streamable-http" | "http" => Ok(Self::StreamableHttp),
            other => Err(MCPError::ConfigError(format!(
                "unsupported transport '{other}' (only streamable_http is supported)"
            ))),
        }
    }
}

/// One tool endpoint
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    /// Transport name; see [`Transport`]
    #[serde(default = "default_transport")]
    pub transport: String,

    /// Endpoint URL
    pub url: String,

    /// Extra HTTP headers sent with every request
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub headers: BTreeMap<String, String>,

    /// Request timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

fn default_transport() -> String {
    "streamable_http".to_string()
}

fn default_timeout() -> u64 {
    DEFAULT_TIMEOUT_SECS
}

impl EndpointConfig {
    /// A streamable-HTTP endpoint with default options
    pub fn streamable_http(url: impl Into<String>) -> Self {
        Self {
            transport: default_transport(),
            url: url.into(),
            headers: BTreeMap::new(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Add a header sent with every request
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Parsed transport kind
    pub fn transport_kind(&self) -> Result<Transport, MCPError> {
        self.transport.parse()
    }

    /// Check this endpoint without touching the network
    pub fn validate(&self, label: &str) -> Result<(), MCPError> {
        self.transport_kind().map_err(|_| {
            MCPError::ConfigError(format!(
                "endpoint '{label}': unsupported transport '{}' (only streamable_http is supported)",
                self.transport
            ))
        })?;

        let url = url::Url::parse(&self.url).map_err(|e| {
            MCPError::ConfigError(format!("endpoint '{label}': invalid URL '{}': {e}", self.url))
        })?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(MCPError::ConfigError(format!(
                "endpoint '{label}': URL '{}' must use http or https",
                self.url
            )));
        }

        if self.timeout_secs == 0 {
            return Err(MCPError::ConfigError(format!(
                "endpoint '{label}': timeout_secs must be at least 1"
            )));
        }

        for (name, value) in &self.headers {
            HeaderName::from_str(name).map_err(|e| {
                MCPError::ConfigError(format!("endpoint '{label}': invalid header name '{name}': {e}"))
            })?;
            HeaderValue::from_str(value).map_err(|e| {
                MCPError::ConfigError(format!(
                    "endpoint '{label}': invalid value for header '{name}': {e}"
                ))
            })?;
        }

        Ok(())
    }
}

/// All configured endpoints, keyed by label
///
/// Labels iterate in sorted order, which is also the connection order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct McpConfig {
    /// Endpoint definitions
    pub endpoints: BTreeMap<String, EndpointConfig>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum ConfigFile {
    Nested {
        #[serde(rename = "mcpServers")]
        mcp_servers: BTreeMap<String, EndpointConfig>,
    },
    Flat(BTreeMap<String, EndpointConfig>),
}

impl McpConfig {
    /// Empty configuration
    pub fn new() -> Self {
        Self::default()
    }

    /// Configuration with a single streamable-HTTP endpoint
    pub fn single(label: impl Into<String>, url: impl Into<String>) -> Self {
        Self::new().with_endpoint(label, EndpointConfig::streamable_http(url))
    }

    /// Add or replace an endpoint
    pub fn with_endpoint(mut self, label: impl Into<String>, endpoint: EndpointConfig) -> Self {
        self.endpoints.insert(label.into(), endpoint);
        self
    }

    /// Parse a configuration from JSON text
    pub fn from_json_str(content: &str) -> Result<Self, MCPError> {
        let parsed: ConfigFile = serde_json::from_str(content)
            .map_err(|e| MCPError::ConfigError(format!("Failed to parse config: {e}")))?;

        let endpoints = match parsed {
            ConfigFile::Nested { mcp_servers } => mcp_servers,
            ConfigFile::Flat(endpoints) => endpoints,
        };
        Ok(Self { endpoints })
    }

    /// Load configuration from a file, expanding environment variables
    ///
    /// # Example
    ///
    /// ```no_run
    /// # use chat_mcp::config::McpConfig;
    /// let config = McpConfig::from_file("mcp.json")?;
    /// # Ok::<(), chat_mcp::error::MCPError>(())
    /// ```
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, MCPError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            MCPError::ConfigError(format!(
                "Failed to read config file {}: {e}",
                path.display()
            ))
        })?;

        let mut config = Self::from_json_str(&content)?;
        config.resolve_env_vars()?;
        Ok(config)
    }

    /// Resolve environment variables in URLs and header values
    pub fn resolve_env_vars(&mut self) -> Result<(), MCPError> {
        for endpoint in self.endpoints.values_mut() {
            endpoint.url = resolve_env_string(&endpoint.url)?;
            for value in endpoint.headers.values_mut() {
                *value = resolve_env_string(value)?;
            }
        }
        Ok(())
    }

    /// Check every endpoint; at least one is required
    pub fn validate(&self) -> Result<(), MCPError> {
        if self.endpoints.is_empty() {
            return Err(MCPError::ConfigError(
                "no tool endpoints configured".to_string(),
            ));
        }
        for (label, endpoint) in &self.endpoints {
            endpoint.validate(label)?;
        }
        Ok(())
    }

    /// Number of endpoints
    pub fn len(&self) -> usize {
        self.endpoints.len()
    }

    /// True when no endpoint is configured
    pub fn is_empty(&self) -> bool {
        self.endpoints.is_empty()
    }

    /// Endpoints in label order
    pub fn iter(&self) -> impl Iterator<Item = (&String, &EndpointConfig)> {
        self.endpoints.iter()
    }
}

/// Resolve environment variable references in strings
///
/// Supports `${VAR}` and `$VAR` syntax.
///
/// # Example
///
/// ```
/// # use chat_mcp::config::resolve_env_string;
/// let home = std::env::var("HOME").unwrap_or_default();
/// let result = resolve_env_string("${HOME}/mcp")?;
/// assert_eq!(result, format!("{home}/mcp"));
/// # Ok::<(), chat_mcp::error::MCPError>(())
/// ```
pub fn resolve_env_string(s: &str) -> Result<String, MCPError> {
    let mut result = s.to_string();

    // Pattern for ${VAR} syntax
    let re_braces = regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)\}")
        .map_err(|e| MCPError::InvalidPattern(e.to_string()))?;

    for cap in re_braces.captures_iter(s) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| MCPError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    // Pattern for $VAR syntax (without braces)
    let re_simple = regex::Regex::new(r"\$([A-Za-z_][A-Za-z0-9_]*)")
        .map_err(|e| MCPError::InvalidPattern(e.to_string()))?;

    for cap in re_simple.captures_iter(&result.clone()) {
        let var_name = &cap[1];
        let value =
            std::env::var(var_name).map_err(|_| MCPError::EnvVarNotFound(var_name.to_string()))?;
        result = result.replace(&cap[0], &value);
    }

    Ok(result)
}
