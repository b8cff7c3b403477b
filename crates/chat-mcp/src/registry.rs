//! Tool discovery across configured endpoints
//!
//! [`ToolRegistryClient::fetch_tools`] connects to every endpoint, lists its
//! tools and returns a [`ToolSet`] that routes calls back to the owning
//! endpoint. Discovery is all-or-nothing: one unreachable endpoint fails the
//! whole fetch.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chat_llm::ToolDefinition;
use serde_json::Value;
use tracing::{debug, info, instrument, warn};

use crate::Result;
use crate::client::http::StreamableHttpClient;
use crate::client::{ArcMCPClient, MCPClient, MCPToolResult};
use crate::config::McpConfig;
use crate::error::MCPError;
use crate::tool::ToolDescriptor;

/// Connects to the configured endpoints and collects their tools
#[derive(Debug, Clone)]
pub struct ToolRegistryClient {
    config: McpConfig,
}

impl ToolRegistryClient {
    /// Create a registry client
    ///
    /// The configuration is validated here, before any network I/O.
    pub fn new(config: McpConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// The validated configuration
    pub fn config(&self) -> &McpConfig {
        &self.config
    }

    /// Connect to every endpoint (in label order) and gather their tools
    #[instrument(skip(self), fields(endpoints = self.config.len()))]
    pub async fn fetch_tools(&self) -> Result<ToolSet> {
        let mut connected: Vec<(String, ArcMCPClient)> = Vec::with_capacity(self.config.len());

        for (label, endpoint) in self.config.iter() {
            let client: ArcMCPClient = Arc::new(StreamableHttpClient::new(label.as_str(), endpoint)?);

            if let Err(e) = client.connect().await {
                for (opened, client) in &connected {
                    disconnect_quietly(opened, client).await;
                }
                return Err(MCPError::ConnectionFailed(format!(
                    "endpoint '{label}' ({}): {e}",
                    endpoint.url
                )));
            }

            connected.push((label.clone(), client));
        }

        ToolSet::from_clients(connected).await
    }
}

/// Shorthand for `ToolRegistryClient::new(config)?.fetch_tools()`
pub async fn fetch_tools(config: McpConfig) -> Result<ToolSet> {
    ToolRegistryClient::new(config)?.fetch_tools().await
}

/// Tools discovered across endpoints, with the clients that serve them
///
/// Read-only after discovery and safe to share between runs.
pub struct ToolSet {
    tools: Vec<ToolDescriptor>,
    index: HashMap<String, usize>,
    clients: BTreeMap<String, ArcMCPClient>,
}

impl ToolSet {
    /// A tool set with no tools and no endpoints
    pub fn empty() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
            clients: BTreeMap::new(),
        }
    }

    /// Build a tool set from already connected clients
    ///
    /// Clients are listed in label order. When two endpoints offer a tool with
    /// the same name, the first one wins.
    pub async fn from_clients(clients: Vec<(String, ArcMCPClient)>) -> Result<Self> {
        let clients: BTreeMap<String, ArcMCPClient> = clients.into_iter().collect();
        let mut set = Self {
            tools: Vec::new(),
            index: HashMap::new(),
            clients,
        };

        for (label, client) in &set.clients {
            let definitions = match client.list_tools().await {
                Ok(definitions) => definitions,
                Err(e) => {
                    set.close().await;
                    return Err(MCPError::ConnectionFailed(format!(
                        "endpoint '{label}': listing tools failed: {e}"
                    )));
                }
            };

            debug!(endpoint = %label, count = definitions.len(), "Discovered tools");

            for definition in definitions {
                if let Some(&existing) = set.index.get(&definition.name) {
                    warn!(
                        tool = %definition.name,
                        kept = %set.tools[existing].server,
                        ignored = %label,
                        "Duplicate tool name across endpoints"
                    );
                    continue;
                }
                set.index.insert(definition.name.clone(), set.tools.len());
                set.tools.push(ToolDescriptor::from_definition(label.as_str(), definition));
            }
        }

        info!(
            tools = set.tools.len(),
            endpoints = set.clients.len(),
            "Tool set ready"
        );

        Ok(set)
    }

    /// Number of tools
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// True when no tool was discovered
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Descriptors in discovery order
    pub fn descriptors(&self) -> &[ToolDescriptor] {
        &self.tools
    }

    /// Look up a tool by name
    pub fn get(&self, name: &str) -> Option<&ToolDescriptor> {
        self.index.get(name).map(|&i| &self.tools[i])
    }

    /// Whether a tool with this name exists
    pub fn contains(&self, name: &str) -> bool {
        self.index.contains_key(name)
    }

    /// Tool names in discovery order
    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name.as_str()).collect()
    }

    /// Labels of the endpoints backing this set
    pub fn endpoints(&self) -> Vec<&str> {
        self.clients.keys().map(String::as_str).collect()
    }

    /// Model-facing definitions of every tool
    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.tools.iter().map(ToolDescriptor::to_tool_definition).collect()
    }

    /// Run a tool on the endpoint that offers it
    #[instrument(skip(self, arguments))]
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<MCPToolResult> {
        let descriptor = self
            .get(name)
            .ok_or_else(|| MCPError::ToolNotFound(name.to_string()))?;

        let client = self
            .clients
            .get(&descriptor.server)
            .ok_or_else(|| {
                MCPError::ToolNotFound(format!("{name} (endpoint {} missing)", descriptor.server))
            })?;

        client.call_tool(name, arguments).await
    }

    /// Disconnect from every endpoint
    pub async fn close(&self) {
        for (label, client) in &self.clients {
            disconnect_quietly(label, client).await;
        }
    }
}

impl std::fmt::Debug for ToolSet {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolSet")
            .field("tools", &self.names())
            .field("endpoints", &self.endpoints())
            .finish()
    }
}

async fn disconnect_quietly(label: &str, client: &ArcMCPClient) {
    if let Err(e) = client.disconnect().await {
        debug!(endpoint = %label, error = %e, "Disconnect failed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::{MCPServerInfo, MCPToolDefinition};
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    fn assert_send<T: Send>(_: &T) {}

    #[test]
    fn test_discovery_futures_are_send() {
        let registry = ToolRegistryClient::new(McpConfig::single("math", "http://127.0.0.1:9/mcp"))
            .unwrap();
        assert_send(&registry.fetch_tools());
        assert_send(&fetch_tools(registry.config().clone()));

        let set = ToolSet::empty();
        assert_send(&set.close());
        assert_send(&set.call_tool("add", json!({})));
    }

        struct FakeClient {
        tools: Vec<&'static str>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeClient {
        fn with_tools(tools: Vec<&'static str>) -> Arc<Self> {
            Arc::new(Self {
                tools,
                calls: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl MCPClient for FakeClient {
        async fn connect(&self) -> Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn disconnect(&self) -> Result<()> {
            Ok(())
        }

        async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>> {
            Ok(self
                .tools
                .iter()
                .map(|name| MCPToolDefinition {
                    name: (*name).to_string(),
                    description: Some(format!("{name} tool")),
                    input_schema: json!({"type": "object"}),
                })
                .collect())
        }

        async fn call_tool(&self, name: &str, _arguments: Value) -> Result<MCPToolResult> {
            self.calls.lock().unwrap().push(name.to_string());
            Ok(MCPToolResult::text("ok"))
        }

        async fn server_info(&self) -> Option<MCPServerInfo> {
            None
        }
    }

    #[test]
    fn test_registry_rejects_invalid_config() {
        assert!(matches!(
            ToolRegistryClient::new(McpConfig::new()),
            Err(MCPError::ConfigError(_))
        ));
        assert!(ToolRegistryClient::new(McpConfig::single("math", "localhost:8000")).is_err());
        assert!(ToolRegistryClient::new(McpConfig::single("math", "http://localhost:8000/mcp")).is_ok());
    }

    #[tokio::test]
    async fn test_duplicate_names_first_label_wins() {
        let alpha = FakeClient::with_tools(vec!["add", "multiply"]);
        let beta = FakeClient::with_tools(vec!["add", "power"]);

        let set = ToolSet::from_clients(vec![
            ("beta".to_string(), beta.clone() as ArcMCPClient),
            ("alpha".to_string(), alpha.clone() as ArcMCPClient),
        ])
        .await
        .unwrap();

        assert_eq!(set.names(), ["add", "multiply", "power"]);
        assert_eq!(set.get("add").unwrap().server, "alpha");
        assert_eq!(set.get("power").unwrap().server, "beta");

        set.call_tool("add", json!({})).await.unwrap();
        set.call_tool("power", json!({})).await.unwrap();
        assert_eq!(*alpha.calls.lock().unwrap(), ["add"]);
        assert_eq!(*beta.calls.lock().unwrap(), ["power"]);
    }

    #[tokio::test]
    async fn test_unknown_tool_call() {
        let set = ToolSet::from_clients(vec![(
            "math".to_string(),
            FakeClient::with_tools(vec!["add"]) as ArcMCPClient,
        )])
        .await
        .unwrap();

        assert!(!set.contains("divide"));
        assert!(matches!(
            set.call_tool("divide", json!({})).await,
            Err(MCPError::ToolNotFound(ref name)) if name == "divide"
        ));
    }

    #[tokio::test]
    async fn test_tool_definitions_follow_descriptors() {
        let set = ToolSet::from_clients(vec![(
            "math".to_string(),
            FakeClient::with_tools(vec!["add", "multiply"]) as ArcMCPClient,
        )])
        .await
        .unwrap();

        let defs = set.tool_definitions();
        assert_eq!(defs.len(), 2);
        assert_eq!(defs[1].name, "multiply");
        assert_eq!(defs[1].description, "multiply tool");
        assert_eq!(set.endpoints(), ["math"]);
    }

    #[test]
    fn test_empty_set() {
        let set = ToolSet::empty();
        assert!(set.is_empty());
        assert!(set.tool_definitions().is_empty());
    }
}
