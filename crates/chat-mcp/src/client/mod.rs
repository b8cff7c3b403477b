//! Client side of one tool endpoint
//!
//! The trait below is what the registry holds; `http` is the only transport.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::sync::Arc;

use crate::Result;
use crate::error::MCPError;

pub mod http;

/// A connection to one tool endpoint
///
/// Shared behind `Arc`, so state changes go through interior mutability.
#[async_trait]
pub trait MCPClient: Send + Sync {
    /// Run the `initialize` handshake
    async fn connect(&self) -> Result<()>;

    fn is_connected(&self) -> bool;

    /// End the session; a no-op when not connected
    async fn disconnect(&self) -> Result<()>;

    /// Every tool the endpoint offers, following pagination to the end
    async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>>;

    /// Invoke `name`; a tool-level failure comes back as `Ok` with `isError` set
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<MCPToolResult>;

    /// Identity reported during the handshake
    async fn server_info(&self) -> Option<MCPServerInfo>;
}

/// One entry of a `tools/list` page
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolDefinition {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(rename = "inputSchema", default = "empty_object_schema")]
    pub input_schema: Value,
}

fn empty_object_schema() -> Value {
    serde_json::json!({ "type": "object" })
}

/// Reply to `tools/call`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPToolResult {
    #[serde(default)]
    pub content: Vec<MCPContent>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "isError")]
    pub is_error: Option<bool>,
}

impl MCPToolResult {
    /// Result holding a single text block
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            content: vec![MCPContent::Text { text: text.into() }],
            is_error: None,
        }
    }

    /// `isError`, absent meaning false
    pub fn is_error(&self) -> bool {
        self.is_error.unwrap_or(false)
    }
}

/// One content item of a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum MCPContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Audio {
        data: String,
        #[serde(rename = "mimeType")]
        mime_type: String,
    },
    Resource {
        resource: MCPEmbeddedResource,
    },
    /// Anything else, such as `resource_link`
    #[serde(other)]
    Unknown,
}

/// Resource carried inline in a tool result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPEmbeddedResource {
    pub uri: String,
    #[serde(default, skip_serializing_if = "Option::is_none", rename = "mimeType")]
    pub mime_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    /// Base64 payload
    pub blob: Option<String>,
}

/// `serverInfo` plus the negotiated protocol version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MCPServerInfo {
    pub name: String,
    pub version: String,
    #[serde(rename = "protocolVersion")]
    pub protocol_version: String,
}

/// Shared client handle
pub type ArcMCPClient = Arc<dyn MCPClient>;

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_tool_definition_defaults() {
        let def: MCPToolDefinition = serde_json::from_value(json!({"name": "ping"})).unwrap();
        assert_eq!(def.name, "ping");
        assert!(def.description.is_none());
        assert_eq!(def.input_schema, json!({"type": "object"}));
    }

    #[test]
    fn test_tool_result_parsing() {
        let result: MCPToolResult = serde_json::from_value(json!({
            "content": [
                {"type": "text", "text": "96"},
                {"type": "image", "data": "aGk=", "mimeType": "image/png"},
                {"type": "resource", "resource": {"uri": "file:///r.txt", "text": "hi"}},
                {"type": "resource_link", "uri": "file:///x"}
            ],
            "isError": false
        }))
        .unwrap();

        assert_eq!(result.content.len(), 4);
        assert!(!result.is_error());
        assert_eq!(result.content[0], MCPContent::Text { text: "96".into() });
        assert_eq!(result.content[3], MCPContent::Unknown);
    }

    #[test]
    fn test_error_result() {
        let result: MCPToolResult = serde_json::from_value(json!({
            "content": [{"type": "text", "text": "division by zero"}],
            "isError": true
        }))
        .unwrap();
        assert!(result.is_error());
    }

    #[test]
    fn test_not_connected_message() {
        assert_eq!(MCPError::NotConnected.to_string(), "MCP client is not connected");
    }
}
