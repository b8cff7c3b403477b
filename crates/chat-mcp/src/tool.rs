//! Tool descriptors and result conversion
//!
//! A [`ToolDescriptor`] is what the model gets to see of a remote tool. Tool
//! results come back as MCP content blocks and are flattened into the text
//! that goes into a tool-result message.

use chat_llm::ToolDefinition;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};

use crate::client::{MCPContent, MCPToolDefinition};

/// A tool offered by one endpoint
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    /// Tool name, unique within a tool set
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// JSON Schema of the arguments
    pub input_schema: Value,

    /// Label of the endpoint the tool came from
    pub server: String,
}

impl ToolDescriptor {
    /// Build a descriptor from a `tools/list` entry
    pub fn from_definition(server: impl Into<String>, definition: MCPToolDefinition) -> Self {
        Self {
            name: definition.name,
            description: definition.description.unwrap_or_default(),
            input_schema: definition.input_schema,
            server: server.into(),
        }
    }

    /// The model-facing definition of this tool
    pub fn to_tool_definition(&self) -> ToolDefinition {
        ToolDefinition::new(&self.name, &self.description, self.input_schema.clone())
    }
}

/// Flatten MCP content blocks into result text
///
/// Text blocks are joined with newlines. Images, audio and embedded resources
/// are summarized as one JSON line each.
pub fn convert_tool_result(content: &[MCPContent]) -> String {
    let mut lines = Vec::new();

    for block in content {
        match block {
            MCPContent::Text { text } => lines.push(text.clone()),
            MCPContent::Image { data, mime_type } => lines.push(
                json!({
                    "type": "image",
                    "mimeType": mime_type,
                    "dataLength": data.len(),
                })
                .to_string(),
            ),
            MCPContent::Audio { data, mime_type } => lines.push(
                json!({
                    "type": "audio",
                    "mimeType": mime_type,
                    "dataLength": data.len(),
                })
                .to_string(),
            ),
            MCPContent::Resource { resource } => lines.push(
                json!({
                    "type": "resource",
                    "uri": resource.uri,
                    "mimeType": resource.mime_type,
                    "text": resource.text,
                })
                .to_string(),
            ),
            MCPContent::Unknown => {}
        }
    }

    lines.join("\n")
}
