//! Model Context Protocol (MCP) tool registry for mcp-math-chat
//!
//! Connects to remote MCP servers over the streamable HTTP transport,
//! discovers their tools and routes tool calls back to them.
//!
//! # Example
//!
//! ```no_run
//! use chat_mcp::{McpConfig, ToolRegistryClient};
//!
//! # async fn run() -> chat_mcp::Result<()> {
//! let config = McpConfig::single("math", "http://127.0.0.1:8000/mcp");
//! let tools = ToolRegistryClient::new(config)?.fetch_tools().await?;
//! for descriptor in tools.descriptors() {
//!     println!("{} ({})", descriptor.name, descriptor.server);
//! }
//! # Ok(())
//! # }
//! ```

pub mod client;
pub mod config;
pub mod error;
pub mod registry;
pub mod tool;

pub use client::http::StreamableHttpClient;
pub use client::{
    ArcMCPClient, MCPClient, MCPContent, MCPEmbeddedResource, MCPServerInfo, MCPToolDefinition,
    MCPToolResult,
};
pub use config::{EndpointConfig, McpConfig, Transport};
pub use error::MCPError;
pub use registry::{ToolRegistryClient, ToolSet, fetch_tools};
pub use tool::{ToolDescriptor, convert_tool_result};

/// Result type for MCP operations
pub type Result<T> = std::result::Result<T, MCPError>;
