//! Message types for LLM communication
//!
//! A conversation is an ordered list of [`Message`]s. Assistant messages may
//! carry tool-invocation requests ([`ContentBlock::ToolUse`]); the answers to
//! those requests come back as tool messages ([`ContentBlock::ToolResult`]).

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Message role in a conversation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// User message
    User,
    /// Assistant message
    Assistant,
    /// Result of a tool invocation
    Tool,
}

/// Content block in a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentBlock {
    /// Plain text content
    Text {
        /// Text content
        text: String,
    },

    /// Tool use request from assistant
    ToolUse {
        /// Unique ID for this tool use
        id: String,
        /// Tool name
        name: String,
        /// Tool input parameters (JSON)
        input: Value,
        /// Opaque provider signature that must be echoed back with the call
        #[serde(default, skip_serializing_if = "Option::is_none")]
        signature: Option<String>,
    },

    /// Tool result
    ToolResult {
        /// ID of the tool use this is responding to
        tool_use_id: String,
        /// Name of the tool that produced the result
        name: String,
        /// Result content
        content: String,
        /// Whether this is an error result
        #[serde(default, skip_serializing_if = "Option::is_none")]
        is_error: Option<bool>,
    },
}

/// Message content: either simple text or structured blocks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    /// Simple text content
    Text(String),
    /// Structured content blocks
    Blocks(Vec<ContentBlock>),
}

/// A tool-invocation request lifted out of an assistant message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Request id, echoed in the matching tool result
    pub id: String,
    /// Name of the tool to run
    pub name: String,
    /// Argument payload
    pub arguments: Value,
}

/// A message in the conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// Message role
    pub role: Role,

    /// Message content
    #[serde(skip_serializing_if = "Option::is_none")]
    pub content: Option<MessageContent>,
}

impl Message {
    /// Create a user message with text
    pub fn user(text: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(MessageContent::Text(text.into())),
        }
    }

    /// Create an assistant message with text
    pub fn assistant(text: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(MessageContent::Text(text.into())),
        }
    }

    /// Create an assistant message from blocks
    pub fn assistant_blocks(blocks: Vec<ContentBlock>) -> Self {
        Self {
            role: Role::Assistant,
            content: Some(MessageContent::Blocks(blocks)),
        }
    }

    /// Create a tool message with a successful result
    pub fn tool_result(
        tool_use_id: impl Into<String>,
        name: impl Into<String>,
        result: impl Into<String>,
    ) -> Self {
        Self::tool_message(tool_use_id.into(), name.into(), result.into(), None)
    }

    /// Create a tool message with an error result
    pub fn tool_error(
        tool_use_id: impl Into<String>,
        name: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        Self::tool_message(tool_use_id.into(), name.into(), error.into(), Some(true))
    }

    fn tool_message(
        tool_use_id: String,
        name: String,
        content: String,
        is_error: Option<bool>,
    ) -> Self {
        Self {
            role: Role::Tool,
            content: Some(MessageContent::Blocks(vec![ContentBlock::ToolResult {
                tool_use_id,
                name,
                content,
                is_error,
            }])),
        }
    }

    /// Content blocks of the message (plain text is one `Text` block)
    pub fn blocks(&self) -> Vec<ContentBlock> {
        match &self.content {
            Some(MessageContent::Text(text)) => vec![ContentBlock::Text { text: text.clone() }],
            Some(MessageContent::Blocks(blocks)) => blocks.clone(),
            None => Vec::new(),
        }
    }

    /// All text content of the message, concatenated in order
    pub fn text(&self) -> String {
        match &self.content {
            Some(MessageContent::Text(s)) => s.clone(),
            Some(MessageContent::Blocks(blocks)) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::Text { text } => Some(text.as_str()),
                    _ => None,
                })
                .collect(),
            None => String::new(),
        }
    }

    /// Extract tool use requests from assistant messages, in order
    pub fn tool_calls(&self) -> Vec<ToolCall> {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks
                .iter()
                .filter_map(|b| match b {
                    ContentBlock::ToolUse {
                        id, name, input, ..
                    } => Some(ToolCall {
                        id: id.clone(),
                        name: name.clone(),
                        arguments: input.clone(),
                    }),
                    _ => None,
                })
                .collect(),
            _ => Vec::new(),
        }
    }

    /// Check if this message contains any tool uses
    pub fn has_tool_uses(&self) -> bool {
        matches!(
            &self.content,
            Some(MessageContent::Blocks(blocks))
                if blocks.iter().any(|b| matches!(b, ContentBlock::ToolUse { .. }))
        )
    }

    /// Id of the tool use this message answers, for tool messages
    pub fn tool_use_id(&self) -> Option<&str> {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks.iter().find_map(|b| match b {
                ContentBlock::ToolResult { tool_use_id, .. } => Some(tool_use_id.as_str()),
                _ => None,
            }),
            _ => None,
        }
    }

    /// Whether this is a tool message flagged as an error
    pub fn is_error_result(&self) -> bool {
        match &self.content {
            Some(MessageContent::Blocks(blocks)) => blocks
                .iter()
                .any(|b| matches!(b, ContentBlock::ToolResult { is_error: Some(true), .. })),
            _ => false,
        }
    }
}
