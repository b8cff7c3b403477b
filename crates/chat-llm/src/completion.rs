//! Completion request and response types
//!
//! A request always carries the whole conversation so far; providers are
//! stateless between calls.

use crate::{Message, ToolDefinition};
use serde::{Deserialize, Serialize};

/// Token limit used when a request does not set one
pub const DEFAULT_MAX_TOKENS: usize = 4096;

/// One call to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionRequest {
    pub model: String,

    /// Full ordered history, starting with the user query
    pub messages: Vec<Message>,

    /// System instruction, if any
    #[serde(skip_serializing_if = "Option::is_none")]
    pub system: Option<String>,

    pub max_tokens: usize,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,

    /// Tools the model may call; `None` when nothing is bound
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolDefinition>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_sequences: Option<Vec<String>>,
}

impl CompletionRequest {
    /// Start building a request for `model`
    pub fn builder(model: impl Into<String>) -> CompletionRequestBuilder {
        CompletionRequestBuilder::new(model)
    }

    /// Bound tools, empty when none
    pub fn tool_definitions(&self) -> &[ToolDefinition] {
        self.tools.as_deref().unwrap_or_default()
    }
}

/// The model's reply to one request
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompletionResponse {
    /// Assistant message, possibly holding tool-use blocks
    pub message: Message,
    pub stop_reason: StopReason,
    pub usage: TokenUsage,
}

/// Why the model stopped producing output
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The model considers its turn finished
    EndTurn,
    /// Output was cut at the token limit
    MaxTokens,
    StopSequence,
    /// The reply contains tool calls
    ToolUse,
    /// Output withheld by the provider's safety filters
    Blocked,
    /// The model tried to call a tool but emitted an unusable call
    MalformedToolCall,
}

/// Token accounting reported by the provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    pub input_tokens: usize,
    pub output_tokens: usize,
}

impl TokenUsage {
    pub fn total(&self) -> usize {
        self.input_tokens + self.output_tokens
    }
}

/// Builder for [`CompletionRequest`]
#[derive(Debug)]
pub struct CompletionRequestBuilder {
    request: CompletionRequest,
}

impl CompletionRequestBuilder {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            request: CompletionRequest {
                model: model.into(),
                messages: Vec::new(),
                system: None,
                max_tokens: DEFAULT_MAX_TOKENS,
                temperature: None,
                tools: None,
                stop_sequences: None,
            },
        }
    }

    /// Replace the history
    pub fn messages(mut self, messages: Vec<Message>) -> Self {
        self.request.messages = messages;
        self
    }

    /// Append one message to the history
    pub fn add_message(mut self, message: Message) -> Self {
        self.request.messages.push(message);
        self
    }

    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.request.system = Some(system.into());
        self
    }

    pub fn max_tokens(mut self, max_tokens: usize) -> Self {
        self.request.max_tokens = max_tokens;
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.request.temperature = Some(temperature);
        self
    }

    /// Bind tools; an empty list binds none
    pub fn tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.request.tools = if tools.is_empty() { None } else { Some(tools) };
        self
    }

    pub fn stop_sequences(mut self, sequences: Vec<String>) -> Self {
        self.request.stop_sequences = Some(sequences);
        self
    }

    pub fn build(self) -> CompletionRequest {
        self.request
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder() {
        let request = CompletionRequest::builder("gemini-3-flash-preview")
            .add_message(Message::user("Hello"))
            .system("You are a helpful assistant")
            .max_tokens(2048)
            .temperature(0.2)
            .build();

        assert_eq!(request.model, "gemini-3-flash-preview");
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.max_tokens, 2048);
        assert_eq!(request.temperature, Some(0.2));
        assert!(request.tools.is_none());
        assert!(request.tool_definitions().is_empty());
    }

    #[test]
    fn test_empty_tools_are_not_bound() {
        let request = CompletionRequest::builder("m").tools(Vec::new()).build();
        assert!(request.tools.is_none());

        let request = CompletionRequest::builder("m")
            .tools(vec![ToolDefinition::new("add", "Add", json!({}))])
            .build();
        assert_eq!(request.tool_definitions().len(), 1);
        assert_eq!(request.tool_definitions()[0].name, "add");
    }

    #[test]
    fn test_defaults_and_usage() {
        let request = CompletionRequest::builder("m").build();
        assert_eq!(request.max_tokens, DEFAULT_MAX_TOKENS);
        assert!(request.system.is_none());

        let usage = TokenUsage {
            input_tokens: 12,
            output_tokens: 4,
        };
        assert_eq!(usage.total(), 16);
    }
}
