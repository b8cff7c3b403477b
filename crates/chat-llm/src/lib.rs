//! Language model layer for mcp-math-chat
//!
//! This crate provides the provider-agnostic pieces the turn controller
//! needs to talk to a hosted chat model:
//!
//! - Message types, including tool-invocation requests and tool results
//! - Completion request/response types
//! - Tool definitions for function calling
//! - The [`LLMProvider`] trait and the [`ModelAdapter`] wrapper around it
//! - The Gemini provider

pub mod adapter;
pub mod completion;
pub mod error;
pub mod messages;
pub mod providers;
pub mod tools;

// Re-export main types
pub use adapter::{GenerationSettings, LLMProvider, ModelAdapter};
pub use completion::{CompletionRequest, CompletionResponse, DEFAULT_MAX_TOKENS, StopReason, TokenUsage};
pub use error::{LLMError, Result};
pub use messages::{ContentBlock, Message, MessageContent, Role, ToolCall};
pub use tools::ToolDefinition;
