//! Tool execution step
//!
//! Runs the tool calls of one assistant message against the tool set and
//! produces one tool-result message per call, in call order. Calls run
//! sequentially.
//!
//! A call naming a tool the set does not have, or a tool reporting
//! `isError`, becomes an error tool-result message so the model can react to
//! it. A failed request to the tool endpoint aborts the step.

use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use chat_core::Result;
use chat_llm::{Message, ToolCall};
use chat_mcp::{ToolSet, convert_tool_result};
use tracing::{info, warn};

/// Event handler for tool execution events
///
/// Implement this trait to receive callbacks while a run executes tools,
/// for example to report progress to a front end.
#[async_trait]
pub trait ExecutorEventHandler: Send + Sync {
    /// Called when a tool call starts
    async fn on_tool_start(&self, _call: &ToolCall) {}

    /// Called when a tool call finished, with its text or error text
    async fn on_tool_done(
        &self,
        _call: &ToolCall,
        _result: std::result::Result<&str, &str>,
        _duration_ms: u64,
    ) {
    }

    /// Called when a run produced its final answer
    async fn on_complete(&self, _answer: &str) {}
}

/// No-op event handler for when events are not needed
pub struct NoOpEventHandler;

#[async_trait]
impl ExecutorEventHandler for NoOpEventHandler {}

/// Executes tool calls against a [`ToolSet`]
#[derive(Clone, Default)]
pub struct ToolExecutor {
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
}

impl ToolExecutor {
    /// Create an executor without an event handler
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the event handler for receiving execution events
    pub fn with_event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// The configured event handler, if any
    pub fn event_handler(&self) -> Option<&Arc<dyn ExecutorEventHandler>> {
        self.event_handler.as_ref()
    }

    /// Run every call in order and return their tool-result messages
    pub async fn execute(&self, calls: &[ToolCall], tools: &ToolSet) -> Result<Vec<Message>> {
        info!(tool_count = calls.len(), "Starting tool execution");

        let mut results = Vec::with_capacity(calls.len());
        for call in calls {
            results.push(self.execute_one(call, tools).await?);
        }

        Ok(results)
    }

    async fn execute_one(&self, call: &ToolCall, tools: &ToolSet) -> Result<Message> {
        let input_preview: String = call.arguments.to_string().chars().take(500).collect();
        info!(
            tool_name = %call.name,
            tool_id = %call.id,
            input_preview = %input_preview,
            "Executing tool"
        );

        if let Some(handler) = &self.event_handler {
            handler.on_tool_start(call).await;
        }

        if !tools.contains(&call.name) {
            let error = format!("Error: tool '{}' not found", call.name);
            warn!(tool_name = %call.name, "Model requested an unknown tool");
            self.done(call, Err(&error), 0).await;
            return Ok(Message::tool_error(&call.id, &call.name, error));
        }

        let start_time = Instant::now();
        let outcome = tools.call_tool(&call.name, call.arguments.clone()).await;
        let duration_ms = u64::try_from(start_time.elapsed().as_millis()).unwrap_or(u64::MAX);

        let result = match outcome {
            Ok(result) => result,
            Err(e) => {
                warn!(tool_name = %call.name, duration_ms, error = %e, "Tool request failed");
                return Err(e.into());
            }
        };

        let text = convert_tool_result(&result.content);
        if result.is_error() {
            warn!(tool_name = %call.name, duration_ms, error = %text, "Tool reported an error");
            self.done(call, Err(&text), duration_ms).await;
            return Ok(Message::tool_error(&call.id, &call.name, text));
        }

        let result_preview: String = text.chars().take(500).collect();
        info!(
            tool_name = %call.name,
            duration_ms,
            result_length = text.len(),
            result_preview = %result_preview,
            "Tool execution succeeded"
        );
        self.done(call, Ok(&text), duration_ms).await;

        Ok(Message::tool_result(&call.id, &call.name, text))
    }

    async fn done(&self, call: &ToolCall, result: std::result::Result<&str, &str>, duration_ms: u64) {
        if let Some(handler) = &self.event_handler {
            handler.on_tool_done(call, result, duration_ms).await;
        }
    }
}

impl std::fmt::Debug for ToolExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolExecutor")
            .field("event_handler", &self.event_handler.is_some())
            .finish()
    }
}
