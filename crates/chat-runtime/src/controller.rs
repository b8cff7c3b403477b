//! Turn controller
//!
//! Drives one run as an explicit two-state loop:
//!
//! - `Modeling`: send the full history and every tool definition to the
//!   model and append its reply. A reply with tool calls moves to
//!   `Tooling`, anything else is terminal.
//! - `Tooling`: execute the calls of the reply just appended, append their
//!   results and go back to `Modeling`.
//!
//! Every run starts from a history holding only the user query. The number
//! of model calls per run is bounded by [`ControllerConfig::max_iterations`].

use std::sync::Arc;

use async_trait::async_trait;
use chat_core::{Agent, Error, Result};
use chat_llm::{Message, ModelAdapter, StopReason, ToolCall};
use chat_mcp::ToolSet;
use tracing::{debug, info, instrument, warn};

use crate::executor::{ExecutorEventHandler, ToolExecutor};
use crate::history::ConversationHistory;

/// Default bound on model calls per run
pub const DEFAULT_MAX_ITERATIONS: usize = 10;

/// Configuration for the turn controller
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Maximum number of model calls in one run
    pub max_iterations: usize,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }
}

impl ControllerConfig {
    pub fn validate(&self) -> Result<()> {
        if self.max_iterations == 0 {
            return Err(Error::Configuration(
                "max_iterations must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// State of a run between two steps
#[derive(Debug, Clone, PartialEq)]
pub enum TurnState {
    /// Waiting for the next model reply
    Modeling,
    /// Tool calls from the last reply still have to run
    Tooling(Vec<ToolCall>),
    /// The model replied without tool calls
    Terminal(Message),
}

/// Result of one completed run
#[derive(Debug, Clone)]
pub struct RunOutcome {
    /// Text of the terminal message (empty when the model sent none)
    pub answer: String,
    /// Everything exchanged during the run, starting with the user query
    pub history: ConversationHistory,
    /// Model calls made
    pub iterations: usize,
    /// Tool calls executed
    pub tool_invocations: usize,
}

/// Runs queries through the model/tool loop
///
/// Holds only shared read-only pieces, so one controller can serve many
/// runs, concurrently if need be.
pub struct TurnController {
    adapter: ModelAdapter,
    tools: Arc<ToolSet>,
    executor: ToolExecutor,
    config: ControllerConfig,
    name: String,
}

impl TurnController {
    /// Create a controller with the default configuration
    pub fn new(adapter: ModelAdapter, tools: Arc<ToolSet>) -> Self {
        Self {
            adapter,
            tools,
            executor: ToolExecutor::new(),
            config: ControllerConfig::default(),
            name: "math-chat".to_string(),
        }
    }

    /// Create a new controller builder
    pub fn builder() -> TurnControllerBuilder {
        TurnControllerBuilder::new()
    }

    pub fn config(&self) -> &ControllerConfig {
        &self.config
    }

    pub fn tools(&self) -> &Arc<ToolSet> {
        &self.tools
    }

    pub fn adapter(&self) -> &ModelAdapter {
        &self.adapter
    }

    /// Answer one query, returning the full outcome of the run
    #[instrument(skip_all, fields(controller = %self.name))]
    pub async fn run(&self, query: impl Into<String>) -> Result<RunOutcome> {
        let mut history = ConversationHistory::with_query(query);
        let definitions = self.tools.tool_definitions();
        let max_iterations = self.config.max_iterations;

        let mut state = TurnState::Modeling;
        let mut iterations = 0;
        let mut tool_invocations = 0;

        loop {
            state = match state {
                TurnState::Modeling => {
                    if iterations >= max_iterations {
                        warn!(max_iterations, "Iteration limit reached without a final answer");
                        return Err(Error::IterationLimit(max_iterations));
                    }
                    iterations += 1;

                    info!(
                        iteration = iterations,
                        max_iterations,
                        history_len = history.len(),
                        tool_count = definitions.len(),
                        "Calling model"
                    );

                    let response = self.adapter.respond(history.as_slice(), &definitions).await?;
                    let message = response.message;
                    let calls = message.tool_calls();
                    history.push(message.clone());

                    if calls.is_empty() {
                        match response.stop_reason {
                            StopReason::MaxTokens => {
                                warn!("Model reply truncated by the token limit");
                            }
                            StopReason::Blocked => {
                                warn!("Model reply stopped by a safety filter");
                            }
                            StopReason::MalformedToolCall => {
                                warn!(iteration = iterations, "Model emitted a malformed tool call");
                                return Err(Error::ProcessingFailed(
                                    "model emitted a malformed tool call".to_string(),
                                ));
                            }
                            _ => {}
                        }
                        TurnState::Terminal(message)
                    } else {
                        debug!(tool_count = calls.len(), "Model requested tools");
                        TurnState::Tooling(calls)
                    }
                }

                TurnState::Tooling(calls) => {
                    tool_invocations += calls.len();
                    let results = self.executor.execute(&calls, &self.tools).await?;
                    history.extend(results);
                    TurnState::Modeling
                }

                TurnState::Terminal(message) => {
                    let answer = message.text();
                    info!(
                        iterations,
                        tool_invocations,
                        answer_length = answer.len(),
                        "Run completed"
                    );

                    if let Some(handler) = self.executor.event_handler() {
                        handler.on_complete(&answer).await;
                    }

                    return Ok(RunOutcome {
                        answer,
                        history,
                        iterations,
                        tool_invocations,
                    });
                }
            };
        }
    }

    /// Answer one query, returning only the final text
    pub async fn ask(&self, query: impl Into<String>) -> Result<String> {
        Ok(self.run(query).await?.answer)
    }
}

#[async_trait]
impl Agent for TurnController {
    async fn process(&self, input: String) -> Result<String> {
        self.ask(input).await
    }

    fn name(&self) -> &str {
        &self.name
    }
}

impl std::fmt::Debug for TurnController {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TurnController")
            .field("name", &self.name)
            .field("adapter", &self.adapter)
            .field("tools", &self.tools)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`TurnController`]
#[derive(Default)]
pub struct TurnControllerBuilder {
    adapter: Option<ModelAdapter>,
    tools: Option<Arc<ToolSet>>,
    config: ControllerConfig,
    event_handler: Option<Arc<dyn ExecutorEventHandler>>,
    name: Option<String>,
}

impl TurnControllerBuilder {
    /// Create a new builder
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the model adapter
    pub fn adapter(mut self, adapter: ModelAdapter) -> Self {
        self.adapter = Some(adapter);
        self
    }

    /// Set the tool set
    pub fn tools(mut self, tools: Arc<ToolSet>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Set the full configuration
    pub fn config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Set maximum model calls per run
    pub fn max_iterations(mut self, max: usize) -> Self {
        self.config.max_iterations = max;
        self
    }

    /// Set the event handler for tool and completion events
    pub fn event_handler(mut self, handler: Arc<dyn ExecutorEventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the name reported through [`Agent::name`]
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Build the controller
    pub fn build(self) -> Result<TurnController> {
        let adapter = self
            .adapter
            .ok_or_else(|| Error::Configuration("Model adapter not set".to_string()))?;
        self.config.validate()?;

        let mut controller = TurnController::new(
            adapter,
            self.tools.unwrap_or_else(|| Arc::new(ToolSet::empty())),
        );
        controller.config = self.config;
        if let Some(handler) = self.event_handler {
            controller.executor = ToolExecutor::new().with_event_handler(handler);
        }
        if let Some(name) = self.name {
            controller.name = name;
        }

        Ok(controller)
    }
}
