//! Provider trait and the model adapter used by the turn controller

use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use crate::completion::DEFAULT_MAX_TOKENS;
use crate::{CompletionRequest, CompletionResponse, Message, Result, ToolDefinition};

/// Trait for LLM providers
///
/// Implementations of this trait provide access to a hosted chat model.
#[async_trait]
pub trait LLMProvider: Send + Sync {
    /// Generate a completion from the LLM
    ///
    /// # Arguments
    ///
    /// * `request` - The completion request with messages, tools, and parameters
    ///
    /// # Returns
    ///
    /// The completion response with the assistant's message and metadata
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse>;

    /// Get the provider name (e.g., "gemini")
    fn name(&self) -> &str;
}

/// Generation parameters applied to every request
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationSettings {
    /// Model identifier
    pub model: String,
    /// Optional system prompt
    pub system_prompt: Option<String>,
    /// Maximum tokens to generate per response
    pub max_tokens: usize,
    /// Sampling temperature
    pub temperature: Option<f32>,
}

impl GenerationSettings {
    /// Settings for `model` with default limits
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            system_prompt: None,
            max_tokens: DEFAULT_MAX_TOKENS,
            temperature: None,
        }
    }

    /// Set the system prompt
    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    /// Set the per-response token limit
    pub fn with_max_tokens(mut self, max_tokens: usize) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    /// Set the sampling temperature
    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }
}

/// Binds a provider to generation settings
///
/// Each call to [`respond`](Self::respond) sends the entire history. The
/// adapter keeps no conversation state of its own.
#[derive(Clone)]
pub struct ModelAdapter {
    provider: Arc<dyn LLMProvider>,
    settings: GenerationSettings,
}

impl ModelAdapter {
    /// Create an adapter
    pub fn new(provider: Arc<dyn LLMProvider>, settings: GenerationSettings) -> Self {
        Self { provider, settings }
    }

    /// The generation settings in use
    pub fn settings(&self) -> &GenerationSettings {
        &self.settings
    }

    /// Name of the underlying provider
    pub fn provider_name(&self) -> &str {
        self.provider.name()
    }

    /// Ask the model for the next message given the full history
    pub async fn respond(
        &self,
        history: &[Message],
        tools: &[ToolDefinition],
    ) -> Result<CompletionResponse> {
        let mut builder = CompletionRequest::builder(&self.settings.model)
            .messages(history.to_vec())
            .max_tokens(self.settings.max_tokens)
            .tools(tools.to_vec());

        if let Some(system) = &self.settings.system_prompt {
            builder = builder.system(system.clone());
        }
        if let Some(temperature) = self.settings.temperature {
            builder = builder.temperature(temperature);
        }

        debug!(
            provider = self.provider.name(),
            model = %self.settings.model,
            messages = history.len(),
            tools = tools.len(),
            "Requesting model response"
        );

        let response = self.provider.complete(builder.build()).await?;

        debug!(
            stop_reason = ?response.stop_reason,
            input_tokens = response.usage.input_tokens,
            output_tokens = response.usage.output_tokens,
            "Model responded"
        );

        Ok(response)
    }
}

impl std::fmt::Debug for ModelAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ModelAdapter")
            .field("provider", &self.provider.name())
            .field("settings", &self.settings)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{StopReason, TokenUsage};
    use std::sync::Mutex;

    struct RecordingProvider {
        seen: Mutex<Vec<CompletionRequest>>,
    }

    #[async_trait]
    impl LLMProvider for RecordingProvider {
        async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
            self.seen.lock().unwrap().push(request);
            Ok(CompletionResponse {
                message: Message::assistant("ok"),
                stop_reason: StopReason::EndTurn,
                usage: TokenUsage::default(),
            })
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_respond_sends_full_history_and_settings() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
        });
        let settings = GenerationSettings::new("gemini-test")
            .with_system_prompt("be exact")
            .with_max_tokens(512)
            .with_temperature(0.0);
        let adapter = ModelAdapter::new(provider.clone(), settings);

        let history = vec![
            Message::user("what's 2+2?"),
            Message::assistant("4"),
            Message::user("and times 3?"),
        ];
        let tools = vec![ToolDefinition::new("add", "Add", serde_json::json!({}))];

        let response = adapter.respond(&history, &tools).await.unwrap();
        assert_eq!(response.message.text(), "ok");

        let seen = provider.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].messages, history);
        assert_eq!(seen[0].model, "gemini-test");
        assert_eq!(seen[0].system.as_deref(), Some("be exact"));
        assert_eq!(seen[0].max_tokens, 512);
        assert_eq!(seen[0].temperature, Some(0.0));
        assert_eq!(seen[0].tools.as_ref().map(Vec::len), Some(1));
    }

    #[tokio::test]
    async fn test_respond_without_tools() {
        let provider = Arc::new(RecordingProvider {
            seen: Mutex::new(Vec::new()),
        });
        let adapter = ModelAdapter::new(provider.clone(), GenerationSettings::new("m"));

        adapter.respond(&[Message::user("hi")], &[]).await.unwrap();
        let seen = provider.seen.lock().unwrap();
        assert!(seen[0].tools.is_none());
        assert!(seen[0].system.is_none());
    }
}
