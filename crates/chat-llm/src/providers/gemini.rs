//! Gemini provider implementation
//!
//! This module implements the LLMProvider trait for Google's Gemini models
//! through the `generateContent` endpoint of the Generative Language API.
//! See: https://ai.google.dev/api/generate-content
//!
//! # Examples
//!
//! ```no_run
//! use chat_llm::{CompletionRequest, LLMProvider, Message};
//! use chat_llm::providers::GeminiProvider;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     // Reads GOOGLE_API_KEY (and optionally GEMINI_MODEL / GEMINI_API_BASE)
//!     let provider = GeminiProvider::from_env()?;
//!
//!     let request = CompletionRequest::builder(provider.config().model.clone())
//!         .add_message(Message::user("Hello!"))
//!         .max_tokens(100)
//!         .build();
//!
//!     let response = provider.complete(request).await?;
//!     println!("{}", response.message.text());
//!     Ok(())
//! }
//! ```
//!
//! # Wire mapping
//!
//! - user messages become `role: "user"` text parts
//! - assistant messages become `role: "model"` parts; tool uses are sent as
//!   `functionCall` parts together with their thought signature
//! - tool results become `functionResponse` parts in a `role: "user"`
//!   content; consecutive results share one content

use crate::tools::schema;
use crate::{
    CompletionRequest, CompletionResponse, ContentBlock, LLMError, LLMProvider, Message, Result,
    Role, StopReason, TokenUsage, ToolDefinition,
};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use std::time::Duration;
use tracing::{debug, instrument, warn};

const DEFAULT_GEMINI_API_BASE: &str = "https://generativelanguage.googleapis.com/v1beta";
const DEFAULT_GEMINI_MODEL: &str = "gemini-3-flash-preview";
const DEFAULT_TIMEOUT_SECS: u64 = 120;

/// Prefix of tool-use ids minted locally when the response carries none
const GENERATED_ID_PREFIX: &str = "call_";

/// Environment variable holding the API key
pub const API_KEY_ENV: &str = "GOOGLE_API_KEY";
/// Environment variable overriding the model
pub const MODEL_ENV: &str = "GEMINI_MODEL";
/// Environment variable overriding the API base URL
pub const API_BASE_ENV: &str = "GEMINI_API_BASE";

/// Configuration for the Gemini provider
#[derive(Clone)]
pub struct GeminiConfig {
    /// API key sent in the `x-goog-api-key` header
    pub api_key: String,

    /// Model used when a request does not name one
    pub model: String,

    /// Base URL of the API (default: "https://generativelanguage.googleapis.com/v1beta")
    pub api_base: String,

    /// Request timeout in seconds (default: 120)
    pub timeout_secs: u64,
}

impl GeminiConfig {
    /// Create a new config with the given API key and default settings
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: DEFAULT_GEMINI_MODEL.to_string(),
            api_base: DEFAULT_GEMINI_API_BASE.to_string(),
            timeout_secs: DEFAULT_TIMEOUT_SECS,
        }
    }

    /// Create config from environment variables
    ///
    /// Reads the API key from `GOOGLE_API_KEY`. `GEMINI_MODEL` and
    /// `GEMINI_API_BASE` override the defaults when set.
    pub fn from_env() -> Result<Self> {
        let api_key = chat_utils::env_var(API_KEY_ENV).ok_or_else(|| {
            LLMError::ConfigurationError(format!("{API_KEY_ENV} environment variable not set"))
        })?;

        let mut config = Self::new(api_key);
        if let Some(model) = chat_utils::env_var(MODEL_ENV) {
            config.model = model;
        }
        if let Some(api_base) = chat_utils::env_var(API_BASE_ENV) {
            config.api_base = api_base;
        }
        Ok(config)
    }

    /// Set the default model
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = model.into();
        self
    }

    /// Set custom API base URL
    pub fn with_api_base(mut self, api_base: impl Into<String>) -> Self {
        self.api_base = api_base.into();
        self
    }

    /// Set request timeout in seconds
    pub fn with_timeout(mut self, timeout_secs: u64) -> Self {
        self.timeout_secs = timeout_secs;
        self
    }

    /// Check the config before any request is made
    pub fn validate(&self) -> Result<()> {
        if self.api_key.trim().is_empty() {
            return Err(LLMError::ConfigurationError(format!(
                "{API_KEY_ENV} is empty"
            )));
        }
        if self.model.trim().is_empty() {
            return Err(LLMError::ConfigurationError("model name is empty".to_string()));
        }
        if !(self.api_base.starts_with("http://") || self.api_base.starts_with("https://")) {
            return Err(LLMError::ConfigurationError(format!(
                "API base '{}' is not an http(s) URL",
                self.api_base
            )));
        }
        if self.timeout_secs == 0 {
            return Err(LLMError::ConfigurationError(
                "timeout must be at least one second".to_string(),
            ));
        }
        Ok(())
    }
}

impl std::fmt::Debug for GeminiConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GeminiConfig")
            .field("api_key", &"<redacted>")
            .field("model", &self.model)
            .field("api_base", &self.api_base)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

/// Gemini provider
pub struct GeminiProvider {
    client: Client,
    config: GeminiConfig,
}

impl GeminiProvider {
    /// Create a new Gemini provider with custom configuration
    ///
    /// Fails with a configuration error when the config is invalid.
    pub fn with_config(config: GeminiConfig) -> Result<Self> {
        config.validate()?;

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self { client, config })
    }

    /// Create a new Gemini provider with API key and default settings
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_config(GeminiConfig::new(api_key))
    }

    /// Create a provider from environment variables
    pub fn from_env() -> Result<Self> {
        Self::with_config(GeminiConfig::from_env()?)
    }

    /// Get the current configuration
    pub fn config(&self) -> &GeminiConfig {
        &self.config
    }

    fn endpoint(&self, model: &str) -> String {
        format!(
            "{}/models/{}:generateContent",
            self.config.api_base.trim_end_matches('/'),
            model
        )
    }
}

#[async_trait]
impl LLMProvider for GeminiProvider {
    #[instrument(skip(self, request), fields(model = %request.model, api_base = %self.config.api_base))]
    async fn complete(&self, request: CompletionRequest) -> Result<CompletionResponse> {
        let model = if request.model.is_empty() {
            self.config.model.clone()
        } else {
            request.model.clone()
        };

        let gemini_request = build_request(&request);

        debug!(
            contents = gemini_request.contents.len(),
            "Sending request to Gemini API"
        );

        let response = self
            .client
            .post(self.endpoint(&model))
            .header("x-goog-api-key", &self.config.api_key)
            .json(&gemini_request)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let error_text = response.text().await?;
            return Err(map_error_status(status, &error_text, &model));
        }

        let gemini_response: GeminiResponse = response.json().await.map_err(|e| {
            LLMError::UnexpectedResponse(format!("Failed to parse response: {e}"))
        })?;

        parse_response(gemini_response)
    }

    fn name(&self) -> &'static str {
        "gemini"
    }
}

// ============================================================================
// Gemini-specific wire types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiTool>>,
    generation_config: GenerationConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiContent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    role: Option<String>,
    #[serde(default)]
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiPart {
    #[serde(skip_serializing_if = "Option::is_none")]
    text: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_call: Option<GeminiFunctionCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    function_response: Option<GeminiFunctionResponse>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    thought: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    thought_signature: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionCall {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    #[serde(default)]
    args: Option<Value>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    id: Option<String>,
    name: String,
    response: Value,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiTool {
    function_declarations: Vec<FunctionDeclaration>,
}

#[derive(Debug, Serialize)]
struct FunctionDeclaration {
    name: String,
    description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    parameters: Option<Value>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
    max_output_tokens: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop_sequences: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    #[serde(default)]
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<UsageMetadata>,
    #[serde(default)]
    prompt_feedback: Option<PromptFeedback>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    #[serde(default)]
    content: Option<GeminiContent>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
    #[serde(default)]
    prompt_token_count: usize,
    #[serde(default)]
    candidates_token_count: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct PromptFeedback {
    #[serde(default)]
    block_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorEnvelope {
    error: GeminiErrorBody,
}

#[derive(Debug, Deserialize)]
struct GeminiErrorBody {
    #[serde(default)]
    message: String,
}

// ============================================================================
// Conversion functions
// ============================================================================

fn build_request(request: &CompletionRequest) -> GeminiRequest {
    GeminiRequest {
        contents: build_contents(&request.messages),
        system_instruction: request.system.as_ref().map(|system| GeminiContent {
            role: None,
            parts: vec![GeminiPart {
                text: Some(system.clone()),
                ..GeminiPart::default()
            }],
        }),
        tools: request.tools.as_deref().map(convert_tools),
        generation_config: GenerationConfig {
            max_output_tokens: request.max_tokens,
            temperature: request.temperature,
            stop_sequences: request.stop_sequences.clone(),
        },
    }
}

/// Convert the history to Gemini contents, grouping consecutive tool results
fn build_contents(messages: &[Message]) -> Vec<GeminiContent> {
    let mut contents: Vec<GeminiContent> = Vec::with_capacity(messages.len());

    for message in messages {
        let parts: Vec<GeminiPart> = message.blocks().into_iter().map(block_to_part).collect();
        if parts.is_empty() {
            continue;
        }

        let role = match message.role {
            Role::Assistant => "model",
            Role::User | Role::Tool => "user",
        };

        if message.role == Role::Tool {
            if let Some(last) = contents.last_mut() {
                let only_responses = last.role.as_deref() == Some("user")
                    && last.parts.iter().all(|p| p.function_response.is_some());
                if only_responses {
                    last.parts.extend(parts);
                    continue;
                }
            }
        }

        contents.push(GeminiContent {
            role: Some(role.to_string()),
            parts,
        });
    }

    contents
}

fn block_to_part(block: ContentBlock) -> GeminiPart {
    match block {
        ContentBlock::Text { text } => GeminiPart {
            text: Some(text),
            ..GeminiPart::default()
        },
        ContentBlock::ToolUse {
            id,
            name,
            input,
            signature,
        } => GeminiPart {
            function_call: Some(GeminiFunctionCall {
                id: wire_id(id),
                name,
                args: Some(if input.is_null() { json!({}) } else { input }),
            }),
            thought_signature: signature,
            ..GeminiPart::default()
        },
        ContentBlock::ToolResult {
            tool_use_id,
            name,
            content,
            is_error,
        } => {
            let response = if is_error.unwrap_or(false) {
                json!({ "error": content })
            } else {
                json!({ "result": content })
            };
            GeminiPart {
                function_response: Some(GeminiFunctionResponse {
                    id: wire_id(tool_use_id),
                    name,
                    response,
                }),
                ..GeminiPart::default()
            }
        }
    }
}

/// Locally minted ids are never sent back to the API
fn wire_id(id: String) -> Option<String> {
    if id.is_empty() || id.starts_with(GENERATED_ID_PREFIX) {
        None
    } else {
        Some(id)
    }
}

fn convert_tools(tools: &[ToolDefinition]) -> Vec<GeminiTool> {
    let function_declarations = tools
        .iter()
        .map(|tool| {
            let parameters = schema::sanitize_for_gemini(&tool.input_schema);
            FunctionDeclaration {
                name: tool.name.clone(),
                description: tool.description.clone(),
                parameters: (!schema::is_empty_object(&parameters)).then_some(parameters),
            }
        })
        .collect();

    vec![GeminiTool {
        function_declarations,
    }]
}

fn parse_response(response: GeminiResponse) -> Result<CompletionResponse> {
    let usage = response.usage_metadata.unwrap_or_default();

    let Some(candidate) = response.candidates.into_iter().next() else {
        let reason = response
            .prompt_feedback
            .and_then(|f| f.block_reason)
            .map_or_else(
                || "No candidates in response".to_string(),
                |reason| format!("Prompt blocked: {reason}"),
            );
        return Err(LLMError::UnexpectedResponse(reason));
    };

    let parts = candidate.content.map(|c| c.parts).unwrap_or_default();
    let blocks = parse_parts(parts);
    let has_tool_use = blocks
        .iter()
        .any(|b| matches!(b, ContentBlock::ToolUse { .. }));

    let stop_reason = if has_tool_use {
        StopReason::ToolUse
    } else {
        map_stop_reason(candidate.finish_reason.as_deref())
    };

    debug!(
        ?stop_reason,
        input_tokens = usage.prompt_token_count,
        output_tokens = usage.candidates_token_count,
        "Received response from Gemini"
    );

    Ok(CompletionResponse {
        message: Message::assistant_blocks(blocks),
        stop_reason,
        usage: TokenUsage {
            input_tokens: usage.prompt_token_count,
            output_tokens: usage.candidates_token_count,
        },
    })
}

fn parse_parts(parts: Vec<GeminiPart>) -> Vec<ContentBlock> {
    let mut blocks = Vec::with_capacity(parts.len());

    for part in parts {
        if part.thought {
            continue;
        }
        if let Some(call) = part.function_call {
            let id = call
                .id
                .filter(|id| !id.is_empty())
                .unwrap_or_else(|| format!("{GENERATED_ID_PREFIX}{}", uuid::Uuid::new_v4()));
            blocks.push(ContentBlock::ToolUse {
                id,
                name: call.name,
                input: call.args.unwrap_or_else(|| json!({})),
                signature: part.thought_signature,
            });
        } else if let Some(text) = part.text {
            if !text.is_empty() {
                blocks.push(ContentBlock::Text { text });
            }
        }
    }

    blocks
}

/// Map Gemini finish reason to our format
fn map_stop_reason(reason: Option<&str>) -> StopReason {
    match reason {
        None | Some("STOP") => StopReason::EndTurn,
        Some("MAX_TOKENS") => StopReason::MaxTokens,
        Some("SAFETY" | "RECITATION" | "BLOCKLIST" | "PROHIBITED_CONTENT" | "SPII") => {
            warn!(reason = ?reason, "Response withheld by Gemini safety filters");
            StopReason::Blocked
        }
        Some("MALFORMED_FUNCTION_CALL" | "UNEXPECTED_TOOL_CALL") => {
            warn!(reason = ?reason, "Gemini produced an unusable function call");
            StopReason::MalformedToolCall
        }
        Some(other) => {
            debug!("Unknown finish reason: {}", other);
            StopReason::EndTurn
        }
    }
}

/// Map a non-success HTTP status to an error, keeping credentials problems
/// apart from transient ones
fn map_error_status(status: u16, body: &str, model: &str) -> LLMError {
    let message = serde_json::from_str::<GeminiErrorEnvelope>(body)
        .map(|e| e.error.message)
        .ok()
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| body.to_string());

    match status {
        401 | 403 => LLMError::AuthenticationFailed(message),
        400 if body.contains("API_KEY_INVALID") => LLMError::AuthenticationFailed(message),
        400 => LLMError::InvalidRequest(message),
        404 => LLMError::ModelNotFound(model.to_string()),
        429 => LLMError::RateLimitExceeded(message),
        _ => LLMError::RequestFailed(format!("HTTP {status}: {message}")),
    }
}

// ============================================================================
// Tests
// ============================================================================
