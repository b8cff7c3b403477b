//! Failures reported by a model provider

use thiserror::Error;

pub type Result<T> = std::result::Result<T, LLMError>;

/// Why a completion call produced no usable response
#[derive(Error, Debug)]
pub enum LLMError {
    /// Server-side failure (5xx) or an unclassified status
    #[error("Model request failed: {0}")]
    RequestFailed(String),

    /// 401/403, or an API key the provider rejected
    #[error("Authentication with the model provider failed: {0}")]
    AuthenticationFailed(String),

    #[error("Model provider rate limit hit: {0}")]
    RateLimitExceeded(String),

    /// 400: the provider refused the request body
    #[error("Model rejected the request: {0}")]
    InvalidRequest(String),

    #[error("Unknown model: {0}")]
    ModelNotFound(String),

    #[error("Could not encode or decode model payload: {0}")]
    SerializationError(#[from] serde_json::Error),

    /// The request never got an HTTP response
    #[error("Model endpoint unreachable: {0}")]
    HttpError(#[from] reqwest::Error),

    /// A 200 reply whose body made no sense, e.g. no candidates
    #[error("Unexpected model response: {0}")]
    UnexpectedResponse(String),

    #[error("Model configuration error: {0}")]
    ConfigurationError(String),
}

impl LLMError {
    /// True when retrying cannot help because the setup is wrong
    ///
    /// A missing or rejected credential lands here, never in
    /// [`is_transient`](Self::is_transient).
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed(_) | Self::ConfigurationError(_) | Self::ModelNotFound(_)
        )
    }

    /// True for network-level failures and server-side hiccups
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            Self::HttpError(_) | Self::RequestFailed(_) | Self::RateLimitExceeded(_)
        )
    }
}

impl From<LLMError> for chat_core::Error {
    fn from(err: LLMError) -> Self {
        if err.is_configuration() {
            chat_core::Error::Configuration(err.to_string())
        } else if err.is_transient() {
            chat_core::Error::Transport(err.to_string())
        } else {
            chat_core::Error::ProcessingFailed(err.to_string())
        }
    }
}
