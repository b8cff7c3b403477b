//! Error types for chat-core
//!
//! Every crate in the workspace has its own `thiserror` enum; they all
//! convert into [`Error`] while keeping their category, so callers can tell a
//! bad credential from a flaky network without string matching.

use thiserror::Error;

/// Result type alias for chat-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for a chat run
#[derive(Error, Debug)]
pub enum Error {
    /// Missing or invalid configuration (credential, endpoint URL, transport)
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A configured endpoint could not be reached when connecting
    #[error("Connection failed: {0}")]
    Connection(String),

    /// A request to the model or a tool endpoint failed mid-run
    #[error("Transport error: {0}")]
    Transport(String),

    /// The run kept asking for tools past the configured bound
    #[error("Iteration limit of {0} model calls reached without a final answer")]
    IterationLimit(usize),

    /// Anything else that went wrong while processing a run
    #[error("Processing failed: {0}")]
    ProcessingFailed(String),
}

/// Coarse error category, mostly useful for logging and exit handling
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    Connection,
    Transport,
    IterationLimit,
    Processing,
}

impl Error {
    /// Category of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::Connection(_) => ErrorKind::Connection,
            Self::Transport(_) => ErrorKind::Transport,
            Self::IterationLimit(_) => ErrorKind::IterationLimit,
            Self::ProcessingFailed(_) => ErrorKind::Processing,
        }
    }

    /// True for errors caused by setup rather than by a live request
    pub fn is_configuration(&self) -> bool {
        matches!(self, Self::Configuration(_))
    }

    /// True for network failures that might succeed if tried again
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
