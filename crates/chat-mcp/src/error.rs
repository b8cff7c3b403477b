//! Failures talking to tool endpoints

use thiserror::Error;

/// What went wrong while reaching, configuring or calling a tool endpoint
#[derive(Error, Debug)]
pub enum MCPError {
    /// The endpoint could not be reached
    #[error("MCP connection failed: {0}")]
    ConnectionFailed(String),

    /// The `initialize` handshake was refused or malformed
    #[error("MCP handshake failed: {0}")]
    InitializationFailed(String),

    #[error("MCP client is not connected")]
    NotConnected,

    /// Send failure, timeout, broken stream or a 5xx status
    #[error("MCP request failed: {0}")]
    RequestFailed(String),

    /// JSON-RPC error reply, 4xx status or a malformed response
    #[error("MCP protocol error: {0}")]
    Protocol(String),

    /// A `tools/call` reply did not decode as a tool result
    #[error("Malformed tool result: {0}")]
    ToolCallFailed(String),

    #[error("No endpoint offers tool '{0}'")]
    ToolNotFound(String),

    #[error("Invalid MCP configuration: {0}")]
    ConfigError(String),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// A `${VAR}` reference in the config names an unset variable
    #[error("Unset environment variable referenced in MCP config: {0}")]
    EnvVarNotFound(String),

    #[error("Bad substitution pattern: {0}")]
    InvalidPattern(String),
}

impl MCPError {
    /// Broad category for callers outside this crate
    pub fn kind(&self) -> chat_core::ErrorKind {
        use chat_core::ErrorKind;
        match self {
            Self::ConfigError(_) | Self::EnvVarNotFound(_) | Self::InvalidPattern(_) => {
                ErrorKind::Configuration
            }
            Self::ConnectionFailed(_) | Self::InitializationFailed(_) | Self::NotConnected => {
                ErrorKind::Connection
            }
            Self::RequestFailed(_) => ErrorKind::Transport,
            Self::Protocol(_)
            | Self::ToolCallFailed(_)
            | Self::ToolNotFound(_)
            | Self::JsonError(_) => ErrorKind::Processing,
        }
    }
}

impl From<MCPError> for chat_core::Error {
    fn from(err: MCPError) -> Self {
        use chat_core::ErrorKind;
        let message = err.to_string();
        match err.kind() {
            ErrorKind::Configuration => Self::Configuration(message),
            ErrorKind::Connection => Self::Connection(message),
            ErrorKind::Transport => Self::Transport(message),
            _ => Self::ProcessingFailed(message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::ErrorKind;

    #[test]
    fn test_category_mapping() {
        let cases = [
            (MCPError::ConfigError("bad url".into()), ErrorKind::Configuration),
            (MCPError::EnvVarNotFound("TOKEN".into()), ErrorKind::Configuration),
            (MCPError::ConnectionFailed("refused".into()), ErrorKind::Connection),
            (MCPError::NotConnected, ErrorKind::Connection),
            (MCPError::RequestFailed("HTTP 500".into()), ErrorKind::Transport),
            (MCPError::Protocol("tools/call: Invalid params".into()), ErrorKind::Processing),
            (MCPError::ToolNotFound("pow".into()), ErrorKind::Processing),
        ];

        for (err, kind) in cases {
            assert_eq!(err.kind(), kind);
            let core: chat_core::Error = err.into();
            assert_eq!(core.kind(), kind);
        }
    }
}
