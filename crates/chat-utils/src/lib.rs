//! Shared utilities for mcp-math-chat
//!
//! This crate provides common functionality used across the workspace,
//! including logging setup and environment-based configuration helpers.

pub mod config;
pub mod logging;

pub use config::{ConfigError, env_parse, env_var, load_dotenv, load_dotenv_from};
pub use logging::{LogFormat, init_tracing, init_tracing_with};
