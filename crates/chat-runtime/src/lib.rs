//! Turn controller for mcp-math-chat
//!
//! This crate ties the model adapter and the tool set together: the
//! [`TurnController`] alternates between model calls and tool execution until
//! the model answers without asking for tools.
//!
//! # Example
//!
//! ```no_run
//! use chat_runtime::AppConfig;
//!
//! # async fn run() -> chat_core::Result<()> {
//! let controller = AppConfig::from_env()?.connect().await?;
//! let answer = controller.ask("what's (3 + 5) x 12?").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod controller;
pub mod executor;
pub mod history;

pub use config::{AppConfig, build_controller};
pub use controller::{
    ControllerConfig, DEFAULT_MAX_ITERATIONS, RunOutcome, TurnController, TurnControllerBuilder,
    TurnState,
};
pub use executor::{ExecutorEventHandler, NoOpEventHandler, ToolExecutor};
pub use history::ConversationHistory;
