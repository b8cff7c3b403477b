//! Command-line front end for mcp-math-chat
//!
//! Runs one fixed arithmetic query through the turn controller and prints
//! the answer. Logs go to stderr.

use anyhow::Context;
use chat_runtime::AppConfig;
use clap::Parser;
use tracing::info;

/// The query this program answers
const QUERY: &str = "what's (3 + 5) x 12?";

#[derive(Parser, Debug)]
#[command(name = "math-chat", version)]
#[command(
    about = "Ask a Gemini model an arithmetic question it answers with MCP math tools",
    long_about = None
)]
struct Args {}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    Args::parse();
    chat_utils::init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    info!(endpoints = config.mcp.len(), model = %config.gemini.model, "Starting math-chat");

    let controller = config
        .connect()
        .await
        .context("failed to connect to the tool endpoints")?;

    let answer = controller.ask(QUERY).await.context("query failed")?;
    println!("{answer}");

    Ok(())
}
