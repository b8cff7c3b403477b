//! Browser form front end for mcp-math-chat
//!
//! Serves one page with a text input and a Send button. Each submit runs one
//! query through a freshly connected turn controller and shows the answer or
//! the error.

mod app;
mod page;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use chat_runtime::AppConfig;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::{info, warn};

use crate::app::{AppState, ConnectPerQuery, TURN_TIMEOUT_SECS};
use crate::page::Page;

#[derive(Parser, Debug)]
#[command(name = "math-chat-web", version)]
#[command(about = "Web form for asking a Gemini model math questions via MCP tools", long_about = None)]
struct Args {
    /// Address to listen on
    #[arg(long, env = "CHAT_WEB_BIND", default_value = "127.0.0.1:8501")]
    bind: String,

    /// Upper bound on one query, in seconds (at least 1)
    #[arg(
        long,
        default_value_t = TURN_TIMEOUT_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    turn_timeout_secs: u64,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    chat_utils::init_tracing();

    let config = AppConfig::from_env().context("invalid configuration")?;
    let state = AppState {
        agent: Arc::new(ConnectPerQuery::new(config)),
        page: Arc::new(Page::new().context("failed to load page template")?),
        turn_timeout: Duration::from_secs(args.turn_timeout_secs),
    };

    let listener = TcpListener::bind(&args.bind)
        .await
        .with_context(|| format!("failed to bind {}", args.bind))?;
    info!(
        "math-chat-web listening on http://{} (turn_timeout={}s)",
        args.bind, args.turn_timeout_secs
    );

    axum::serve(listener, app::router(state))
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    info!("math-chat-web stopped");
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!(error = %e, "Failed to listen for Ctrl+C");
        std::future::pending::<()>().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_definition() {
        Args::command().debug_assert();
    }

    #[test]
    fn test_bind_flag() {
        let args = Args::try_parse_from(["math-chat-web", "--bind", "0.0.0.0:9000"]).unwrap();
        assert_eq!(args.bind, "0.0.0.0:9000");
        assert_eq!(args.turn_timeout_secs, 300);
    }

    #[test]
    fn test_zero_turn_timeout_rejected() {
        assert!(Args::try_parse_from(["math-chat-web", "--turn-timeout-secs", "0"]).is_err());

        let args = Args::try_parse_from(["math-chat-web", "--turn-timeout-secs", "1"]).unwrap();
        assert_eq!(args.turn_timeout_secs, 1);
    }
}
