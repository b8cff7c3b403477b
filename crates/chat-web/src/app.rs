//! HTTP routes of the form UI
//!
//! `GET /` shows the form, `POST /` answers one query and shows the result,
//! `GET /health` reports liveness. Every submit is an independent run.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::{Form, State};
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use chat_core::{Agent, Result};
use chat_mcp::ToolSet;
use chat_runtime::AppConfig;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{debug, error, info, warn};

use crate::page::{Page, PageView};

/// Default bound on one submit (model and tools together)
pub const TURN_TIMEOUT_SECS: u64 = 300;

/// Shared state: the query runner, the page and the per-submit timeout
#[derive(Clone)]
pub struct AppState {
    pub agent: Arc<dyn Agent>,
    pub page: Arc<Page>,
    pub turn_timeout: Duration,
}

/// Body of `POST /`
#[derive(Debug, Deserialize)]
pub struct QueryForm {
    #[serde(default)]
    pub query: String,
}

/// Build the router
pub fn router(state: AppState) -> Router {
    Router::new()
        .route("/", get(index).post(submit))
        .route("/health", get(health))
        .with_state(state)
}

async fn index(State(state): State<AppState>) -> Response {
    render(&state.page, &PageView::default())
}

async fn submit(State(state): State<AppState>, Form(form): Form<QueryForm>) -> Response {
    let query = form.query.trim();
    if query.is_empty() {
        return render(&state.page, &PageView::default());
    }

    info!(query_length = query.len(), "Query submitted");

    let outcome = tokio::time::timeout(state.turn_timeout, state.agent.process(query.to_string()))
        .await;

    let view = match outcome {
        Ok(Ok(answer)) => PageView::answered(query, answer),
        Ok(Err(e)) => {
            warn!(error = %e, kind = ?e.kind(), "Query failed");
            PageView::failed(query, e.to_string())
        }
        Err(_) => {
            warn!(timeout_secs = state.turn_timeout.as_secs(), "Query timed out");
            PageView::failed(
                query,
                format!("Query timed out after {}s", state.turn_timeout.as_secs()),
            )
        }
    };

    render(&state.page, &view)
}

async fn health() -> Json<Value> {
    Json(json!({ "status": "ok" }))
}

fn render(page: &Page, view: &PageView) -> Response {
    match page.render(view) {
        Ok(html) => Html(html).into_response(),
        Err(e) => {
            error!(error = %e, "Failed to render page");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to render page").into_response()
        }
    }
}

/// Answers each query with a freshly connected controller
///
/// Tool endpoints are connected per submit and closed afterwards, so an
/// endpoint that is down shows up as an error on the page instead of keeping
/// the server from starting.
pub struct ConnectPerQuery {
    config: AppConfig,
}

impl ConnectPerQuery {
    pub fn new(config: AppConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Agent for ConnectPerQuery {
    async fn process(&self, input: String) -> Result<String> {
        let controller = self.config.connect().await?;
        let sessions = SessionGuard::new(Arc::clone(controller.tools()));
        let result = controller.ask(input).await;
        sessions.close().await;
        result
    }

    fn name(&self) -> &str {
        "math-chat-web"
    }
}

/// Ends the tool sessions of one submit
///
/// If the submit is dropped (turn timeout), the sessions are closed on a
/// spawned task instead.
struct SessionGuard {
    tools: Option<Arc<ToolSet>>,
}

impl SessionGuard {
    fn new(tools: Arc<ToolSet>) -> Self {
        Self { tools: Some(tools) }
    }

    async fn close(mut self) {
        if let Some(tools) = self.tools.take() {
            tools.close().await;
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(tools) = self.tools.take() else {
            return;
        };
        let Ok(handle) = tokio::runtime::Handle::try_current() else {
            return;
        };
        debug!(endpoints = ?tools.endpoints(), "Closing tool sessions of an abandoned query");
        handle.spawn(async move {
            tools.close().await;
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chat_core::Error;
    use chat_mcp::{ArcMCPClient, MCPClient, MCPServerInfo, MCPToolDefinition, MCPToolResult};
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    /// Records queries and answers from a fixed result
    struct FixedAgent {
        answer: std::result::Result<&'static str, &'static str>,
        delay: Duration,
        seen: Mutex<Vec<String>>,
    }

    impl FixedAgent {
        fn new(answer: std::result::Result<&'static str, &'static str>) -> Arc<Self> {
            Arc::new(Self {
                answer,
                delay: Duration::ZERO,
                seen: Mutex::new(Vec::new()),
            })
        }
    }

    #[async_trait]
    impl Agent for FixedAgent {
        async fn process(&self, input: String) -> Result<String> {
            self.seen.lock().unwrap().push(input);
            tokio::time::sleep(self.delay).await;
            match self.answer {
                Ok(answer) => Ok(answer.to_string()),
                Err(message) => Err(Error::Connection(message.to_string())),
            }
        }

        fn name(&self) -> &str {
            "fixed"
        }
    }

    async fn serve(agent: Arc<dyn Agent>, turn_timeout: Duration) -> String {
        let state = AppState {
            agent,
            page: Arc::new(Page::new().unwrap()),
            turn_timeout,
        };
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router(state)).await.unwrap();
        });
        format!("http://{addr}")
    }

    async fn post_query(base: &str, query: &str) -> (StatusCode, String) {
        let response = reqwest::Client::new()
            .post(format!("{base}/"))
            .form(&[("query", query)])
            .send()
            .await
            .unwrap();
        let status = StatusCode::from_u16(response.status().as_u16()).unwrap();
        (status, response.text().await.unwrap())
    }

    #[tokio::test]
    async fn test_get_renders_form() {
        let base = serve(FixedAgent::new(Ok("96")), Duration::from_secs(5)).await;
        let html = reqwest::get(format!("{base}/")).await.unwrap().text().await.unwrap();
        assert!(html.contains("<form"));
        assert!(!html.contains(r#"id="answer""#));
    }

    #[tokio::test]
    async fn test_submit_shows_answer() {
        let agent = FixedAgent::new(Ok("(3 + 5) x 12 = 96"));
        let base = serve(agent.clone(), Duration::from_secs(5)).await;

        let (status, html) = post_query(&base, "  what's (3 + 5) x 12?  ").await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(r#"id="answer""#));
        assert!(html.contains("(3 + 5) x 12 = 96"));
        assert_eq!(*agent.seen.lock().unwrap(), ["what's (3 + 5) x 12?"]);
    }

    #[tokio::test]
    async fn test_blank_submit_runs_nothing() {
        let agent = FixedAgent::new(Ok("unused"));
        let base = serve(agent.clone(), Duration::from_secs(5)).await;

        let (status, html) = post_query(&base, "   ").await;

        assert_eq!(status, StatusCode::OK);
        assert!(!html.contains(r#"id="answer""#));
        assert!(!html.contains(r#"id="error""#));
        assert!(agent.seen.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_failure_shows_error() {
        let agent = FixedAgent::new(Err("endpoint math unreachable"));
        let base = serve(agent, Duration::from_secs(5)).await;

        let (status, html) = post_query(&base, "1 + 1").await;

        assert_eq!(status, StatusCode::OK);
        assert!(html.contains(r#"id="error""#));
        assert!(html.contains("unreachable"));
        assert!(!html.contains(r#"id="answer""#));
    }

    #[tokio::test]
    async fn test_slow_query_times_out() {
        let agent = Arc::new(FixedAgent {
            answer: Ok("late"),
            delay: Duration::from_secs(5),
            seen: Mutex::new(Vec::new()),
        });
        let base = serve(agent, Duration::from_millis(50)).await;

        let (_, html) = post_query(&base, "1 + 1").await;
        assert!(html.contains("timed out"));
        assert!(!html.contains(r#"id="answer""#));
    }

    #[tokio::test]
    async fn test_health() {
        let base = serve(FixedAgent::new(Ok("x")), Duration::from_secs(5)).await;
        let body: Value = reqwest::get(format!("{base}/health"))
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        assert_eq!(body, json!({"status": "ok"}));
    }

    /// Endpoint that only counts disconnects
    #[derive(Default)]
    struct CountingClient {
        disconnects: AtomicUsize,
    }

    #[async_trait]
    impl MCPClient for CountingClient {
        async fn connect(&self) -> chat_mcp::Result<()> {
            Ok(())
        }

        fn is_connected(&self) -> bool {
            true
        }

        async fn disconnect(&self) -> chat_mcp::Result<()> {
            self.disconnects.fetch_add(1, Ordering::SeqCst);
            Ok(())
        }

        async fn list_tools(&self) -> chat_mcp::Result<Vec<MCPToolDefinition>> {
            Ok(Vec::new())
        }

        async fn call_tool(&self, _name: &str, _arguments: Value) -> chat_mcp::Result<MCPToolResult> {
            Ok(MCPToolResult::text("0"))
        }

        async fn server_info(&self) -> Option<MCPServerInfo> {
            None
        }
    }

    async fn counted_tools() -> (Arc<CountingClient>, Arc<ToolSet>) {
        let client = Arc::new(CountingClient::default());
        let shared: ArcMCPClient = client.clone();
        let tools = ToolSet::from_clients(vec![("math".to_string(), shared)])
            .await
            .unwrap();
        (client, Arc::new(tools))
    }

    #[tokio::test]
    async fn test_sessions_closed_after_query() {
        let (client, tools) = counted_tools().await;

        SessionGuard::new(tools).close().await;

        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_sessions_closed_when_query_times_out() {
        let (client, tools) = counted_tools().await;

        let slow_query = async move {
            let sessions = SessionGuard::new(tools);
            tokio::time::sleep(Duration::from_secs(5)).await;
            sessions.close().await;
        };
        let outcome = tokio::time::timeout(Duration::from_millis(20), slow_query).await;
        assert!(outcome.is_err());

        for _ in 0..50 {
            if client.disconnects.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(client.disconnects.load(Ordering::SeqCst), 1);
    }
}
