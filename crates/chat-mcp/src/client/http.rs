//! Streamable HTTP transport MCP client
//!
//! Every JSON-RPC message is POSTed to the endpoint URL. The server answers
//! with either a plain JSON body or an SSE stream; on a stream, the first
//! message carrying the request's id is the answer and anything else
//! (progress notifications, log messages) is skipped.
//!
//! The `Mcp-Session-Id` header returned by `initialize` is echoed on every
//! later request together with the negotiated `MCP-Protocol-Version`.

use super::*;
use crate::config::EndpointConfig;
use eventsource_stream::Eventsource;
use futures::StreamExt;
use reqwest::StatusCode;
use reqwest::header::{ACCEPT, CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

/// Protocol revision requested during `initialize`
pub const PROTOCOL_VERSION: &str = "2025-03-26";

const SESSION_HEADER: &str = "mcp-session-id";
const PROTOCOL_HEADER: &str = "mcp-protocol-version";
const ACCEPT_BOTH: &str = "application/json, text/event-stream";

/// Pagination guard for `tools/list`
const MAX_TOOL_PAGES: usize = 100;

/// MCP client using the streamable HTTP transport
pub struct StreamableHttpClient {
    /// Endpoint label, used in logs and errors
    label: String,

    url: String,

    /// Static headers (configured extras plus content negotiation)
    headers: HeaderMap,

    /// HTTP client
    http_client: reqwest::Client,

    /// Session id assigned by the server, if any
    session_id: Mutex<Option<String>>,

    /// Server info from initialization
    server_info: Mutex<Option<MCPServerInfo>>,

    /// Connection state
    connected: AtomicBool,

    /// Request ID counter
    request_id: AtomicU64,
}

impl StreamableHttpClient {
    /// Create a client for one configured endpoint
    ///
    /// No network traffic happens until [`connect`](MCPClient::connect).
    pub fn new(label: impl Into<String>, config: &EndpointConfig) -> Result<Self> {
        let label = label.into();
        config.validate(&label)?;

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| MCPError::ConfigError(format!("Failed to create HTTP client: {e}")))?;

        Ok(Self {
            headers: build_headers(&config.headers)?,
            url: config.url.clone(),
            label,
            http_client,
            session_id: Mutex::new(None),
            server_info: Mutex::new(None),
            connected: AtomicBool::new(false),
            request_id: AtomicU64::new(0),
        })
    }

    /// Endpoint label
    pub fn label(&self) -> &str {
        &self.label
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Session id assigned by the server
    pub async fn session_id(&self) -> Option<String> {
        self.session_id.lock().await.clone()
    }

    /// Get next request ID
    fn next_request_id(&self) -> u64 {
        self.request_id.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Headers for one request: static ones plus session state
    async fn request_headers(&self) -> Result<HeaderMap> {
        let mut headers = self.headers.clone();

        if let Some(session) = self.session_id.lock().await.as_deref() {
            let value = HeaderValue::from_str(session).map_err(|e| {
                MCPError::Protocol(format!("Server sent an unusable session id: {e}"))
            })?;
            headers.insert(SESSION_HEADER, value);
        }

        if let Some(info) = self.server_info.lock().await.as_ref() {
            if let Ok(value) = HeaderValue::from_str(&info.protocol_version) {
                headers.insert(PROTOCOL_HEADER, value);
            }
        }

        Ok(headers)
    }

    async fn post(&self, body: &Value, method: &str) -> Result<reqwest::Response> {
        let headers = self.request_headers().await?;

        debug!(endpoint = %self.label, method, "Sending MCP request");

        self.http_client
            .post(&self.url)
            .headers(headers)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_connect() {
                    MCPError::ConnectionFailed(format!("{}: {e}", self.url))
                } else {
                    MCPError::RequestFailed(format!("{method} to {}: {e}", self.url))
                }
            })
    }

    /// Send a JSON-RPC request and wait for its response
    async fn send_request(&self, method: &str, params: Value) -> Result<Value> {
        let id = self.next_request_id();

        let request = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });

        let response = self.post(&request, method).await?;
        let status = response.status();

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(status_error(status, method, &body));
        }

        if let Some(session) = response
            .headers()
            .get(SESSION_HEADER)
            .and_then(|v| v.to_str().ok())
        {
            let mut current = self.session_id.lock().await;
            if current.as_deref() != Some(session) {
                debug!(endpoint = %self.label, session, "MCP session established");
                *current = Some(session.to_string());
            }
        }

        let message = if is_event_stream(response.headers()) {
            read_sse_response(response, id, method).await?
        } else {
            response.json::<Value>().await.map_err(|e| {
                MCPError::Protocol(format!("Failed to parse {method} response: {e}"))
            })?
        };

        debug!(endpoint = %self.label, method, "Received MCP response");

        // Check for JSON-RPC error
        if let Some(error) = message.get("error") {
            let detail = error
                .get("message")
                .and_then(Value::as_str)
                .map_or_else(|| error.to_string(), str::to_string);
            return Err(MCPError::Protocol(format!("{method}: {detail}")));
        }

        message
            .get("result")
            .cloned()
            .ok_or_else(|| MCPError::Protocol(format!("No result in {method} response")))
    }

    /// Send a JSON-RPC notification; the server answers 202 or an empty 200
    async fn send_notification(&self, method: &str) -> Result<()> {
        let notification = serde_json::json!({
            "jsonrpc": "2.0",
            "method": method,
        });

        let response = self.post(&notification, method).await?;
        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            let body = response.text().await.unwrap_or_default();
            Err(status_error(status, method, &body))
        }
    }

    /// Send initialize request and the initialized notification
    async fn initialize(&self) -> Result<MCPServerInfo> {
        let params = serde_json::json!({
            "protocolVersion": PROTOCOL_VERSION,
            "capabilities": {},
            "clientInfo": {
                "name": "mcp-math-chat",
                "version": env!("CARGO_PKG_VERSION")
            }
        });

        let result = self.send_request("initialize", params).await.map_err(|e| match e {
            err @ MCPError::ConnectionFailed(_) => err,
            other => MCPError::InitializationFailed(other.to_string()),
        })?;

        let server_info = MCPServerInfo {
            name: result["serverInfo"]["name"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            version: result["serverInfo"]["version"]
                .as_str()
                .unwrap_or("unknown")
                .to_string(),
            protocol_version: result["protocolVersion"]
                .as_str()
                .unwrap_or(PROTOCOL_VERSION)
                .to_string(),
        };

        *self.server_info.lock().await = Some(server_info.clone());

        self.send_notification("notifications/initialized")
            .await
            .map_err(|e| MCPError::InitializationFailed(e.to_string()))?;

        info!(
            endpoint = %self.label,
            server = %server_info.name,
            version = %server_info.version,
            protocol = %server_info.protocol_version,
            "Connected to MCP server"
        );

        Ok(server_info)
    }

    fn ensure_connected(&self) -> Result<()> {
        if self.is_connected() {
            Ok(())
        } else {
            Err(MCPError::NotConnected)
        }
    }
}

#[async_trait]
impl MCPClient for StreamableHttpClient {
    async fn connect(&self) -> Result<()> {
        if self.is_connected() {
            return Ok(());
        }
        debug!(endpoint = %self.label, url = %self.url, "Connecting to MCP server");

        self.initialize().await?;
        self.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    async fn disconnect(&self) -> Result<()> {
        if !self.connected.swap(false, Ordering::SeqCst) {
            return Ok(());
        }
        debug!(endpoint = %self.label, "Disconnecting from MCP server");

        let session = self.session_id.lock().await.take();
        if let Some(session) = session {
            // Best effort: servers may not support explicit termination.
            let result = self
                .http_client
                .delete(&self.url)
                .headers(self.headers.clone())
                .header(SESSION_HEADER, session)
                .send()
                .await;
            match result {
                Ok(response) if !response.status().is_success()
                    && response.status() != StatusCode::METHOD_NOT_ALLOWED =>
                {
                    debug!(endpoint = %self.label, status = %response.status(), "Session termination rejected");
                }
                Err(e) => {
                    debug!(endpoint = %self.label, error = %e, "Session termination failed");
                }
                Ok(_) => {}
            }
        }

        *self.server_info.lock().await = None;
        Ok(())
    }

    async fn list_tools(&self) -> Result<Vec<MCPToolDefinition>> {
        self.ensure_connected()?;

        let mut tools = Vec::new();
        let mut cursor: Option<String> = None;

        for _ in 0..MAX_TOOL_PAGES {
            let params = match &cursor {
                Some(cursor) => serde_json::json!({ "cursor": cursor }),
                None => serde_json::json!({}),
            };

            let result = self.send_request("tools/list", params).await?;

            let page: Vec<MCPToolDefinition> =
                serde_json::from_value(result.get("tools").cloned().unwrap_or(Value::Null))
                    .map_err(|e| {
                        MCPError::Protocol(format!("Failed to parse tools: {e}"))
                    })?;
            tools.extend(page);

            let next = result
                .get("nextCursor")
                .and_then(Value::as_str)
                .filter(|c| !c.is_empty())
                .map(str::to_string);

            match next {
                Some(next) if cursor.as_deref() == Some(next.as_str()) => {
                    return Err(MCPError::Protocol(format!(
                        "tools/list returned the same cursor twice: {next}"
                    )));
                }
                Some(next) => cursor = Some(next),
                None => {
                    debug!(endpoint = %self.label, count = tools.len(), "Listed MCP tools");
                    return Ok(tools);
                }
            }
        }

        warn!(endpoint = %self.label, "tools/list pagination did not finish");
        Err(MCPError::Protocol(format!(
            "tools/list exceeded {MAX_TOOL_PAGES} pages"
        )))
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<MCPToolResult> {
        self.ensure_connected()?;

        let params = serde_json::json!({
            "name": name,
            "arguments": if arguments.is_null() { serde_json::json!({}) } else { arguments }
        });

        let result = self.send_request("tools/call", params).await?;

        let tool_result: MCPToolResult = serde_json::from_value(result)
            .map_err(|e| MCPError::ToolCallFailed(format!("Failed to parse result: {e}")))?;

        Ok(tool_result)
    }

    async fn server_info(&self) -> Option<MCPServerInfo> {
        self.server_info.lock().await.clone()
    }
}

/// Build the static HTTP headers for an endpoint
fn build_headers(extra: &std::collections::BTreeMap<String, String>) -> Result<HeaderMap> {
    let mut header_map = HeaderMap::new();
    header_map.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    header_map.insert(ACCEPT, HeaderValue::from_static(ACCEPT_BOTH));

    for (key, value) in extra {
        let name = HeaderName::from_str(key).map_err(|e| {
            MCPError::ConfigError(format!("Invalid header name '{key}': {e}"))
        })?;
        let value = HeaderValue::from_str(value).map_err(|e| {
            MCPError::ConfigError(format!("Invalid header value for '{key}': {e}"))
        })?;
        header_map.insert(name, value);
    }

    Ok(header_map)
}

fn is_event_stream(headers: &HeaderMap) -> bool {
    headers
        .get(CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .is_some_and(|ct| ct.starts_with("text/event-stream"))
}

/// 4xx means the server refused the request; other statuses count as transport failures
fn status_error(status: StatusCode, method: &str, body: &str) -> MCPError {
    let message = format!("HTTP {status} for {method}: {body}");
    if status.is_client_error() {
        MCPError::Protocol(message)
    } else {
        MCPError::RequestFailed(message)
    }
}

/// Read SSE events until the response for `id` arrives
async fn read_sse_response(response: reqwest::Response, id: u64, method: &str) -> Result<Value> {
    let mut stream = response.bytes_stream().eventsource();

    while let Some(event) = stream.next().await {
        let event = event
            .map_err(|e| MCPError::RequestFailed(format!("SSE stream error for {method}: {e}")))?;

        if event.data.trim().is_empty() {
            continue;
        }

        let message: Value = match serde_json::from_str(&event.data) {
            Ok(message) => message,
            Err(e) => {
                debug!(method, error = %e, "Skipping non-JSON SSE event");
                continue;
            }
        };

        if message.get("id").and_then(Value::as_u64) == Some(id)
            && (message.get("result").is_some() || message.get("error").is_some())
        {
            return Ok(message);
        }

        debug!(
            method,
            notification = message.get("method").and_then(|m| m.as_str()).unwrap_or("?"),
            "Skipping unrelated SSE message"
        );
    }

    Err(MCPError::RequestFailed(format!(
        "SSE stream closed before the {method} response arrived"
    )))
}
