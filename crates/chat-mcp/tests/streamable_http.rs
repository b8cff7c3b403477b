use std::convert::Infallible;
use std::sync::{Arc, Mutex};

use axum::Json;
use axum::Router;
use axum::extract::State;
use axum::http::{HeaderMap, StatusCode};
use axum::response::sse::{Event, Sse};
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use chat_mcp::{
    EndpointConfig, MCPClient, MCPContent, MCPError, McpConfig, StreamableHttpClient,
    ToolRegistryClient, convert_tool_result,
};
use serde_json::{Value, json};
use tokio::net::TcpListener;

const SESSION: &str = "session-42";

#[derive(Clone, Default)]
struct MockState {
    /// (method, session header, protocol header) for every POST
    seen: Arc<Mutex<Vec<(String, Option<String>, Option<String>)>>>,
    deleted: Arc<Mutex<Vec<Option<String>>>>,
    auth: Arc<Mutex<Vec<Option<String>>>>,
}

fn header(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}

fn tool(name: &str) -> Value {
    json!({
        "name": name,
        "description": format!("{name} two numbers"),
        "inputSchema": {
            "type": "object",
            "properties": {"a": {"type": "number"}, "b": {"type": "number"}},
            "required": ["a", "b"]
        }
    })
}

fn call_result(name: &str, args: &Value) -> Value {
    let a = args["a"].as_i64().unwrap_or_default();
    let b = args["b"].as_i64().unwrap_or_default();
    match name {
        "add" => json!({"content": [{"type": "text", "text": (a + b).to_string()}]}),
        "multiply" => json!({"content": [{"type": "text", "text": (a * b).to_string()}]}),
        "divide" if b == 0 => json!({
            "content": [{"type": "text", "text": "division by zero"}],
            "isError": true
        }),
        _ => json!({"content": [{"type": "text", "text": "unknown"}], "isError": true}),
    }
}

async fn post_handler(
    State(state): State<MockState>,
    headers: HeaderMap,
    Json(body): Json<Value>,
) -> Response {
    let method = body["method"].as_str().unwrap_or_default().to_string();
    let id = body.get("id").cloned().unwrap_or(Value::Null);

    state.seen.lock().unwrap().push((
        method.clone(),
        header(&headers, "mcp-session-id"),
        header(&headers, "mcp-protocol-version"),
    ));
    state
        .auth
        .lock()
        .unwrap()
        .push(header(&headers, "authorization"));

    match method.as_str() {
        "initialize" => {
            let response = json!({
                "jsonrpc": "2.0",
                "id": id,
                "result": {
                    "protocolVersion": "2025-03-26",
                    "capabilities": {"tools": {"listChanged": false}},
                    "serverInfo": {"name": "math-server", "version": "1.2.0"}
                }
            });
            let mut response_headers = HeaderMap::new();
            response_headers.insert("Mcp-Session-Id", SESSION.parse().unwrap());
            (StatusCode::OK, response_headers, Json(response)).into_response()
        }
        "notifications/initialized" => StatusCode::ACCEPTED.into_response(),
        "tools/list" => {
            let result = match body["params"]["cursor"].as_str() {
                None => json!({"tools": [tool("add")], "nextCursor": "page-2"}),
                Some("page-2") => json!({"tools": [tool("multiply"), tool("divide")]}),
                Some(_) => json!({"tools": []}),
            };
            Json(json!({"jsonrpc": "2.0", "id": id, "result": result})).into_response()
        }
        "tools/call" => {
            let name = body["params"]["name"].as_str().unwrap_or_default();
            match name {
                "explode" => {
                    return Json(json!({
                        "jsonrpc": "2.0",
                        "id": id,
                        "error": {"code": -32602, "message": "Invalid params: a must be a number"}
                    }))
                    .into_response();
                }
                "refused" => return (StatusCode::BAD_REQUEST, "bad request").into_response(),
                "overloaded" => {
                    return (StatusCode::SERVICE_UNAVAILABLE, "try later").into_response();
                }
                _ => {}
            }
            let result = call_result(name, &body["params"]["arguments"]);

            // Answer over SSE, with an unrelated notification first.
            let events = vec![
                Ok::<_, Infallible>(Event::default().event("message").data(
                    json!({
                        "jsonrpc": "2.0",
                        "method": "notifications/progress",
                        "params": {"progress": 1}
                    })
                    .to_string(),
                )),
                Ok(Event::default()
                    .event("message")
                    .data(json!({"jsonrpc": "2.0", "id": id, "result": result}).to_string())),
            ];
            Sse::new(futures::stream::iter(events)).into_response()
        }
        _ => Json(json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": {"code": -32601, "message": format!("Method not found: {method}")}
        }))
        .into_response(),
    }
}

async fn delete_handler(State(state): State<MockState>, headers: HeaderMap) -> StatusCode {
    state
        .deleted
        .lock()
        .unwrap()
        .push(header(&headers, "mcp-session-id"));
    StatusCode::OK
}

async fn spawn_server() -> (String, MockState) {
    let state = MockState::default();
    let app = Router::new()
        .route("/mcp", post(post_handler).delete(delete_handler))
        .with_state(state.clone());

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    (format!("http://{addr}/mcp"), state)
}

fn unused_url() -> String {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{addr}/mcp")
}

#[tokio::test]
async fn handshake_sends_session_and_protocol_headers() {
    let (url, state) = spawn_server().await;

    let client = StreamableHttpClient::new("math", &EndpointConfig::streamable_http(&url)).unwrap();
    client.connect().await.unwrap();

    assert!(client.is_connected());
    assert_eq!(client.session_id().await.as_deref(), Some(SESSION));
    let info = client.server_info().await.unwrap();
    assert_eq!(info.name, "math-server");
    assert_eq!(info.protocol_version, "2025-03-26");

    let tools = client.list_tools().await.unwrap();
    let names: Vec<&str> = tools.iter().map(|t| t.name.as_str()).collect();
    assert_eq!(names, ["add", "multiply", "divide"]);

    let seen = state.seen.lock().unwrap().clone();
    let methods: Vec<&str> = seen.iter().map(|(m, _, _)| m.as_str()).collect();
    assert_eq!(
        methods,
        ["initialize", "notifications/initialized", "tools/list", "tools/list"]
    );
    // No session before the server assigns one, then always echoed.
    assert_eq!(seen[0].1, None);
    for (_, session, protocol) in &seen[1..] {
        assert_eq!(session.as_deref(), Some(SESSION));
        assert_eq!(protocol.as_deref(), Some("2025-03-26"));
    }
}

#[tokio::test]
async fn tool_calls_are_read_from_sse_stream() {
    let (url, _state) = spawn_server().await;

    let client = StreamableHttpClient::new("math", &EndpointConfig::streamable_http(&url)).unwrap();
    client.connect().await.unwrap();

    let result = client
        .call_tool("multiply", json!({"a": 8, "b": 12}))
        .await
        .unwrap();
    assert!(!result.is_error());
    assert_eq!(convert_tool_result(&result.content), "96");

    let failed = client
        .call_tool("divide", json!({"a": 1, "b": 0}))
        .await
        .unwrap();
    assert!(failed.is_error());
    assert_eq!(
        failed.content,
        [MCPContent::Text {
            text: "division by zero".to_string()
        }]
    );
}

#[tokio::test]
async fn disconnect_terminates_session() {
    let (url, state) = spawn_server().await;

    let client = StreamableHttpClient::new("math", &EndpointConfig::streamable_http(&url)).unwrap();
    client.connect().await.unwrap();
    client.disconnect().await.unwrap();

    assert!(!client.is_connected());
    assert_eq!(*state.deleted.lock().unwrap(), [Some(SESSION.to_string())]);
    assert!(matches!(
        client.list_tools().await,
        Err(MCPError::NotConnected)
    ));
}

#[tokio::test]
async fn configured_headers_are_sent() {
    let (url, state) = spawn_server().await;

    let endpoint = EndpointConfig::streamable_http(&url).with_header("Authorization", "Bearer t0k");
    let client = StreamableHttpClient::new("math", &endpoint).unwrap();
    client.connect().await.unwrap();

    let auth = state.auth.lock().unwrap().clone();
    assert!(!auth.is_empty());
    assert!(auth.iter().all(|a| a.as_deref() == Some("Bearer t0k")));
}

#[tokio::test]
async fn registry_builds_tool_set_and_routes_calls() {
    let (url, _state) = spawn_server().await;

    let registry = ToolRegistryClient::new(McpConfig::single("math", url)).unwrap();
    let tools = registry.fetch_tools().await.unwrap();

    assert_eq!(tools.len(), 3);
    assert_eq!(tools.get("add").unwrap().server, "math");
    assert_eq!(tools.get("add").unwrap().description, "add two numbers");

    let result = tools.call_tool("add", json!({"a": 3, "b": 5})).await.unwrap();
    assert_eq!(convert_tool_result(&result.content), "8");

    tools.close().await;
}

#[tokio::test]
async fn unreachable_endpoint_fails_whole_fetch() {
    let (url, state) = spawn_server().await;

    // "a-down" sorts first, so the healthy endpoint is never contacted.
    let config = McpConfig::single("math", url).with_endpoint(
        "a-down",
        EndpointConfig::streamable_http(unused_url()),
    );

    let err = ToolRegistryClient::new(config)
        .unwrap()
        .fetch_tools()
        .await
        .unwrap_err();

    assert!(matches!(err, MCPError::ConnectionFailed(ref m) if m.contains("a-down")));
    assert!(state.seen.lock().unwrap().is_empty());

    let core: chat_core::Error = err.into();
    assert_eq!(core.kind(), chat_core::ErrorKind::Connection);
}

#[tokio::test]
async fn json_rpc_errors_are_protocol_errors() {
    let (url, _state) = spawn_server().await;

    let client = StreamableHttpClient::new("math", &EndpointConfig::streamable_http(&url)).unwrap();
    client.connect().await.unwrap();

    let err = client.call_tool("explode", json!({})).await.unwrap_err();
    assert!(
        matches!(err, MCPError::Protocol(ref m) if m.contains("Invalid params")),
        "got {err:?}"
    );
    let core: chat_core::Error = err.into();
    assert_eq!(core.kind(), chat_core::ErrorKind::Processing);
    assert!(!core.is_transient());

    // Null arguments go out as an empty object.
    let result = client.call_tool("add", Value::Null).await.unwrap();
    assert_eq!(convert_tool_result(&result.content), "0");
}

#[tokio::test]
async fn client_errors_are_not_transient_but_server_errors_are() {
    let (url, _state) = spawn_server().await;

    let client = StreamableHttpClient::new("math", &EndpointConfig::streamable_http(&url)).unwrap();
    client.connect().await.unwrap();

    let refused: chat_core::Error = client
        .call_tool("refused", json!({}))
        .await
        .unwrap_err()
        .into();
    assert_eq!(refused.kind(), chat_core::ErrorKind::Processing);
    assert!(!refused.is_transient());

    let overloaded: chat_core::Error = client
        .call_tool("overloaded", json!({}))
        .await
        .unwrap_err()
        .into();
    assert_eq!(overloaded.kind(), chat_core::ErrorKind::Transport);
    assert!(overloaded.is_transient());
}
