// crates/patient-context-mcp/src/server.rs
// ============================================================================
// Module: MCP Server
// Description: JSON-RPC 2.0 dispatcher and HTTP transport.
// Purpose: Answer every inbound request with a well-formed envelope.
// Dependencies: patient-context-config, axum, tokio
// ============================================================================

//! ## Overview
//! The MCP server exposes the patient background tool using JSON-RPC 2.0 over
//! HTTP and always routes calls through [`crate::tools::ToolRouter`]. The
//! dispatcher never leaves a request unanswered: protocol faults become error
//! envelopes with the caller's `id` echoed verbatim, transport faults use the
//! fixed status mapping for each fault class, and internal faults
//! collapse to a `-32603` envelope with a null `id`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use axum::Router;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::get;
use patient_context_config::AuditSinkKind;
use patient_context_config::PatientContextConfig;
use patient_context_inference::InferenceClient;
use patient_context_inference::InferenceConfig;
use patient_context_inference::build_system_instruction;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;
use crate::audit::FileAuditSink;
use crate::audit::NoopAuditSink;
use crate::audit::StderrAuditSink;
use crate::tools::ToolDefinition;
use crate::tools::ToolError;
use crate::tools::ToolRouter;


// ============================================================================
// SECTION: Protocol Constants
// ============================================================================

/// Protocol version advertised by `initialize`.
const PROTOCOL_VERSION: &str = "2025-06-18";
/// Server name advertised by `initialize`.
const SERVER_NAME: &str = "patient-context-mcp";
/// Server version advertised by `initialize`.
const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

// ============================================================================
// SECTION: MCP Server
// ============================================================================

/// MCP server instance.
pub struct McpServer {
    /// Server configuration.
    config: PatientContextConfig,
    /// Shared transport state.
    state: Arc<ServerState>,
}

impl McpServer {
    /// Builds a new MCP server from configuration.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when initialization fails.
    pub fn from_config(config: PatientContextConfig) -> Result<Self, McpServerError> {
        config.validate().map_err(|err| McpServerError::Config(err.to_string()))?;
        let audit = build_audit_sink(&config)?;
        let profile = config
            .context
            .resolve_profile()
            .map_err(|err| McpServerError::Init(err.to_string()))?;
        let inference = InferenceClient::new(InferenceConfig {
            chat_url: config.backend.chat_url(),
            model: config.backend.model.clone(),
            max_tokens: config.backend.max_tokens,
            temperature: config.backend.temperature,
            timeout_ms: config.backend.timeout_ms,
        })
        .map_err(|err| McpServerError::Init(err.to_string()))?;
        let router = ToolRouter::new(
            inference,
            build_system_instruction(&profile),
            config.backend.failure_policy,
            Arc::clone(&audit),
            config.audit.log_payloads,
        );
        let state = Arc::new(ServerState::new(
            router,
            audit,
            config.audit.log_payloads,
            config.server.max_body_bytes,
        ));
        Ok(Self {
            config,
            state,
        })
    }

    /// Serves requests over the HTTP transport until the process exits.
    ///
    /// # Errors
    ///
    /// Returns [`McpServerError`] when the server fails.
    pub async fn serve(self) -> Result<(), McpServerError> {
        let addr = self
            .config
            .server
            .bind_addr()
            .map_err(|err| McpServerError::Config(err.to_string()))?;
        let app = Router::new()
            .route("/", get(handle_liveness).post(handle_http))
            .route("/rpc", get(handle_liveness).post(handle_http))
            .with_state(self.state);
        let listener = tokio::net::TcpListener::bind(addr)
            .await
            .map_err(|_| McpServerError::Transport("http bind failed".to_string()))?;
        axum::serve(listener, app)
            .await
            .map_err(|_| McpServerError::Transport("http server failed".to_string()))
    }
}

/// Shared server state for HTTP handlers.
pub struct ServerState {
    /// Tool router for request dispatch.
    router: ToolRouter,
    /// Trace sink for inbound requests.
    audit: Arc<dyn AuditSink>,
    /// Whether request payloads are included in trace events.
    log_payloads: bool,
    /// Maximum allowed request body size.
    max_body_bytes: usize,
}

impl ServerState {
    /// Builds transport state over the given router and trace sink.
    #[must_use]
    pub fn new(
        router: ToolRouter,
        audit: Arc<dyn AuditSink>,
        log_payloads: bool,
        max_body_bytes: usize,
    ) -> Self {
        Self {
            router,
            audit,
            log_payloads,
            max_body_bytes,
        }
    }
}

/// Builds the audit sink selected by configuration.
fn build_audit_sink(config: &PatientContextConfig) -> Result<Arc<dyn AuditSink>, McpServerError> {
    match config.audit.sink {
        AuditSinkKind::Stderr => Ok(Arc::new(StderrAuditSink)),
        AuditSinkKind::None => Ok(Arc::new(NoopAuditSink)),
        AuditSinkKind::File => {
            let path = config
                .audit
                .path
                .as_deref()
                .ok_or_else(|| McpServerError::Config("audit.path required".to_string()))?;
            let sink = FileAuditSink::new(std::path::Path::new(path))
                .map_err(|err| McpServerError::Init(err.to_string()))?;
            Ok(Arc::new(sink))
        }
    }
}

// ============================================================================
// SECTION: HTTP Transport
// ============================================================================

/// Answers GET liveness probes.
async fn handle_liveness() -> &'static str {
    "OK"
}

/// Handles HTTP JSON-RPC requests.
async fn handle_http(State(state): State<Arc<ServerState>>, bytes: Bytes) -> impl IntoResponse {
    let (status, payload) = process_payload(&state, &bytes);
    (status, axum::Json(payload))
}

// ============================================================================
// SECTION: JSON-RPC Handling
// ============================================================================

/// Incoming JSON-RPC request payload.
///
/// Parsing is lenient: a missing `id` is treated as null and a missing
/// `method` dispatches to the unknown-method arm.
#[derive(Debug, Deserialize)]
pub struct JsonRpcRequest {
    /// Method name.
    #[serde(default)]
    pub method: Option<String>,
    /// Request identifier, echoed verbatim.
    #[serde(default)]
    pub id: Value,
    /// Optional parameters payload.
    #[serde(default)]
    pub params: Option<Value>,
}

/// JSON-RPC response envelope.
#[derive(Debug, Serialize)]
pub struct JsonRpcResponse {
    /// JSON-RPC protocol version.
    jsonrpc: &'static str,
    /// Request identifier.
    id: Value,
    /// Successful result payload.
    #[serde(skip_serializing_if = "Option::is_none")]
    result: Option<Value>,
    /// Error payload when the request fails.
    #[serde(skip_serializing_if = "Option::is_none")]
    error: Option<JsonRpcError>,
}

/// JSON-RPC error payload.
#[derive(Debug, Serialize)]
struct JsonRpcError {
    /// Error code.
    code: i64,
    /// Human-readable error message.
    message: String,
}

/// Tool call parameters for JSON-RPC requests.
#[derive(Debug, Deserialize)]
struct ToolCallParams {
    /// Tool name.
    name: String,
    /// Raw JSON arguments, defaulting to an empty mapping.
    #[serde(default = "empty_arguments")]
    arguments: Value,
}

/// Tool list response payload.
#[derive(Debug, Serialize)]
struct ToolListResult {
    /// Registered tool definitions.
    tools: Vec<ToolDefinition>,
}

/// Tool call response payload.
#[derive(Debug, Serialize)]
struct ToolCallResult {
    /// Tool output content.
    content: Vec<ToolContent>,
}

/// Tool output payloads for JSON-RPC responses.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ToolContent {
    /// Serialized JSON carried as text; callers re-parse it.
    Text {
        /// Serialized payload.
        text: String,
    },
}

/// Dispatchable protocol methods.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Method {
    /// Protocol handshake.
    Initialize,
    /// Tool registry listing.
    ToolsList,
    /// Tool invocation.
    ToolsCall,
    /// Anything else, including an absent method.
    Unknown,
}

impl Method {
    /// Classifies the wire method name.
    fn parse(method: Option<&str>) -> Self {
        match method {
            Some("initialize") => Self::Initialize,
            Some("tools/list") => Self::ToolsList,
            Some("tools/call") => Self::ToolsCall,
            _ => Self::Unknown,
        }
    }
}

/// Processes one raw request body into a status and response payload.
///
/// This is the transport-independent core: the HTTP layer hands it the
/// complete body bytes and writes back whatever it returns.
#[must_use]
pub fn process_payload(state: &ServerState, bytes: &[u8]) -> (StatusCode, Value) {
    if bytes.len() > state.max_body_bytes {
        let response = error_response(Value::Null, -32600, "request body too large".to_string());
        return (StatusCode::PAYLOAD_TOO_LARGE, response_value(response));
    }
    let Ok(payload) = serde_json::from_slice::<Value>(bytes) else {
        return (StatusCode::BAD_REQUEST, json!({"error": "Invalid JSON"}));
    };
    state.audit.record(&AuditEvent::request_received(
        payload.get("method").and_then(Value::as_str),
        payload.get("id").filter(|id| !id.is_null()).map(Value::to_string),
        state.log_payloads.then(|| payload.clone()),
    ));
    let Ok(request) = serde_json::from_value::<JsonRpcRequest>(payload) else {
        return (StatusCode::INTERNAL_SERVER_ERROR, internal_error_value());
    };
    let response = handle_request(&state.router, request);
    (StatusCode::OK, response_value(response))
}

/// Dispatches a JSON-RPC request to the tool router.
fn handle_request(router: &ToolRouter, request: JsonRpcRequest) -> JsonRpcResponse {
    match Method::parse(request.method.as_deref()) {
        Method::Initialize => JsonRpcResponse {
            jsonrpc: "2.0",
            id: request.id,
            result: Some(json!({
                "protocolVersion": PROTOCOL_VERSION,
                "capabilities": {},
                "serverInfo": {
                    "name": SERVER_NAME,
                    "version": SERVER_VERSION,
                },
            })),
            error: None,
        },
        Method::ToolsList => match serde_json::to_value(ToolListResult {
            tools: router.list_tools(),
        }) {
            Ok(value) => JsonRpcResponse {
                jsonrpc: "2.0",
                id: request.id,
                result: Some(value),
                error: None,
            },
            Err(_) => jsonrpc_error(request.id, &ToolError::Serialization),
        },
        Method::ToolsCall => {
            let id = request.id;
            let params = request.params.unwrap_or(Value::Null);
            match serde_json::from_value::<ToolCallParams>(params) {
                Ok(call) => {
                    match call_tool_with_blocking(router, &call.name, &call.arguments) {
                        Ok(text) => match serde_json::to_value(ToolCallResult {
                            content: vec![ToolContent::Text {
                                text,
                            }],
                        }) {
                            Ok(value) => JsonRpcResponse {
                                jsonrpc: "2.0",
                                id,
                                result: Some(value),
                                error: None,
                            },
                            Err(_) => jsonrpc_error(id, &ToolError::Serialization),
                        },
                        Err(err) => jsonrpc_error(id, &err),
                    }
                }
                Err(_) => jsonrpc_error(
                    id,
                    &ToolError::InvalidParams("invalid tool params".to_string()),
                ),
            }
        }
        Method::Unknown => {
            let label = request.method.as_deref().unwrap_or("<missing>");
            error_response(request.id, -32601, format!("Unknown method '{label}'"))
        }
    }
}

/// Executes a tool call, shifting to a blocking context when available.
fn call_tool_with_blocking(
    router: &ToolRouter,
    name: &str,
    arguments: &Value,
) -> Result<String, ToolError> {
    match tokio::runtime::Handle::try_current() {
        Ok(handle) if handle.runtime_flavor() == tokio::runtime::RuntimeFlavor::MultiThread => {
            tokio::task::block_in_place(|| router.handle_tool_call(name, arguments))
        }
        _ => router.handle_tool_call(name, arguments),
    }
}

/// Builds a JSON-RPC error response for a tool failure.
fn jsonrpc_error(id: Value, error: &ToolError) -> JsonRpcResponse {
    let (code, message) = match error {
        ToolError::UnknownTool(_) => (-32601, error.to_string()),
        ToolError::InvalidParams(message) => (-32602, message.clone()),
        ToolError::Backend(message) => (-32050, message.clone()),
        ToolError::Serialization => (-32603, "serialization failed".to_string()),
    };
    error_response(id, code, message)
}

/// Builds an error envelope with the given code and message.
fn error_response(id: Value, code: i64, message: String) -> JsonRpcResponse {
    JsonRpcResponse {
        jsonrpc: "2.0",
        id,
        result: None,
        error: Some(JsonRpcError {
            code,
            message,
        }),
    }
}

/// Serializes an envelope, collapsing serialization faults to `-32603`.
fn response_value(response: JsonRpcResponse) -> Value {
    serde_json::to_value(&response).unwrap_or_else(|_| internal_error_value())
}

/// Fixed internal-error envelope with a null `id`.
fn internal_error_value() -> Value {
    json!({
        "jsonrpc": "2.0",
        "id": null,
        "error": { "code": -32603, "message": "Internal server error" },
    })
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// MCP server errors.
#[derive(Debug, thiserror::Error)]
pub enum McpServerError {
    /// Configuration errors.
    #[error("config error: {0}")]
    Config(String),
    /// Initialization errors.
    #[error("init error: {0}")]
    Init(String),
    /// Transport errors.
    #[error("transport error: {0}")]
    Transport(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Default empty arguments mapping for tool calls.
fn empty_arguments() -> Value {
    Value::Object(serde_json::Map::new())
}
