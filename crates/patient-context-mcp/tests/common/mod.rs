// crates/patient-context-mcp/tests/common/mod.rs
// ============================================================================
// Module: MCP Test Support
// Description: Shared helpers for dispatcher and tool router tests.
// Purpose: Build routers against stub or unreachable backends.
// Dependencies: patient-context-inference, tiny_http
// ============================================================================

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use std::sync::Arc;
use std::thread;

use axum::http::StatusCode;
use patient_context_config::BackendFailurePolicy;
use patient_context_inference::InferenceClient;
use patient_context_inference::InferenceConfig;
use patient_context_mcp::NoopAuditSink;
use patient_context_mcp::ToolRouter;
use patient_context_mcp::server::ServerState;
use patient_context_mcp::server::process_payload;
use serde_json::Value;
use serde_json::json;
use tiny_http::Response;
use tiny_http::Server;

/// Builds a router pointed at the given chat URL.
pub fn router_with(chat_url: String, policy: BackendFailurePolicy) -> ToolRouter {
    let inference = InferenceClient::new(InferenceConfig {
        chat_url,
        model: "test-model".to_string(),
        max_tokens: 300,
        temperature: 0.1,
        timeout_ms: 5_000,
    })
    .unwrap();
    ToolRouter::new(
        inference,
        "system instruction".to_string(),
        policy,
        Arc::new(NoopAuditSink),
        true,
    )
}

/// Builds a router whose backend is unreachable.
pub fn unreachable_router(policy: BackendFailurePolicy) -> ToolRouter {
    router_with("http://127.0.0.1:1/v1/chat/completions".to_string(), policy)
}

/// Builds transport state over the given router.
pub fn state_with(router: ToolRouter) -> ServerState {
    ServerState::new(router, Arc::new(NoopAuditSink), true, 1024 * 1024)
}

/// Runs one serialized request through the transport-independent core.
pub fn rpc(state: &ServerState, request: &Value) -> (StatusCode, Value) {
    let bytes = serde_json::to_vec(request).unwrap();
    process_payload(state, &bytes)
}

/// Spawns a stub backend that answers one chat request with `content`.
pub fn spawn_backend(content: &str) -> (String, thread::JoinHandle<()>) {
    let body = json!({
        "choices": [
            { "message": { "role": "assistant", "content": content } }
        ]
    })
    .to_string();
    let server = Server::http("127.0.0.1:0").unwrap();
    let addr = server.server_addr().to_ip().unwrap();
    let url = format!("http://{addr}/v1/chat/completions");

    let handle = thread::spawn(move || {
        if let Ok(request) = server.recv() {
            let response = Response::from_string(body).with_status_code(200);
            let _ = request.respond(response);
        }
    });

    (url, handle)
}
