// crates/patient-context-mcp/src/tools/tests.rs
// ============================================================================
// Module: Tool Router Unit Tests
// Description: Tests for tool naming, definitions, and failure policies.
// Purpose: Ensure the registry is fixed and backend faults map per policy.
// Dependencies: patient-context-inference
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use std::sync::Arc;

use patient_context_config::BackendFailurePolicy;
use patient_context_inference::InferenceClient;
use patient_context_inference::InferenceConfig;
use serde_json::json;

use super::ToolError;
use super::ToolName;
use super::ToolRouter;
use super::tool_definitions;
use crate::audit::NoopAuditSink;

/// Builds a router whose backend is unreachable.
fn unreachable_router(policy: BackendFailurePolicy) -> ToolRouter {
    let inference = InferenceClient::new(InferenceConfig {
        chat_url: "http://127.0.0.1:1/v1/chat/completions".to_string(),
        model: "test-model".to_string(),
        max_tokens: 300,
        temperature: 0.1,
        timeout_ms: 2_000,
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

#[test]
fn tool_name_round_trips() {
    let name = ToolName::parse("get_patient_background").unwrap();
    assert_eq!(name, ToolName::GetPatientBackground);
    assert_eq!(name.as_str(), "get_patient_background");
    assert!(ToolName::parse("get_patient_history").is_none());
}

#[test]
fn registry_defines_exactly_one_tool() {
    let tools = tool_definitions();
    assert_eq!(tools.len(), 1);
    assert_eq!(tools[0].name, "get_patient_background");
    assert_eq!(tools[0].input_schema["required"], json!(["symptoms"]));
    assert_eq!(tools[0].input_schema["properties"]["symptoms"]["type"], "string");
}

#[test]
fn unknown_tool_error_names_the_tool() {
    let router = unreachable_router(BackendFailurePolicy::NullContent);
    let err = router.handle_tool_call("no_such_tool", &json!({})).unwrap_err();
    assert!(matches!(err, ToolError::UnknownTool(_)));
    assert_eq!(err.to_string(), "Unknown tool 'no_such_tool'");
}

#[test]
fn null_content_policy_masks_backend_failure() {
    let router = unreachable_router(BackendFailurePolicy::NullContent);
    let text = router
        .handle_tool_call("get_patient_background", &json!({"symptoms": "chest tightness"}))
        .unwrap();
    assert_eq!(text, "null");
}

#[test]
fn protocol_error_policy_escalates_backend_failure() {
    let router = unreachable_router(BackendFailurePolicy::ProtocolError);
    let err = router
        .handle_tool_call("get_patient_background", &json!({"symptoms": "chest tightness"}))
        .unwrap_err();
    assert!(matches!(err, ToolError::Backend(_)));
}

#[test]
fn missing_symptoms_argument_defaults_to_empty() {
    // The unreachable backend fails either way; the call must not reject the
    // absent argument before reaching the backend.
    let router = unreachable_router(BackendFailurePolicy::NullContent);
    let text = router.handle_tool_call("get_patient_background", &json!({})).unwrap();
    assert_eq!(text, "null");
}
