// crates/patient-context-mcp/src/tools.rs
// ============================================================================
// Module: MCP Tool Router
// Description: Tool routing for the patient context MCP server.
// Purpose: Expose the patient background tool over the inference pipeline.
// Dependencies: patient-context-config, patient-context-inference
// ============================================================================

//! ## Overview
//! The tool router dispatches MCP tool calls to the inference pipeline. Tool
//! inputs are untrusted and handled leniently: the single registered tool
//! treats a missing or non-string `symptoms` argument as an empty string
//! rather than rejecting the call.
//!
//! ## Invariants
//! - The registry is fixed at startup and never mutated by a request.
//! - Backend faults map onto the configured failure policy, never panics.
//! - Tool content is always text-typed; callers re-parse the payload.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use patient_context_config::BackendFailurePolicy;
use patient_context_inference::InferenceClient;
use patient_context_inference::InferenceError;
use serde::Deserialize;
use serde::Serialize;
use serde_json::Value;
use serde_json::json;
use thiserror::Error;

use crate::audit::AuditEvent;
use crate::audit::AuditSink;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Tool Names
// ============================================================================

/// Registered MCP tool names.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolName {
    /// Patient background summarization tool.
    GetPatientBackground,
}

impl ToolName {
    /// Parses a wire tool name.
    #[must_use]
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "get_patient_background" => Some(Self::GetPatientBackground),
            _ => None,
        }
    }

    /// Returns the wire name for the tool.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetPatientBackground => "get_patient_background",
        }
    }
}

// ============================================================================
// SECTION: Tool Definitions
// ============================================================================

/// Tool definition used by MCP tool listing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// MCP tool name.
    pub name: String,
    /// Tool description for clients.
    pub description: String,
    /// JSON schema for tool input.
    #[serde(rename = "inputSchema")]
    pub input_schema: Value,
}

/// Builds the fixed tool registry in declaration order.
fn tool_definitions() -> Vec<ToolDefinition> {
    vec![ToolDefinition {
        name: ToolName::GetPatientBackground.as_str().to_string(),
        description: "Provides patient medical context relevant to the given symptoms using the \
                      local GPU model."
            .to_string(),
        input_schema: json!({
            "type": "object",
            "properties": { "symptoms": { "type": "string" } },
            "required": ["symptoms"],
        }),
    }]
}

// ============================================================================
// SECTION: Tool Router
// ============================================================================

/// Tool router for MCP requests.
#[derive(Clone)]
pub struct ToolRouter {
    /// Inference client used for summarization calls.
    inference: Arc<InferenceClient>,
    /// Fixed system instruction carrying the patient profile.
    system_instruction: Arc<String>,
    /// Behavior when the backend call fails.
    failure_policy: BackendFailurePolicy,
    /// Trace sink for tool invocations.
    audit: Arc<dyn AuditSink>,
    /// Whether tool arguments are included in trace events.
    log_payloads: bool,
}

impl ToolRouter {
    /// Builds a new tool router over the given inference client.
    #[must_use]
    pub fn new(
        inference: InferenceClient,
        system_instruction: String,
        failure_policy: BackendFailurePolicy,
        audit: Arc<dyn AuditSink>,
        log_payloads: bool,
    ) -> Self {
        Self {
            inference: Arc::new(inference),
            system_instruction: Arc::new(system_instruction),
            failure_policy,
            audit,
            log_payloads,
        }
    }

    /// Lists every registered tool in declaration order.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        tool_definitions()
    }

    /// Executes the named tool and returns the serialized text payload.
    ///
    /// # Errors
    ///
    /// Returns [`ToolError::UnknownTool`] for unregistered names and
    /// [`ToolError::Backend`] when the failure policy escalates backend
    /// faults.
    pub fn handle_tool_call(&self, name: &str, arguments: &Value) -> Result<String, ToolError> {
        let tool =
            ToolName::parse(name).ok_or_else(|| ToolError::UnknownTool(name.to_string()))?;
        match tool {
            ToolName::GetPatientBackground => self.handle_get_patient_background(arguments),
        }
    }

    /// Executes the patient background tool.
    fn handle_get_patient_background(&self, arguments: &Value) -> Result<String, ToolError> {
        let tool = ToolName::GetPatientBackground.as_str();
        let payload = self.log_payloads.then(|| arguments.clone());
        self.audit.record(&AuditEvent::tool_invoked(tool, payload));

        let symptoms = arguments.get("symptoms").and_then(Value::as_str).unwrap_or_default();
        match self.inference.summarize(&self.system_instruction, symptoms) {
            Ok(summary) => {
                serde_json::to_string(&summary).map_err(|_| ToolError::Serialization)
            }
            Err(error) => {
                self.audit.record(&AuditEvent::backend_failure(
                    tool,
                    error.kind(),
                    error_detail(&error),
                ));
                match self.failure_policy {
                    BackendFailurePolicy::NullContent => Ok("null".to_string()),
                    BackendFailurePolicy::ProtocolError => {
                        Err(ToolError::Backend(error.to_string()))
                    }
                }
            }
        }
    }
}

/// Extracts the trace detail for an inference failure.
fn error_detail(error: &InferenceError) -> String {
    match error {
        InferenceError::Parse(parse) => {
            format!("{error}; cleaned output: {}", parse.cleaned_excerpt())
        }
        InferenceError::Client(_) | InferenceError::Backend(_) | InferenceError::Response(_) => {
            error.to_string()
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Tool routing errors.
#[derive(Debug, Error)]
pub enum ToolError {
    /// Tool name is not registered.
    #[error("Unknown tool '{0}'")]
    UnknownTool(String),
    /// Tool call parameters were malformed.
    #[error("invalid tool params: {0}")]
    InvalidParams(String),
    /// Backend fault escalated by the failure policy.
    #[error("backend failure: {0}")]
    Backend(String),
    /// Response payload serialization failed.
    #[error("serialization failed")]
    Serialization,
}
