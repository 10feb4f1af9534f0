// crates/patient-context-mcp/src/lib.rs
// ============================================================================
// Module: Patient Context MCP
// Description: MCP server exposing the patient background tool.
// Purpose: Dispatch JSON-RPC requests to the local inference pipeline.
// Dependencies: patient-context-config, patient-context-inference, axum, tokio
// ============================================================================

//! ## Overview
//! `patient-context-mcp` exposes the `get_patient_background` tool over
//! JSON-RPC 2.0 on an HTTP transport. Every request is answered with a
//! well-formed envelope: protocol faults become error envelopes, backend
//! faults follow the configured failure policy, and nothing escapes to the
//! transport unhandled. Inbound payloads are untrusted.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod audit;
pub mod server;
pub mod tools;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use audit::AuditEvent;
pub use audit::AuditSink;
pub use audit::FileAuditSink;
pub use audit::NoopAuditSink;
pub use audit::StderrAuditSink;
pub use server::McpServer;
pub use server::McpServerError;
pub use tools::ToolDefinition;
pub use tools::ToolError;
pub use tools::ToolName;
pub use tools::ToolRouter;
