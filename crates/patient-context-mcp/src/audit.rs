// crates/patient-context-mcp/src/audit.rs
// ============================================================================
// Module: MCP Audit Logging
// Description: Structured trace events for MCP request handling.
// Purpose: Emit advisory JSON-line diagnostics without hard dependencies.
// Dependencies: patient-context-config, serde
// ============================================================================

//! ## Overview
//! This module defines the diagnostic trace for the server: one JSON line per
//! inbound request, tool invocation, and backend failure. The trace is
//! advisory only: emission failures are swallowed and never alter response
//! content. Payload logging can be disabled for deployments that must not
//! write symptom text to logs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::OpenOptions;
use std::io;
use std::io::Write;
use std::path::Path;
use std::sync::Mutex;
use std::time::SystemTime;
use std::time::UNIX_EPOCH;

use serde::Serialize;
use serde_json::Value;

// ============================================================================
// SECTION: Types
// ============================================================================

/// Trace event payload.
#[derive(Debug, Clone, Serialize)]
pub struct AuditEvent {
    /// Event identifier.
    pub event: &'static str,
    /// Event timestamp (milliseconds since epoch).
    pub timestamp_ms: u128,
    /// JSON-RPC method name when available.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
    /// Request identifier when provided.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub request_id: Option<String>,
    /// Tool name when available (tools/call).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool: Option<&'static str>,
    /// Raw payload when payload logging is enabled.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Value>,
    /// Normalized error kind label.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_kind: Option<&'static str>,
    /// Error or excerpt detail.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl AuditEvent {
    /// Builds an event for an inbound JSON-RPC request.
    #[must_use]
    pub fn request_received(
        method: Option<&str>,
        request_id: Option<String>,
        payload: Option<Value>,
    ) -> Self {
        Self {
            event: "request_received",
            timestamp_ms: now_ms(),
            method: method.map(str::to_string),
            request_id,
            tool: None,
            payload,
            error_kind: None,
            detail: None,
        }
    }

    /// Builds an event for a tool invocation.
    #[must_use]
    pub fn tool_invoked(tool: &'static str, payload: Option<Value>) -> Self {
        Self {
            event: "tool_invoked",
            timestamp_ms: now_ms(),
            method: Some("tools/call".to_string()),
            request_id: None,
            tool: Some(tool),
            payload,
            error_kind: None,
            detail: None,
        }
    }

    /// Builds an event for a failed backend call or unparseable output.
    #[must_use]
    pub fn backend_failure(tool: &'static str, error_kind: &'static str, detail: String) -> Self {
        Self {
            event: "backend_failure",
            timestamp_ms: now_ms(),
            method: Some("tools/call".to_string()),
            request_id: None,
            tool: Some(tool),
            payload: None,
            error_kind: Some(error_kind),
            detail: Some(detail),
        }
    }
}

// ============================================================================
// SECTION: Sinks
// ============================================================================

/// Trace sink for MCP request handling.
pub trait AuditSink: Send + Sync {
    /// Records one trace event. Emission failures are swallowed.
    fn record(&self, event: &AuditEvent);
}

/// Audit sink that logs JSON lines to stderr.
pub struct StderrAuditSink;

impl AuditSink for StderrAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event) {
            let _ = writeln!(std::io::stderr(), "{payload}");
        }
    }
}

/// Audit sink that logs JSON lines to a file.
pub struct FileAuditSink {
    /// File handle used for append-only logging.
    file: Mutex<std::fs::File>,
}

impl FileAuditSink {
    /// Opens the audit log file in append mode.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be opened.
    pub fn new(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            file: Mutex::new(file),
        })
    }
}

impl AuditSink for FileAuditSink {
    fn record(&self, event: &AuditEvent) {
        if let Ok(payload) = serde_json::to_string(event)
            && let Ok(mut file) = self.file.lock()
        {
            let _ = writeln!(file, "{payload}");
            let _ = file.flush();
        }
    }
}

/// No-op audit sink for tests and silenced deployments.
pub struct NoopAuditSink;

impl AuditSink for NoopAuditSink {
    fn record(&self, _event: &AuditEvent) {}
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Returns milliseconds since the Unix epoch.
fn now_ms() -> u128 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis()).unwrap_or_default()
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
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

    use std::fs;

    use serde_json::Value;
    use serde_json::json;

    use super::AuditEvent;
    use super::AuditSink;
    use super::FileAuditSink;

    #[test]
    fn file_sink_appends_json_lines() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("audit.jsonl");
        let sink = FileAuditSink::new(&path).unwrap();

        sink.record(&AuditEvent::request_received(
            Some("tools/list"),
            Some("1".to_string()),
            Some(json!({"method": "tools/list", "id": 1})),
        ));
        sink.record(&AuditEvent::backend_failure(
            "get_patient_background",
            "backend",
            "backend returned status 503".to_string(),
        ));

        let contents = fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = contents.lines().collect();
        assert_eq!(lines.len(), 2);
        let first: Value = serde_json::from_str(lines[0]).unwrap();
        assert_eq!(first["event"], "request_received");
        assert_eq!(first["method"], "tools/list");
        let second: Value = serde_json::from_str(lines[1]).unwrap();
        assert_eq!(second["event"], "backend_failure");
        assert_eq!(second["error_kind"], "backend");
    }

    #[test]
    fn optional_fields_are_omitted_when_absent() {
        let event = AuditEvent::request_received(None, None, None);
        let value = serde_json::to_value(&event).unwrap();
        assert!(value.get("method").is_none());
        assert!(value.get("payload").is_none());
        assert!(value.get("error_kind").is_none());
        assert!(value["timestamp_ms"].is_number());
    }
}
