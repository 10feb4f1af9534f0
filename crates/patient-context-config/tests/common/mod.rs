// crates/patient-context-config/tests/common/mod.rs
// ============================================================================
// Module: Config Test Support
// Description: Shared helpers for configuration tests.
// Purpose: Provide sample configs and error assertions.
// Dependencies: patient-context-config
// ============================================================================

//! ## Overview
//! Shared helpers for config test files.

#![allow(dead_code, reason = "Test helpers are selectively used across suites.")]

use patient_context_config::ConfigError;
use patient_context_config::PatientContextConfig;

/// Result alias keeping assertions panic-free.
pub type TestResult = Result<(), String>;

/// Returns a default configuration value.
pub fn sample_config() -> PatientContextConfig {
    PatientContextConfig::default()
}

/// Asserts that a validation result failed with a message containing `needle`.
pub fn assert_invalid(result: Result<(), ConfigError>, needle: &str) -> TestResult {
    match result {
        Err(error) => {
            let message = error.to_string();
            if message.contains(needle) {
                Ok(())
            } else {
                Err(format!("error {message} did not contain {needle}"))
            }
        }
        Ok(()) => Err("expected invalid config".to_string()),
    }
}
