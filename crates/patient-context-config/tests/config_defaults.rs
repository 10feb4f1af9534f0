//! Config defaults and core validation tests for patient-context-config.
// crates/patient-context-config/tests/config_defaults.rs
// =============================================================================
// Module: Config Defaults Tests
// Description: Validate default behavior and core config invariants.
// Purpose: Ensure the zero-config path serves out of the box.
// =============================================================================

use patient_context_config::BackendFailurePolicy;
use patient_context_config::DEFAULT_PATIENT_PROFILE;

mod common;

use crate::common::TestResult;
use crate::common::sample_config;

#[test]
fn default_config_validates() -> TestResult {
    let config = sample_config();
    config.validate().map_err(|err| err.to_string())?;
    Ok(())
}

#[test]
fn default_bind_listens_on_all_interfaces() -> TestResult {
    let config = sample_config();
    if config.server.bind != "0.0.0.0:8081" {
        return Err(format!("unexpected default bind {}", config.server.bind));
    }
    let addr = config.server.bind_addr().map_err(|err| err.to_string())?;
    if addr.port() != 8081 {
        return Err(format!("unexpected default port {}", addr.port()));
    }
    Ok(())
}

#[test]
fn default_backend_targets_local_chat_endpoint() -> TestResult {
    let config = sample_config();
    if config.backend.chat_url() != "http://127.0.0.1:52403/v1/chat/completions" {
        return Err(format!("unexpected chat url {}", config.backend.chat_url()));
    }
    if config.backend.model != "Phi-4-mini-instruct-cuda-gpu:5" {
        return Err(format!("unexpected default model {}", config.backend.model));
    }
    if config.backend.timeout_ms != 60_000 {
        return Err(format!("unexpected default timeout {}", config.backend.timeout_ms));
    }
    Ok(())
}

#[test]
fn default_failure_policy_is_null_content() -> TestResult {
    let config = sample_config();
    if config.backend.failure_policy != BackendFailurePolicy::NullContent {
        return Err("backend.failure_policy should default to null_content".to_string());
    }
    Ok(())
}

#[test]
fn chat_url_tolerates_trailing_slash_on_base() -> TestResult {
    let mut config = sample_config();
    config.backend.base_url = "http://127.0.0.1:52403/".to_string();
    if config.backend.chat_url() != "http://127.0.0.1:52403/v1/chat/completions" {
        return Err(format!("unexpected chat url {}", config.backend.chat_url()));
    }
    Ok(())
}

#[test]
fn default_profile_is_builtin_patient_profile() -> TestResult {
    let config = sample_config();
    let profile = config.context.resolve_profile().map_err(|err| err.to_string())?;
    if profile != DEFAULT_PATIENT_PROFILE {
        return Err("default profile should be the built-in patient profile".to_string());
    }
    if !profile.contains("Mild asthma") {
        return Err("built-in profile is missing expected content".to_string());
    }
    Ok(())
}

#[test]
fn effective_config_round_trips_through_toml() -> TestResult {
    let config = sample_config();
    let rendered = config.to_toml_string().map_err(|err| err.to_string())?;
    let parsed: patient_context_config::PatientContextConfig =
        toml::from_str(&rendered).map_err(|err| err.to_string())?;
    parsed.validate().map_err(|err| err.to_string())?;
    if parsed.server.bind != config.server.bind {
        return Err("bind changed across toml round trip".to_string());
    }
    Ok(())
}
