// crates/patient-context-cli/src/serve_policy.rs
// ============================================================================
// Module: Serve Policy
// Description: Network exposure warnings for the server launcher.
// Purpose: Flag non-loopback binds that expose private patient context.
// Dependencies: std
// ============================================================================

//! ## Overview
//! The default deployment binds to all interfaces, so network exposure is
//! permitted; the policy here only warns. Binding a non-loopback address
//! without explicit opt-in produces a stderr warning naming the risk, and
//! opting in (flag or environment) silences it. The warning never blocks
//! startup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::net::SocketAddr;

use thiserror::Error;

/// Environment variable acknowledging non-loopback server binds.
pub const ALLOW_NON_LOOPBACK_ENV: &str = "PATIENT_CONTEXT_ALLOW_NON_LOOPBACK";

// ============================================================================
// SECTION: Policy
// ============================================================================

/// Resolves the non-loopback opt-in from the CLI flag and environment.
///
/// # Errors
///
/// Returns [`ServePolicyError::InvalidEnv`] when the environment value is not
/// a recognized boolean.
pub fn resolve_allow_non_loopback(flag: bool) -> Result<bool, ServePolicyError> {
    if flag {
        return Ok(true);
    }
    let Some(value) = env::var_os(ALLOW_NON_LOOPBACK_ENV) else {
        return Ok(false);
    };
    let value = value.to_string_lossy().to_string();
    parse_allow_non_loopback_value(&value)
}

/// Returns the exposure warning for the given bind, when one applies.
#[must_use]
pub fn exposure_warning(addr: SocketAddr, allow_non_loopback: bool) -> Option<String> {
    if addr.ip().is_loopback() || allow_non_loopback {
        return None;
    }
    Some(format!(
        "patient-context: WARNING: serving private patient context on non-loopback {addr}; set \
         {ALLOW_NON_LOOPBACK_ENV}=1 or pass --allow-non-loopback to acknowledge"
    ))
}

/// Parses an environment value into the opt-in flag.
fn parse_allow_non_loopback_value(value: &str) -> Result<bool, ServePolicyError> {
    match value.trim() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" | "" => Ok(false),
        _ => Err(ServePolicyError::InvalidEnv {
            value: value.to_string(),
        }),
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Serve policy failures.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ServePolicyError {
    /// Environment variable was set to an invalid value.
    #[error("{ALLOW_NON_LOOPBACK_ENV} has invalid value '{value}'")]
    InvalidEnv {
        /// Raw environment value.
        value: String,
    },
}

// ============================================================================
// SECTION: Tests
// ============================================================================

#[cfg(test)]
mod tests {
    #![allow(
        clippy::panic,
        clippy::unwrap_used,
        clippy::expect_used,
        reason = "Test-only panic-based assertions are permitted."
    )]

    use super::exposure_warning;
    use super::parse_allow_non_loopback_value;

    #[test]
    fn loopback_bind_has_no_warning() {
        let addr = "127.0.0.1:8081".parse().unwrap();
        assert!(exposure_warning(addr, false).is_none());
    }

    #[test]
    fn non_loopback_bind_warns_without_opt_in() {
        let addr = "0.0.0.0:8081".parse().unwrap();
        let warning = exposure_warning(addr, false).unwrap();
        assert!(warning.contains("non-loopback"));
        assert!(warning.contains("0.0.0.0:8081"));
    }

    #[test]
    fn opt_in_silences_the_warning() {
        let addr = "0.0.0.0:8081".parse().unwrap();
        assert!(exposure_warning(addr, true).is_none());
    }

    #[test]
    fn env_values_parse_as_booleans() {
        assert!(parse_allow_non_loopback_value("1").unwrap());
        assert!(parse_allow_non_loopback_value("true").unwrap());
        assert!(!parse_allow_non_loopback_value("0").unwrap());
        assert!(!parse_allow_non_loopback_value("").unwrap());
        assert!(parse_allow_non_loopback_value("maybe").is_err());
    }
}
