// crates/patient-context-config/src/config.rs
// ============================================================================
// Module: Patient Context Configuration
// Description: Configuration loading and validation for the context server.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: serde, toml, url
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! An explicitly requested file that cannot be read fails closed; when no file
//! is requested and none exists at the default location, the built-in
//! defaults are used so the server runs out of the box.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::net::SocketAddr;
use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "patient-context.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "PATIENT_CONTEXT_CONFIG";
/// Maximum configuration file size in bytes.
pub(crate) const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum profile file size in bytes.
pub(crate) const MAX_PROFILE_BYTES: usize = 64 * 1024;
/// Default server bind address.
const DEFAULT_BIND: &str = "0.0.0.0:8081";
/// Default maximum request body size in bytes.
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
/// Default inference backend base URL (local runtime).
const DEFAULT_BACKEND_BASE_URL: &str = "http://127.0.0.1:52403";
/// Default chat completions path on the backend.
const DEFAULT_BACKEND_CHAT_PATH: &str = "/v1/chat/completions";
/// Default backend model identifier.
const DEFAULT_BACKEND_MODEL: &str = "Phi-4-mini-instruct-cuda-gpu:5";
/// Default output token budget for a summarization call.
const DEFAULT_MAX_TOKENS: u32 = 300;
/// Maximum allowed output token budget.
pub(crate) const MAX_MAX_TOKENS: u32 = 4096;
/// Default sampling temperature (biased toward deterministic output).
const DEFAULT_TEMPERATURE: f64 = 0.1;
/// Maximum allowed sampling temperature.
pub(crate) const MAX_TEMPERATURE: f64 = 2.0;
/// Default backend request timeout in milliseconds.
const DEFAULT_BACKEND_TIMEOUT_MS: u64 = 60_000;
/// Minimum backend request timeout in milliseconds.
pub(crate) const MIN_BACKEND_TIMEOUT_MS: u64 = 1_000;
/// Maximum backend request timeout in milliseconds.
pub(crate) const MAX_BACKEND_TIMEOUT_MS: u64 = 600_000;

/// Built-in patient profile used when no profile is configured.
pub const DEFAULT_PATIENT_PROFILE: &str = "\
Patient Profile:
- Age: 38
- Chronic conditions: Mild asthma diagnosed at age 12
- Allergies: Penicillin
- Recent labs: Elevated CRP and ESR last month
- Lifestyle: Non-smoker, exercises 3x/week
- Medications: Albuterol inhaler PRN
";

// ============================================================================
// SECTION: Configuration Types
// ============================================================================

/// Patient context server configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PatientContextConfig {
    /// Server transport configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Inference backend configuration.
    #[serde(default)]
    pub backend: BackendConfig,
    /// Background context configuration.
    #[serde(default)]
    pub context: ContextConfig,
    /// Audit trace configuration.
    #[serde(default)]
    pub audit: AuditConfig,
}

impl PatientContextConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// An explicit path (CLI flag or `PATIENT_CONTEXT_CONFIG`) must exist and
    /// parse. When neither is set and no `patient-context.toml` is present in
    /// the working directory, built-in defaults are returned.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when reading or parsing fails.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let (resolved, explicit) = resolve_path(path)?;
        validate_path(&resolved)?;
        if !explicit && !resolved.exists() {
            return Ok(Self::default());
        }
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file is not valid utf-8".to_string()))?;
        toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))
    }

    /// Validates the full configuration tree.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when any section is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.server.validate()?;
        self.backend.validate()?;
        self.context.validate()?;
        self.audit.validate()
    }

    /// Renders the effective configuration as TOML.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when serialization fails.
    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(self).map_err(|err| ConfigError::Invalid(err.to_string()))
    }
}

/// Server transport configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Maximum request body size in bytes.
    #[serde(default = "default_max_body_bytes")]
    pub max_body_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            max_body_bytes: default_max_body_bytes(),
        }
    }
}

impl ServerConfig {
    /// Validates the server section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.max_body_bytes == 0 {
            return Err(ConfigError::Invalid(
                "server.max_body_bytes must be greater than zero".to_string(),
            ));
        }
        self.bind_addr().map(|_| ())
    }

    /// Parses the configured bind address.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the bind string is not a socket address.
    pub fn bind_addr(&self) -> Result<SocketAddr, ConfigError> {
        self.bind.trim().parse().map_err(|_| {
            ConfigError::Invalid("server.bind is not a valid socket address".to_string())
        })
    }
}

/// Inference backend configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendConfig {
    /// Backend base URL (scheme + host + port).
    #[serde(default = "default_backend_base_url")]
    pub base_url: String,
    /// Chat completions path appended to the base URL.
    #[serde(default = "default_backend_chat_path")]
    pub chat_path: String,
    /// Backend model identifier.
    #[serde(default = "default_backend_model")]
    pub model: String,
    /// Output token budget per summarization call.
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Sampling temperature.
    #[serde(default = "default_temperature")]
    pub temperature: f64,
    /// Request timeout in milliseconds.
    #[serde(default = "default_backend_timeout_ms")]
    pub timeout_ms: u64,
    /// Behavior when the backend call fails.
    #[serde(default)]
    pub failure_policy: BackendFailurePolicy,
}

impl Default for BackendConfig {
    fn default() -> Self {
        Self {
            base_url: default_backend_base_url(),
            chat_path: default_backend_chat_path(),
            model: default_backend_model(),
            max_tokens: default_max_tokens(),
            temperature: default_temperature(),
            timeout_ms: default_backend_timeout_ms(),
            failure_policy: BackendFailurePolicy::default(),
        }
    }
}

impl BackendConfig {
    /// Validates the backend section.
    fn validate(&self) -> Result<(), ConfigError> {
        let url = Url::parse(self.base_url.trim())
            .map_err(|_| ConfigError::Invalid("backend.base_url is not a valid url".to_string()))?;
        match url.scheme() {
            "http" | "https" => {}
            _ => {
                return Err(ConfigError::Invalid(
                    "backend.base_url scheme must be http or https".to_string(),
                ));
            }
        }
        if !self.chat_path.starts_with('/') {
            return Err(ConfigError::Invalid(
                "backend.chat_path must start with '/'".to_string(),
            ));
        }
        if self.model.trim().is_empty() {
            return Err(ConfigError::Invalid("backend.model must be non-empty".to_string()));
        }
        if self.max_tokens == 0 || self.max_tokens > MAX_MAX_TOKENS {
            return Err(ConfigError::Invalid(format!(
                "backend.max_tokens must be between 1 and {MAX_MAX_TOKENS}"
            )));
        }
        if !self.temperature.is_finite()
            || self.temperature < 0.0
            || self.temperature > MAX_TEMPERATURE
        {
            return Err(ConfigError::Invalid(format!(
                "backend.temperature must be between 0.0 and {MAX_TEMPERATURE}"
            )));
        }
        if self.timeout_ms < MIN_BACKEND_TIMEOUT_MS || self.timeout_ms > MAX_BACKEND_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "backend.timeout_ms must be between {MIN_BACKEND_TIMEOUT_MS} and \
                 {MAX_BACKEND_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }

    /// Returns the full chat completions endpoint URL.
    #[must_use]
    pub fn chat_url(&self) -> String {
        let base = self.base_url.trim().trim_end_matches('/');
        format!("{base}{}", self.chat_path)
    }
}

/// Behavior when an inference backend call fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendFailurePolicy {
    /// Surface backend failures as a successful tool result with null content
    /// (callers treat null as "context unavailable").
    #[default]
    NullContent,
    /// Surface backend failures as a JSON-RPC error envelope.
    ProtocolError,
}

/// Background context configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ContextConfig {
    /// Inline patient profile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<String>,
    /// Path to a file holding the patient profile text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<String>,
}

impl ContextConfig {
    /// Validates the context section.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.profile.is_some() && self.profile_path.is_some() {
            return Err(ConfigError::Invalid(
                "context.profile and context.profile_path are mutually exclusive".to_string(),
            ));
        }
        if let Some(profile) = &self.profile
            && profile.trim().is_empty()
        {
            return Err(ConfigError::Invalid("context.profile must be non-empty".to_string()));
        }
        if let Some(path) = &self.profile_path {
            validate_path_string("context.profile_path", path)?;
        }
        Ok(())
    }

    /// Resolves the effective profile text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a configured profile file cannot be read.
    pub fn resolve_profile(&self) -> Result<String, ConfigError> {
        if let Some(profile) = &self.profile {
            return Ok(profile.clone());
        }
        let Some(path) = &self.profile_path else {
            return Ok(DEFAULT_PATIENT_PROFILE.to_string());
        };
        let bytes = fs::read(path).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_PROFILE_BYTES {
            return Err(ConfigError::Invalid("profile file exceeds size limit".to_string()));
        }
        let text = String::from_utf8(bytes)
            .map_err(|_| ConfigError::Invalid("profile file is not valid utf-8".to_string()))?;
        if text.trim().is_empty() {
            return Err(ConfigError::Invalid("profile file must be non-empty".to_string()));
        }
        Ok(text)
    }
}

/// Audit trace configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditConfig {
    /// Audit sink selection.
    #[serde(default)]
    pub sink: AuditSinkKind,
    /// Target path for the file sink.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<String>,
    /// Whether full request payloads are included in trace events.
    #[serde(default = "default_log_payloads")]
    pub log_payloads: bool,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            sink: AuditSinkKind::default(),
            path: None,
            log_payloads: default_log_payloads(),
        }
    }
}

impl AuditConfig {
    /// Validates the audit section.
    fn validate(&self) -> Result<(), ConfigError> {
        match self.sink {
            AuditSinkKind::File => {
                let Some(path) = &self.path else {
                    return Err(ConfigError::Invalid(
                        "audit.sink=file requires audit.path".to_string(),
                    ));
                };
                validate_path_string("audit.path", path)
            }
            AuditSinkKind::Stderr | AuditSinkKind::None => {
                if self.path.is_some() {
                    return Err(ConfigError::Invalid(
                        "audit.path only allowed when audit.sink=file".to_string(),
                    ));
                }
                Ok(())
            }
        }
    }
}

/// Audit sink selection.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AuditSinkKind {
    /// JSON lines on stderr.
    #[default]
    Stderr,
    /// JSON lines appended to a file.
    File,
    /// Discard all trace events.
    None,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from CLI or environment defaults.
///
/// The second tuple element is true when the path was explicitly requested.
fn resolve_path(path: Option<&Path>) -> Result<(PathBuf, bool), ConfigError> {
    if let Some(path) = path {
        return Ok((path.to_path_buf(), true));
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok((PathBuf::from(env_path), true));
    }
    Ok((PathBuf::from(DEFAULT_CONFIG_NAME), false))
}

/// Validates the resolved path against security limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    let text = path.to_string_lossy();
    if text.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    for component in path.components() {
        let value = component.as_os_str().to_string_lossy();
        if value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid("config path component too long".to_string()));
        }
    }
    Ok(())
}

/// Validates a path string against length constraints.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    let path = Path::new(trimmed);
    for component in path.components() {
        let component_value = component.as_os_str().to_string_lossy();
        if component_value.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(ConfigError::Invalid(format!("{field} path component too long")));
        }
    }
    Ok(())
}

/// Default server bind address.
fn default_bind() -> String {
    DEFAULT_BIND.to_string()
}

/// Default maximum request body size.
const fn default_max_body_bytes() -> usize {
    DEFAULT_MAX_BODY_BYTES
}

/// Default backend base URL.
fn default_backend_base_url() -> String {
    DEFAULT_BACKEND_BASE_URL.to_string()
}

/// Default backend chat completions path.
fn default_backend_chat_path() -> String {
    DEFAULT_BACKEND_CHAT_PATH.to_string()
}

/// Default backend model identifier.
fn default_backend_model() -> String {
    DEFAULT_BACKEND_MODEL.to_string()
}

/// Default output token budget.
const fn default_max_tokens() -> u32 {
    DEFAULT_MAX_TOKENS
}

/// Default sampling temperature.
const fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

/// Default backend request timeout.
const fn default_backend_timeout_ms() -> u64 {
    DEFAULT_BACKEND_TIMEOUT_MS
}

/// Default payload logging flag.
const fn default_log_payloads() -> bool {
    true
}
