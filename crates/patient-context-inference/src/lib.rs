// crates/patient-context-inference/src/lib.rs
// ============================================================================
// Module: Patient Context Inference Library
// Description: Local inference client and response sanitation.
// Purpose: Turn free-form backend output into structured context summaries.
// Dependencies: reqwest, serde_json
// ============================================================================

//! ## Overview
//! `patient-context-inference` issues blocking chat-completions calls against
//! a locally reachable text-generation backend and parses the model's output
//! into structured JSON. Backend output is untrusted: presentation wrapping is
//! stripped and the remainder must parse as JSON, nothing more is guaranteed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod client;
pub mod prompt;
pub mod sanitize;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use client::InferenceClient;
pub use client::InferenceConfig;
pub use client::InferenceError;
pub use prompt::build_system_instruction;
pub use sanitize::SanitizeError;
pub use sanitize::sanitize_and_parse;
