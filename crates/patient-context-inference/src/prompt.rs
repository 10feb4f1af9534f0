// crates/patient-context-inference/src/prompt.rs
// ============================================================================
// Module: System Instruction
// Description: Build the fixed system instruction for summarization calls.
// Purpose: Bind the patient profile and the required output contract.
// Dependencies: std
// ============================================================================

//! ## Overview
//! Every inference call carries the same system instruction: the private
//! patient profile plus the structured output contract the model must follow.
//! The instruction is built once at startup and never changes per request.

/// Builds the system instruction embedding the given profile text.
#[must_use]
pub fn build_system_instruction(profile: &str) -> String {
    format!(
        "You are a personal medical context assistant running locally on the user's machine.\n\
         You know the following private long-term health background:\n\
         \n\
         {profile}\n\
         \n\
         When given the user's symptoms, respond with structured JSON:\n\
         \n\
         {{\n  \"relevant_background\": [\n      {{ \"fact\": \"string\" }},\n      ...\n  ],\n  \
         \"reasoning_for_relevancy\": \"short explanation\"\n}}\n\
         \n\
         Be concise and accurate.\n"
    )
}

// ============================================================================
// SECTION: Tests
// ============================================================================
