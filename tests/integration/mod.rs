//! Integration Tests Module
//!
//! End-to-end tests of the command agent against the in-memory workspace
//! and a scripted provider: the orchestration loop, control tools and the
//! action bus, verification, the action log, and session persistence.

// Shared harness
mod common;

// Orchestration loop scenarios
mod agent_loop_test;

// Post-condition verification scenarios
mod verification_test;

// Action log capacity and persistence
mod action_log_test;

// Session state across restarts
mod session_test;

// Prompt compilation from a live workspace
mod prompt_test;
