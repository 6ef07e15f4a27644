//! TaskPilot Tools
//!
//! Everything between a model's tool call and its effect:
//! - `catalog` - process-static tool definitions and per-mode validity
//! - `control` - internal UI-control tools mapped to typed actions
//! - `registry` - contract of the external Tool Registry
//! - `executor` - routing, validation, logging and verification
//! - `action_log` - capped audit ring buffer
//! - `verifier` - post-condition checks for sensitive tools

pub mod action_log;
pub mod catalog;
pub mod control;
pub mod error;
pub mod executor;
pub mod registry;
pub mod verifier;

pub use action_log::{ActionLogEntry, ActionLogger, DEFAULT_LOG_CAPACITY, INTERNAL_ERROR_ACTION};
pub use catalog::{catalog, RestrictedTool, ToolAvailability};
pub use control::{is_control_tool, CONTROL_TOOLS, KNOWN_PAGES};
pub use error::ToolError;
pub use executor::{ExecutionScope, ScopedExecutor, ToolExecutor};
pub use registry::{ToolOutcome, ToolRegistry};
pub use verifier::{FieldMismatch, VerificationOutcome, Verifier, VerifierConfig};
