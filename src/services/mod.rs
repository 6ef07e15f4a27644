//! Services
//!
//! Agent-side business logic, leaves first: context and prompt, session,
//! bridge, reference workspace, and the orchestration loop on top.

pub mod agent;
pub mod bridge;
pub mod context_builder;
pub mod prompt;
pub mod session;
pub mod workspace;
