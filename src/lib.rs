//! TaskPilot - AI command agent
//!
//! Turns natural-language commands into tool calls against a
//! project-management workspace. The library holds the orchestration side:
//! - Context Builder and Prompt Compiler
//! - Orchestration Loop (`CommandAgent`)
//! - Session State and its persistence
//! - UI bridge contract and an in-memory reference workspace
//!
//! Provider adapters live in `taskpilot-llm`, tool routing, logging and
//! verification in `taskpilot-tools`, shared types in `taskpilot-core`.

pub mod models;
pub mod services;
pub mod state;
pub mod storage;
pub mod utils;

pub use models::command::{CommandError, CommandResult, ErrorCategory};
pub use models::settings::{AgentSettings, SettingsUpdate};
pub use services::agent::CommandAgent;
pub use services::bridge::{mount_bridge, UiEffects};
pub use services::session::SessionState;
pub use services::workspace::InMemoryWorkspace;
pub use state::AppState;
pub use utils::error::{AppError, AppResult};
