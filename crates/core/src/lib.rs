//! TaskPilot Core
//!
//! Foundational types shared by every crate of the TaskPilot command agent.
//! This crate has no knowledge of language-model providers or tools.
//!
//! ## Module Organization
//!
//! - `error` - Core error types (`CoreError`, `CoreResult`)
//! - `workflow` - Workflow modes and their pipeline columns
//! - `store` - Read contract of the external domain store
//! - `actions` - Typed `Action` union published for visible effects
//! - `bus` - In-process Action Event Bus
//! - `snapshot` - Immutable per-turn `ContextSnapshot`

pub mod actions;
pub mod bus;
pub mod error;
pub mod snapshot;
pub mod store;
pub mod workflow;

// ── Error Types ────────────────────────────────────────────────────────
pub use error::{CoreError, CoreResult};

// ── Actions & Bus ──────────────────────────────────────────────────────
pub use actions::{Action, ActionPayload, ActionSource, Theme, ToastLevel};
pub use bus::{ActionBus, ActionHandler, InProcessActionBus, Subscription, SubscriptionId};

// ── Domain State ───────────────────────────────────────────────────────
pub use snapshot::{ContextSnapshot, RecentAction, SelectionSummary, TaskCounts};
pub use store::{
    AuthInfo, DomainState, DomainStore, EmailRecord, IncidentRecord, ProjectRecord,
    SelectionIds, TaskPriority, TaskRecord,
};
pub use workflow::WorkflowMode;
