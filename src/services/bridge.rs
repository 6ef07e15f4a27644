//! UI Bridge
//!
//! The only place visible effects happen. A bridge subscribes to the
//! Action Event Bus and forwards each action to a [`UiEffects`] host.
//! Handlers run synchronously on the publisher's call stack and must not
//! call back into the agent.

use std::sync::Arc;

use taskpilot_core::{
    Action, ActionBus, ActionPayload, Subscription, Theme, ToastLevel, WorkflowMode,
};

/// Visible effects a host interface can perform.
pub trait UiEffects: Send + Sync {
    fn navigate(&self, page: &str);
    fn go_back(&self);
    fn set_terminal_visible(&self, visible: bool);
    fn switch_workflow(&self, mode: WorkflowMode);
    fn set_theme(&self, theme: Theme);
    fn highlight_task(&self, task_id: &str);
    fn show_toast(&self, message: &str, level: ToastLevel);
}

/// Apply one action to `effects`.
pub fn apply_action(effects: &dyn UiEffects, action: &Action) {
    match &action.payload {
        ActionPayload::Navigate { page } => effects.navigate(page),
        ActionPayload::GoBack => effects.go_back(),
        ActionPayload::OpenTerminal => effects.set_terminal_visible(true),
        ActionPayload::CloseTerminal => effects.set_terminal_visible(false),
        ActionPayload::ChangeWorkflowMode { mode } => effects.switch_workflow(*mode),
        ActionPayload::SetTheme { theme } => effects.set_theme(*theme),
        ActionPayload::HighlightTask { task_id } => effects.highlight_task(task_id),
        ActionPayload::ShowToast { message, level } => effects.show_toast(message, *level),
    }
}

/// Subscribe `effects` to every action published on `bus`.
pub fn mount_bridge(bus: &dyn ActionBus, effects: Arc<dyn UiEffects>) -> Subscription {
    let subscription = bus.subscribe(Arc::new(move |action: &Action| {
        tracing::debug!(action = action.action_type(), source = %action.source, "bridge applying action");
        apply_action(effects.as_ref(), action);
    }));
    tracing::info!(subscription = ?subscription.id(), "ui bridge mounted");
    subscription
}
