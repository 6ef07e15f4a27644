//! Application State
//!
//! Wires the agent for a running process: settings, storage, the
//! workspace, the action bus with its UI bridge, and the command agent.

use std::path::PathBuf;
use std::sync::Arc;

use taskpilot_core::{ActionBus, InProcessActionBus, Subscription, SubscriptionId};
use tokio::sync::RwLock;

use crate::models::settings::{AgentSettings, SettingsUpdate};
use crate::services::agent::CommandAgent;
use crate::services::bridge::mount_bridge;
use crate::services::session::SessionState;
use crate::services::workspace::InMemoryWorkspace;
use crate::storage::{ConfigService, JsonFileStore, KeyValueStore};
use crate::utils::error::AppResult;

pub struct AppState {
    config: RwLock<ConfigService>,
    workspace: Arc<InMemoryWorkspace>,
    bus: Arc<InProcessActionBus>,
    agent: Arc<CommandAgent>,
    bridge: Subscription,
}

impl AppState {
    /// Initialize from the default locations under ~/.taskpilot with the
    /// demo workspace.
    pub fn initialize() -> AppResult<Self> {
        let config = ConfigService::new()?;
        let storage = Arc::new(JsonFileStore::new()?);
        Ok(Self::assemble(config, storage, Arc::new(InMemoryWorkspace::seeded())))
    }

    /// Initialize from explicit config and storage files.
    pub fn open(
        config_path: impl Into<PathBuf>,
        storage_path: impl Into<PathBuf>,
        workspace: Arc<InMemoryWorkspace>,
    ) -> AppResult<Self> {
        let config = ConfigService::open(config_path)?;
        let storage = Arc::new(JsonFileStore::open(storage_path)?);
        Ok(Self::assemble(config, storage, workspace))
    }

    /// Wire every service. The bridge is mounted before the agent exists so
    /// no action is published without a subscriber.
    pub fn assemble(
        config: ConfigService,
        storage: Arc<dyn KeyValueStore>,
        workspace: Arc<InMemoryWorkspace>,
    ) -> Self {
        let settings = config.get_config().clone();
        let bus = Arc::new(InProcessActionBus::new());
        let bridge = mount_bridge(bus.as_ref(), workspace.clone());

        let session = Arc::new(SessionState::load(storage, settings.history_limit));
        let agent = CommandAgent::new(
            settings,
            session,
            workspace.clone(),
            workspace.clone(),
            bus.clone(),
        );

        Self {
            config: RwLock::new(config),
            workspace,
            bus,
            agent: Arc::new(agent),
            bridge,
        }
    }

    pub fn agent(&self) -> &Arc<CommandAgent> {
        &self.agent
    }

    pub fn workspace(&self) -> &Arc<InMemoryWorkspace> {
        &self.workspace
    }

    pub fn bus(&self) -> &Arc<InProcessActionBus> {
        &self.bus
    }

    pub fn session(&self) -> &Arc<SessionState> {
        self.agent.session()
    }

    pub fn bridge_id(&self) -> SubscriptionId {
        self.bridge.id()
    }

    pub fn bridge_mounted(&self) -> bool {
        self.bus.subscriber_count() > 0
    }

    /// Get the current configuration
    pub async fn get_config(&self) -> AgentSettings {
        self.config.read().await.get_config().clone()
    }

    /// Update and save the configuration. The running agent keeps the
    /// settings it was built with; changes apply on the next start.
    pub async fn update_config(&self, update: SettingsUpdate) -> AppResult<AgentSettings> {
        self.config.write().await.update_config(update)
    }

    pub async fn is_config_healthy(&self) -> bool {
        self.config.read().await.is_healthy()
    }
}
