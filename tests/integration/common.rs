//! Test harness: agent + workspace + scripted providers + recorded actions.

use std::sync::{Arc, Mutex};

use taskpilot::models::settings::AgentSettings;
use taskpilot::storage::{KeyValueStore, MemoryKeyValueStore};
use taskpilot::{mount_bridge, CommandAgent, InMemoryWorkspace, SessionState};
use taskpilot_core::{Action, ActionBus, InProcessActionBus};
use taskpilot_llm::{ChatProvider, ProviderType, ScriptedProvider};

pub struct Harness {
    pub workspace: Arc<InMemoryWorkspace>,
    pub bus: Arc<InProcessActionBus>,
    pub storage: Arc<MemoryKeyValueStore>,
    pub provider: Arc<ScriptedProvider>,
    pub actions: Arc<Mutex<Vec<Action>>>,
    pub agent: CommandAgent,
}

pub fn test_settings() -> AgentSettings {
    AgentSettings {
        verifier_retry_delay_ms: 5,
        ..Default::default()
    }
}

impl Harness {
    /// Agent whose only configured provider is a scripted Anthropic one.
    pub fn new() -> Self {
        Self::with_parts(
            InMemoryWorkspace::seeded(),
            Arc::new(MemoryKeyValueStore::new()),
            ScriptedProvider::new(ProviderType::Anthropic),
        )
    }

    pub fn with_parts(
        workspace: InMemoryWorkspace,
        storage: Arc<MemoryKeyValueStore>,
        provider: ScriptedProvider,
    ) -> Self {
        let workspace = Arc::new(workspace);
        let bus = Arc::new(InProcessActionBus::new());
        mount_bridge(bus.as_ref(), workspace.clone());

        let actions = Arc::new(Mutex::new(Vec::new()));
        let recorded = actions.clone();
        bus.subscribe(Arc::new(move |action: &Action| {
            recorded.lock().unwrap().push(action.clone());
        }));

        let settings = test_settings();
        let kv: Arc<dyn KeyValueStore> = storage.clone();
        let session = Arc::new(SessionState::load(kv, settings.history_limit));
        let provider = Arc::new(provider);

        let mut agent = CommandAgent::new(
            settings,
            session,
            workspace.clone(),
            workspace.clone(),
            bus.clone(),
        );
        // Scripted stand-ins for every backend, so the environment never matters.
        for other in ProviderType::FALLBACK_ORDER {
            if other != provider.provider_type() {
                agent = agent.with_provider(Arc::new(ScriptedProvider::unconfigured(other)));
            }
        }
        let agent = agent.with_provider(provider.clone());

        Self {
            workspace,
            bus,
            storage,
            provider,
            actions,
            agent,
        }
    }

    pub fn action_types(&self) -> Vec<&'static str> {
        self.actions
            .lock()
            .unwrap()
            .iter()
            .map(|a| a.action_type())
            .collect()
    }
}
