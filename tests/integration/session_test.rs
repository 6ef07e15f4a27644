//! Session State Integration Tests
//!
//! Session state written by one agent is visible to the next one built on
//! the same storage file.

use std::sync::Arc;

use taskpilot::services::session::SESSION_KEY;
use taskpilot::storage::{JsonFileStore, KeyValueStore};
use taskpilot::{AppState, InMemoryWorkspace, SessionState};
use taskpilot_llm::ProviderType;
use tempfile::tempdir;

#[test]
fn test_session_survives_restart_on_disk() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");

    {
        let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&path).unwrap());
        let session = SessionState::load(store, 50);
        session.set_active_provider(Some(ProviderType::Glm));
        session.remember("sprint", "42");
    }

    let store: Arc<dyn KeyValueStore> = Arc::new(JsonFileStore::open(&path).unwrap());
    let session = SessionState::load(store, 50);
    assert_eq!(session.active_provider(), Some(ProviderType::Glm));
    assert_eq!(session.memory()["sprint"], "42");
    assert!(!session.is_processing());
}

#[test]
fn test_corrupt_session_payload_starts_fresh() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("storage.json");
    let store = Arc::new(JsonFileStore::open(&path).unwrap());
    store.set(SESSION_KEY, "not json").unwrap();

    let session = SessionState::load(store, 50);
    assert_eq!(session.active_provider(), None);
    assert!(session.history().is_empty());
}

#[tokio::test]
async fn test_app_state_wires_session_from_storage() {
    let dir = tempdir().unwrap();
    let config = dir.path().join("config.json");
    let storage = dir.path().join("storage.json");

    {
        let state = AppState::open(&config, &storage, Arc::new(InMemoryWorkspace::seeded())).unwrap();
        state.session().set_active_provider(Some(ProviderType::OpenAI));
    }

    let state = AppState::open(&config, &storage, Arc::new(InMemoryWorkspace::seeded())).unwrap();
    assert_eq!(state.session().active_provider(), Some(ProviderType::OpenAI));
    assert!(state.bridge_mounted());
}
