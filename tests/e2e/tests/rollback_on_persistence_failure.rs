//! Ingestion must roll back the in-memory mutation if persistence fails.

mod common;

use std::sync::atomic::Ordering;

use common::{FakeProvider, FakeTemplates, InMemoryStorage};
use synapse_core::{MemoryConfig, MemoryManager};

fn test_config() -> MemoryConfig {
    MemoryConfig { dimension: 4, ..MemoryConfig::default() }
}

#[tokio::test]
async fn failed_save_rolls_back_ingestion_but_recovers_on_next_call() {
    let provider = FakeProvider { concept_response: "[\"ai\"]".to_string() };
    let storage = InMemoryStorage::new();
    storage.fail_next_save.store(true, Ordering::SeqCst);
    let mut manager = MemoryManager::init(test_config(), provider, storage, FakeTemplates).await.unwrap();

    let result = manager.add("chat-model", "prompt one", "output one").await;
    assert!(result.is_err());

    let retrievals = manager.retrieve("chat-model", "output one", Some(0.0), 0).await.unwrap();
    assert!(retrievals.is_empty(), "rolled-back interaction must not be retrievable");

    // A subsequent call with no injected failure succeeds normally.
    manager.add("chat-model", "prompt two", "output two").await.unwrap();
    let retrievals = manager.retrieve("chat-model", "output two", Some(0.0), 0).await.unwrap();
    assert!(!retrievals.is_empty());
}
