//! End-to-end journey: ingest a handful of interactions through the facade,
//! then retrieve and assemble a response context from them.

mod common;

use common::{FakeProvider, FakeTemplates, InMemoryStorage};
use synapse_core::{MemoryConfig, MemoryManager};

fn test_config() -> MemoryConfig {
    MemoryConfig { dimension: 4, similarity_threshold_default: 0.0, ..MemoryConfig::default() }
}

#[tokio::test]
async fn ingest_then_retrieve_then_assemble_context() {
    let provider = FakeProvider { concept_response: "[\"rust\", \"memory\"]".to_string() };
    let storage = InMemoryStorage::new();
    let mut manager = MemoryManager::init(test_config(), provider, storage, FakeTemplates).await.unwrap();

    manager.add("chat-model", "what is ownership?", "ownership tracks who frees memory").await.unwrap();
    manager.add("chat-model", "what is borrowing?", "borrowing lets you read without owning").await.unwrap();

    // No override: falls back to config.similarity_threshold_default (0.0 here).
    let retrievals = manager
        .retrieve("chat-model", "tell me about ownership", None, 0)
        .await
        .unwrap();
    assert!(!retrievals.is_empty());

    let pairs: Vec<(synapse_core::Interaction, f32)> =
        retrievals.iter().map(|r| (r.interaction.clone(), r.similarity)).collect();

    let response = manager
        .generate_response(
            "chat-model",
            "tell me about ownership",
            &[],
            &pairs,
            Some("you are a terse assistant"),
        )
        .await
        .unwrap();
    assert!(response.contains("assistant reply to"));

    manager.dispose().await.unwrap();
}
