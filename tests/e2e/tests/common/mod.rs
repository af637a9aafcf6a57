//! Shared collaborator doubles for the end-to-end journeys.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use synapse_core::providers::{
    ChatMessage, ChatProvider, ProviderError, ProviderOptions, Storage, StoreSnapshot,
};
use synapse_core::Interaction;

/// Deterministic fake provider: embeds text as a length-derived vector so
/// identical text always produces identical (and comparable) embeddings,
/// and returns a fixed concept list for every completion call.
pub struct FakeProvider {
    pub concept_response: String,
}

#[async_trait]
impl ChatProvider for FakeProvider {
    async fn chat(&self, _model: &str, messages: &[ChatMessage], _options: &ProviderOptions) -> Result<String, ProviderError> {
        Ok(format!("assistant reply to: {}", messages.last().map(|m| m.content.as_str()).unwrap_or("")))
    }

    async fn completion(&self, _model: &str, _prompt: &str, _options: &ProviderOptions) -> Result<String, ProviderError> {
        Ok(self.concept_response.clone())
    }

    async fn embed(&self, _model: &str, text: &str) -> Result<Vec<f32>, ProviderError> {
        let mut vector = vec![0.0f32; 4];
        for (i, byte) in text.bytes().enumerate() {
            vector[i % 4] += byte as f32;
        }
        Ok(vector)
    }
}

/// In-memory `Storage` double. `fail_next_save` flips one `save` call to
/// an error, used to exercise the ingestion rollback path.
pub struct InMemoryStorage {
    pub fail_next_save: AtomicBool,
    pub last_snapshot: Mutex<Option<StoreSnapshot>>,
}

impl InMemoryStorage {
    pub fn new() -> Self {
        Self { fail_next_save: AtomicBool::new(false), last_snapshot: Mutex::new(None) }
    }
}

#[async_trait]
impl Storage for InMemoryStorage {
    async fn load_history(&self) -> Result<(Vec<Interaction>, Vec<Interaction>), ProviderError> {
        Ok((Vec::new(), Vec::new()))
    }

    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ProviderError> {
        if self.fail_next_save.swap(false, Ordering::SeqCst) {
            return Err(ProviderError::Storage("simulated disk failure".to_string()));
        }
        *self.last_snapshot.lock().unwrap() = Some(snapshot.clone());
        Ok(())
    }

    async fn close(&self) -> Result<(), ProviderError> {
        Ok(())
    }
}

pub struct FakeTemplates;

impl synapse_core::providers::PromptTemplates for FakeTemplates {
    fn concept_prompt(&self, _model: &str, text: &str) -> String {
        format!("extract concepts: {text}")
    }

    fn chat_prompt(&self, _model: &str, system: Option<&str>, context: &str, user_query: &str) -> Vec<ChatMessage> {
        let mut messages = Vec::new();
        if let Some(system) = system {
            messages.push(ChatMessage::system(system));
        }
        messages.push(ChatMessage::system(context));
        messages.push(ChatMessage::user(user_query));
        messages
    }
}
