//! External collaborator contracts
//!
//! These traits are the crate's only window onto the outside world: a
//! concrete LLM provider, a storage backend, and a prompt-template library
//! are all out of scope and are expressed here as abstract, `async`-capable
//! interfaces the facade (C9) is generic over. Every method is a blocking
//! suspension point, so the traits are `#[async_trait]` — the same crate
//! the rest of the retrieved pack reaches for at this seam (`openpawz-core`,
//! `pawz-code`).

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::memory::Interaction;

/// One message in a chat-style conversation, as handed to [`ChatProvider::chat`].
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: String,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: "system".to_string(), content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: "user".to_string(), content: content.into() }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self { role: "assistant".to_string(), content: content.into() }
    }
}

/// Free-form per-call options (temperature, max tokens, ...). Left opaque —
/// concrete providers interpret the keys they understand and ignore the rest.
pub type ProviderOptions = serde_json::Value;

/// Failure from any external collaborator call.
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum ProviderError {
    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("config error: {0}")]
    Config(String),
}

/// Abstract LLM provider: chat, completion, and raw embedding generation.
///
/// The core never talks to a concrete vendor API; callers inject an
/// implementation (OpenAI, Anthropic, a local model server, a test double).
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Multi-turn chat completion.
    async fn chat(
        &self,
        model: &str,
        messages: &[ChatMessage],
        options: &ProviderOptions,
    ) -> Result<String, ProviderError>;

    /// Single-turn text completion.
    async fn completion(
        &self,
        model: &str,
        prompt: &str,
        options: &ProviderOptions,
    ) -> Result<String, ProviderError>;

    /// Raw embedding generation in the provider's native dimension (which
    /// may differ from the store's configured `D` — the Dimension
    /// Normalizer, C6, reconciles that before ingestion).
    async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>, ProviderError>;
}

/// A snapshot of the full store, as persisted by [`Storage::save`] and
/// returned by [`Storage::load_history`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StoreSnapshot {
    pub short_term: Vec<Interaction>,
    pub long_term: Vec<Interaction>,
}

/// Opaque persistence collaborator.
///
/// The core consumes this interface but defines no log format or durability
/// guarantee of its own.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Load the short-term and long-term tiers at startup.
    async fn load_history(&self) -> Result<(Vec<Interaction>, Vec<Interaction>), ProviderError>;

    /// Persist a full store snapshot.
    async fn save(&self, snapshot: &StoreSnapshot) -> Result<(), ProviderError>;

    /// Release any resources (connections, file handles) held by the backend.
    async fn close(&self) -> Result<(), ProviderError>;
}

/// Optional transactional extension for backends that support it.
#[async_trait]
pub trait TransactionalStorage: Storage {
    async fn begin_tx(&self) -> Result<(), ProviderError>;
    async fn commit(&self) -> Result<(), ProviderError>;
    async fn rollback(&self) -> Result<(), ProviderError>;
}

/// Prompt-template library contract.
///
/// Pure text assembly — never `async`, since it never leaves the process.
pub trait PromptTemplates: Send + Sync {
    /// Build the payload sent to [`ChatProvider::completion`]/`chat` to
    /// extract concepts from `text`. The response is expected to contain a
    /// `[...]` JSON array (see `manager::extract_concepts`).
    fn concept_prompt(&self, model: &str, text: &str) -> String;

    /// Build the message list sent to [`ChatProvider::chat`] for response
    /// generation given assembled context.
    fn chat_prompt(
        &self,
        model: &str,
        system: Option<&str>,
        context: &str,
        user_query: &str,
    ) -> Vec<ChatMessage>;
}
