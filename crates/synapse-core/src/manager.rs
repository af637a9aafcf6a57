//! Memory Manager Facade (C9)
//!
//! Wires the Memory Store (C4), Embedding Cache (C5), Dimension Normalizer
//! (C6), and Context Assembler (C8) behind a small operation surface. Generic
//! over the three external collaborators rather than boxing them — callers
//! monomorphize over their concrete provider/storage/template implementations.

use std::sync::Arc;

use parking_lot::Mutex;

use crate::config::MemoryConfig;
use crate::context::{ContextAssembler, ContextOptions};
use crate::embeddings::{CacheKey, CacheSweeper, EmbeddingCache};
use crate::error::Result;
use crate::memory::{Interaction, MemoryStore, RetrievedInteraction};
use crate::providers::{ChatProvider, PromptTemplates, StoreSnapshot, Storage};

/// Facade wiring C4+C5+C6+C8 behind `add`/`retrieve`/`generate_response`.
pub struct MemoryManager<P, S, T>
where
    P: ChatProvider,
    S: Storage,
    T: PromptTemplates,
{
    config: MemoryConfig,
    store: MemoryStore,
    cache: Arc<Mutex<EmbeddingCache>>,
    sweeper: Option<CacheSweeper>,
    assembler: ContextAssembler,
    provider: P,
    storage: S,
    templates: T,
}

impl<P, S, T> MemoryManager<P, S, T>
where
    P: ChatProvider,
    S: Storage,
    T: PromptTemplates,
{
    /// Load persisted tiers, rebuild the in-memory indexes, and start the
    /// background cache sweep task.
    pub async fn init(config: MemoryConfig, provider: P, storage: S, templates: T) -> Result<Self> {
        let (short_term, long_term) = storage.load_history().await?;
        let store = MemoryStore::load(&config, short_term, long_term)?;
        let cache = Arc::new(Mutex::new(EmbeddingCache::new(config.cache_max_size, config.cache_ttl_ms)));
        let sweeper = Some(CacheSweeper::spawn(cache.clone(), config.cache_ttl_ms));

        Ok(Self {
            config,
            store,
            cache,
            sweeper,
            assembler: ContextAssembler::new(),
            provider,
            storage,
            templates,
        })
    }

    /// `embed(text) → vec` via cache + provider + normalizer.
    pub async fn embed(&self, model: &str, text: &str) -> Result<Vec<f32>> {
        let key = CacheKey::new(model, text);
        if let Some(cached) = self.cache.lock().get(&key) {
            return Ok(crate::embeddings::normalize_dimension(&cached, self.config.dimension)?);
        }

        let raw = self.provider.embed(model, text).await?;
        self.cache.lock().put(key, raw.clone());
        Ok(crate::embeddings::normalize_dimension(&raw, self.config.dimension)?)
    }

    /// `extract_concepts(text) → list<string>`: delegates to the chat
    /// provider via a prompt template, parses the first `[...]` JSON array
    /// in the response, and swallows any failure as an empty list —
    /// concept extraction is best-effort and never fails the caller.
    pub async fn extract_concepts(&self, model: &str, text: &str) -> Vec<String> {
        let prompt = self.templates.concept_prompt(model, text);
        let response = match self.provider.completion(model, &prompt, &serde_json::Value::Null).await {
            Ok(response) => response,
            Err(err) => {
                tracing::warn!(%err, "concept extraction provider call failed, using empty concept list");
                return Vec::new();
            }
        };
        match parse_concept_array(&response) {
            Some(concepts) => concepts,
            None => {
                tracing::warn!("could not locate a JSON array in concept-extraction response, using empty concept list");
                Vec::new()
            }
        }
    }

    /// `add(prompt, output, embedding, concepts)`: embeds, extracts
    /// concepts, ingests into the store, and persists — rolling back the
    /// in-memory mutation if persistence fails.
    pub async fn add(&mut self, model: &str, prompt: &str, output: &str) -> Result<()> {
        let embedding = self.embed(model, output).await?;
        let concepts = self.extract_concepts(model, output).await;
        let interaction = Interaction::new(prompt, output, embedding, concepts);

        let token = self.store.add_interaction(interaction)?;
        let snapshot = self.snapshot();
        if let Err(err) = self.storage.save(&snapshot).await {
            tracing::error!(%err, "persistence failed, rolling back ingestion");
            self.store.rollback_last_ingestion(token);
            return Err(err.into());
        }
        Ok(())
    }

    /// `retrieve(query, threshold, exclude_last_n)` → `embed` +
    /// `extract_concepts` + `MemoryStore::retrieve`. `similarity_threshold`
    /// of `None` falls back to `config.similarity_threshold_default`, the
    /// §6 recognized option a caller would otherwise have to re-specify on
    /// every call.
    pub async fn retrieve(
        &mut self,
        model: &str,
        query: &str,
        similarity_threshold: Option<f32>,
        exclude_last_n: usize,
    ) -> Result<Vec<RetrievedInteraction>> {
        let threshold = similarity_threshold.unwrap_or(self.config.similarity_threshold_default);
        let query_vec = self.embed(model, query).await?;
        let query_concepts = self.extract_concepts(model, query).await;
        Ok(self.store.retrieve(&query_vec, &query_concepts, threshold, exclude_last_n))
    }

    /// `generate_response(prompt, recent, retrievals)` → `build_context`
    /// then delegate to the chat provider. Context options are derived from
    /// `config` via [`ContextOptions::from_config`] — `system_context` is
    /// the only piece of `ContextOptions` that isn't itself a config value,
    /// so it's the only thing the caller supplies directly.
    pub async fn generate_response(
        &mut self,
        model: &str,
        prompt: &str,
        recent: &[Interaction],
        retrievals: &[(Interaction, f32)],
        system_context: Option<&str>,
    ) -> Result<String> {
        let options = ContextOptions::from_config(&self.config, system_context.map(str::to_string));
        let context = self.assembler.build_context(retrievals, recent, &options);
        let messages = self.templates.chat_prompt(model, options.system_context.as_deref(), &context, prompt);
        let response = self.provider.chat(model, &messages, &serde_json::Value::Null).await?;
        Ok(response)
    }

    /// Promote eligible short-term records to long-term. Not run
    /// automatically on every retrieval.
    pub fn classify(&mut self) {
        self.store.classify();
    }

    /// `dispose()` → flush persistence, stop the cache sweep, release the
    /// storage backend. Cancels the sweep task and joins it before closing
    /// storage.
    pub async fn dispose(mut self) -> Result<()> {
        let snapshot = self.snapshot();
        self.storage.save(&snapshot).await?;
        if let Some(sweeper) = self.sweeper.take() {
            sweeper.stop().await;
        }
        self.storage.close().await?;
        Ok(())
    }

    fn snapshot(&self) -> StoreSnapshot {
        StoreSnapshot {
            short_term: self.store.short_term().to_vec(),
            long_term: self.store.long_term().to_vec(),
        }
    }
}

/// Locate the first `[` in `response` and its matching `]` (tracking
/// nesting depth so an array-of-arrays response still parses), then decode
/// that slice as a JSON string array. Any failure along the way — no `[`,
/// no matching `]`, or invalid JSON — yields `None`, which callers turn
/// into an empty concept list. Tolerates a model wrapping the array in
/// prose.
fn parse_concept_array(response: &str) -> Option<Vec<String>> {
    let start = response.find('[')?;
    let mut depth = 0i32;
    let mut end = None;
    for (offset, ch) in response[start..].char_indices() {
        match ch {
            '[' => depth += 1,
            ']' => {
                depth -= 1;
                if depth == 0 {
                    end = Some(start + offset);
                    break;
                }
            }
            _ => {}
        }
    }
    let end = end?;
    serde_json::from_str(&response[start..=end]).ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{ChatMessage, ProviderError, ProviderOptions};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct StubProvider {
        embed_calls: AtomicUsize,
        concept_response: String,
    }

    #[async_trait]
    impl ChatProvider for StubProvider {
        async fn chat(&self, _model: &str, _messages: &[ChatMessage], _options: &ProviderOptions) -> std::result::Result<String, ProviderError> {
            Ok("stub response".to_string())
        }

        async fn completion(&self, _model: &str, _prompt: &str, _options: &ProviderOptions) -> std::result::Result<String, ProviderError> {
            Ok(self.concept_response.clone())
        }

        async fn embed(&self, _model: &str, text: &str) -> std::result::Result<Vec<f32>, ProviderError> {
            self.embed_calls.fetch_add(1, Ordering::SeqCst);
            Ok(vec![text.len() as f32, 0.0, 0.0, 0.0])
        }
    }

    struct StubStorage;

    #[async_trait]
    impl Storage for StubStorage {
        async fn load_history(&self) -> std::result::Result<(Vec<Interaction>, Vec<Interaction>), ProviderError> {
            Ok((Vec::new(), Vec::new()))
        }

        async fn save(&self, _snapshot: &StoreSnapshot) -> std::result::Result<(), ProviderError> {
            Ok(())
        }

        async fn close(&self) -> std::result::Result<(), ProviderError> {
            Ok(())
        }
    }

    struct FailingStorage;

    #[async_trait]
    impl Storage for FailingStorage {
        async fn load_history(&self) -> std::result::Result<(Vec<Interaction>, Vec<Interaction>), ProviderError> {
            Ok((Vec::new(), Vec::new()))
        }

        async fn save(&self, _snapshot: &StoreSnapshot) -> std::result::Result<(), ProviderError> {
            Err(ProviderError::Storage("disk full".to_string()))
        }

        async fn close(&self) -> std::result::Result<(), ProviderError> {
            Ok(())
        }
    }

    struct StubTemplates;

    impl PromptTemplates for StubTemplates {
        fn concept_prompt(&self, _model: &str, text: &str) -> String {
            format!("extract concepts from: {text}")
        }

        fn chat_prompt(&self, _model: &str, _system: Option<&str>, context: &str, user_query: &str) -> Vec<ChatMessage> {
            vec![ChatMessage::system(context), ChatMessage::user(user_query)]
        }
    }

    fn test_config() -> MemoryConfig {
        MemoryConfig { dimension: 4, ..MemoryConfig::default() }
    }

    #[tokio::test]
    async fn add_then_retrieve_round_trips() {
        let provider = StubProvider { embed_calls: AtomicUsize::new(0), concept_response: "[\"ai\", \"ml\"]".to_string() };
        let mut manager = MemoryManager::init(test_config(), provider, StubStorage, StubTemplates).await.unwrap();

        manager.add("test-model", "hello", "world").await.unwrap();
        let results = manager.retrieve("test-model", "world", Some(0.0), 0).await.unwrap();
        assert!(!results.is_empty());
    }

    #[tokio::test]
    async fn retrieve_with_no_override_falls_back_to_configured_default_threshold() {
        let provider = StubProvider { embed_calls: AtomicUsize::new(0), concept_response: "[\"ai\"]".to_string() };
        let config = MemoryConfig { dimension: 4, similarity_threshold_default: 1000.0, ..MemoryConfig::default() };
        let mut manager = MemoryManager::init(config, provider, StubStorage, StubTemplates).await.unwrap();

        manager.add("test-model", "hello", "world").await.unwrap();
        // N=1 short-term record, so cluster fallback also contributes
        // nothing (K<2) — an unreachably high default threshold must yield
        // a fully empty result, not just a sparse one.
        let results = manager.retrieve("test-model", "world", None, 0).await.unwrap();
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn add_rolls_back_in_memory_state_on_persistence_failure() {
        let provider = StubProvider { embed_calls: AtomicUsize::new(0), concept_response: "[\"ai\"]".to_string() };
        let mut manager = MemoryManager::init(test_config(), provider, FailingStorage, StubTemplates).await.unwrap();

        let result = manager.add("test-model", "hello", "world").await;
        assert!(result.is_err());
        assert_eq!(manager.store.short_term().len(), 0);
    }

    #[tokio::test]
    async fn malformed_concept_response_yields_empty_list() {
        let provider = StubProvider { embed_calls: AtomicUsize::new(0), concept_response: "not json at all".to_string() };
        let manager = MemoryManager::init(test_config(), provider, StubStorage, StubTemplates).await.unwrap();

        let concepts = manager.extract_concepts("test-model", "anything").await;
        assert!(concepts.is_empty());
    }

    #[test]
    fn parse_concept_array_handles_prose_wrapping() {
        let response = "Sure, here are the concepts: [\"ai\", \"ml\"] — hope that helps!";
        assert_eq!(parse_concept_array(response), Some(vec!["ai".to_string(), "ml".to_string()]));
    }

    #[test]
    fn parse_concept_array_none_on_missing_bracket() {
        assert_eq!(parse_concept_array("no brackets here"), None);
    }
}
