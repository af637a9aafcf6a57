//! Embedding Service contract: caching (C5) and dimension normalization (C6).
//!
//! Actual embedding *generation* is an external collaborator
//! ([`crate::providers::ChatProvider::embed`]) — concrete embedding
//! providers are out of scope here. This module only covers what the core
//! owns: normalizing whatever the provider returns to the configured
//! dimension, and caching by `(model, text-prefix)` so repeated queries
//! don't re-embed.

mod cache;
mod normalize;

pub use cache::{CacheKey, CacheSweeper, EmbeddingCache, CACHE_KEY_PREFIX_LEN};
pub use normalize::{normalize_dimension, EmbeddingError};
