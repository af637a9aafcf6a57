//! Recognized configuration options
//!
//! A single tunables struct with a `Default` impl — no config-file parsing
//! here, that belongs to the excluded CLI front-end.

/// All recognized configuration options for the memory engine.
#[derive(Debug, Clone, PartialEq)]
pub struct MemoryConfig {
    /// Target embedding dimension `D`. Provider vectors are padded or
    /// truncated to this length by the Dimension Normalizer (C6).
    pub dimension: usize,

    /// Context assembler token budget (C7/C8).
    pub max_tokens: usize,

    /// Context buffer freshness window, in milliseconds.
    pub max_time_window_ms: i64,

    /// Context buffer similarity filter, 0.0..=1.0.
    pub relevance_threshold: f32,

    /// Post-prune context buffer length.
    pub max_context_size: usize,

    /// Default retrieval cutoff on the 0..100 `adj_sim` scale.
    pub similarity_threshold_default: f32,

    /// Sliding window overlap ratio, 0.0..=0.5.
    pub overlap_ratio: f32,

    /// Characters-per-token heuristic.
    pub avg_token_len: usize,

    /// Floor on `window_size`'s clamp, in tokens. Not separately enumerated
    /// in §6's option list, but required by the Context Window Manager's
    /// `window_size` clamp (§4.7) — defaults to a fraction of `max_tokens`.
    pub min_window: usize,

    /// Ceiling on `window_size`'s clamp, in tokens. Defaults to
    /// `max_tokens`, since the overflow path (§4.8 step 5) only runs when
    /// the assembled context already exceeds that budget.
    pub max_window: usize,

    /// Embedding cache bounded capacity `M`.
    pub cache_max_size: usize,

    /// Embedding cache per-entry TTL `T`, in milliseconds.
    pub cache_ttl_ms: i64,

    /// Access-count threshold for short-term → long-term promotion.
    pub promotion_access_threshold: u64,

    /// Optional cap on summarized output length per bullet in the context
    /// assembler. `None` disables truncation.
    pub context_truncation_limit: Option<usize>,

    /// Temporal decay rate applied to `decay_factor`, per second.
    pub decay_rate: f64,

    /// Multiplier applied to `decay_factor` on a retrieval hit.
    pub promote_factor: f64,

    /// Multiplier applied to `decay_factor` on a retrieval miss.
    pub demote_factor: f64,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            dimension: 256,
            max_tokens: 8192,
            max_time_window_ms: 86_400_000,
            relevance_threshold: 0.0,
            max_context_size: 5,
            similarity_threshold_default: 40.0,
            overlap_ratio: 0.1,
            avg_token_len: 4,
            min_window: 256,
            max_window: 8192,
            cache_max_size: 1000,
            cache_ttl_ms: 3_600_000,
            promotion_access_threshold: 10,
            context_truncation_limit: None,
            decay_rate: 1e-4,
            promote_factor: 1.1,
            demote_factor: 0.9,
        }
    }
}
