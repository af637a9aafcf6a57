//! The atomic memory record.

use std::collections::BTreeSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One prompt/response pair plus its embedding, concepts, and retrieval
/// bookkeeping.
///
/// Invariants: `embedding.len() == D` once normalized, `decay_factor > 0.0`,
/// `access_count` never decreases, `id` unique across the store that holds
/// it.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Interaction {
    /// Globally unique opaque identifier.
    pub id: Uuid,
    /// User-visible prompt text.
    pub prompt: String,
    /// User-visible response text.
    pub output: String,
    /// Dense embedding, exactly `D` floats after normalization.
    pub embedding: Vec<f32>,
    /// Concepts extracted from this interaction. No duplicates; case is
    /// preserved (a `BTreeSet` gives deterministic iteration/serialization
    /// order without lowercasing).
    pub concepts: BTreeSet<String>,
    /// Wall-clock instant of last relevance reinforcement.
    pub timestamp: DateTime<Utc>,
    /// Monotonic count of retrieval hits.
    pub access_count: u64,
    /// Per-interaction salience multiplier; grows on hits, shrinks on misses.
    pub decay_factor: f64,
}

impl Interaction {
    /// Construct a new interaction with fresh bookkeeping: `access_count =
    /// 0`, `decay_factor = 1.0`, `timestamp = now`.
    pub fn new(
        prompt: impl Into<String>,
        output: impl Into<String>,
        embedding: Vec<f32>,
        concepts: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            prompt: prompt.into(),
            output: output.into(),
            embedding,
            concepts: concepts.into_iter().collect(),
            timestamp: Utc::now(),
            access_count: 0,
            decay_factor: 1.0,
        }
    }

    /// Primary concept for context-assembler grouping: the
    /// lexicographically-first concept if present, else `"general"`.
    /// `BTreeSet` iteration order makes "first" well-defined without an
    /// arbitrary insertion-order dependency.
    pub fn primary_concept(&self) -> &str {
        self.concepts.iter().next().map(|s| s.as_str()).unwrap_or("general")
    }
}
