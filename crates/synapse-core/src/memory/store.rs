//! Memory Store (C4) — the retrieval pipeline.
//!
//! Owns the vector index (C1), concept graph (C2), cluster map (C3), and the
//! short-/long-term interaction tiers. This is the only component that
//! mutates all four together, and the only place ingestion rollback is
//! implemented.

use std::collections::HashSet;

use chrono::Utc;

#[cfg(feature = "cluster-fallback")]
use crate::cluster::{ClusterError, ClusterMap};
use crate::config::MemoryConfig;
use crate::graph::{ConceptGraph, GraphUpdateToken};
use crate::vector::{cosine_similarity, l2_normalize, VectorIndex, VectorIndexError};

use super::interaction::Interaction;

#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryStoreError {
    #[error(transparent)]
    Vector(#[from] VectorIndexError),

    #[cfg(feature = "cluster-fallback")]
    #[error(transparent)]
    Cluster(#[from] ClusterError),
}

/// One scored result of [`MemoryStore::retrieve`]. Primary-pipeline entries
/// carry the full score breakdown; cluster-fallback entries only carry a
/// similarity, appended as-is and not re-ranked.
#[derive(Debug, Clone)]
pub struct RetrievedInteraction {
    pub interaction: Interaction,
    pub similarity: f32,
    pub is_fallback: bool,
}

/// A handle to exactly undo one [`MemoryStore::add_interaction`] call, used
/// when the caller's persistence write subsequently fails.
pub struct IngestionToken {
    graph_token: GraphUpdateToken,
}

/// Owns C1–C3 plus the interaction tiers and executes the retrieval
/// scoring pipeline.
pub struct MemoryStore {
    dimension: usize,
    decay_rate: f64,
    promote_factor: f64,
    demote_factor: f64,
    promotion_access_threshold: u64,

    short_term: Vec<Interaction>,
    long_term: Vec<Interaction>,
    vector_index: VectorIndex,
    graph: ConceptGraph,
    #[cfg(feature = "cluster-fallback")]
    clusters: ClusterMap,
    #[cfg(not(feature = "cluster-fallback"))]
    #[allow(dead_code)]
    clusters: (),
    clusters_dirty: bool,
    cluster_seed: u64,
}

impl MemoryStore {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            dimension: config.dimension,
            decay_rate: config.decay_rate,
            promote_factor: config.promote_factor,
            demote_factor: config.demote_factor,
            promotion_access_threshold: config.promotion_access_threshold,
            short_term: Vec::new(),
            long_term: Vec::new(),
            vector_index: VectorIndex::new(config.dimension),
            graph: ConceptGraph::new(),
            #[cfg(feature = "cluster-fallback")]
            clusters: ClusterMap::new(config.dimension),
            #[cfg(not(feature = "cluster-fallback"))]
            clusters: (),
            clusters_dirty: false,
            cluster_seed: 0,
        }
    }

    /// Restore tiers from a persisted snapshot. Rebuilds the vector index
    /// and concept graph from the short-term list; long-term records are
    /// not re-indexed — they are not re-scored in the primary pipeline.
    pub fn load(
        config: &MemoryConfig,
        short_term: Vec<Interaction>,
        long_term: Vec<Interaction>,
    ) -> Result<Self, MemoryStoreError> {
        let mut store = Self::new(config);
        for interaction in short_term {
            store.vector_index.add(interaction.embedding.clone())?;
            store.graph.update(&interaction.concepts);
            store.short_term.push(interaction);
        }
        store.long_term = long_term;
        store.clusters_dirty = !store.short_term.is_empty();
        Ok(store)
    }

    pub fn short_term(&self) -> &[Interaction] {
        &self.short_term
    }

    pub fn long_term(&self) -> &[Interaction] {
        &self.long_term
    }

    /// Ingest one already-normalized interaction. Normalization itself is
    /// the caller's responsibility via
    /// [`crate::embeddings::normalize_dimension`] — this keeps the store
    /// free of the embedding-provider error type.
    ///
    /// Persistence (step 5) is the caller's concern too: on a persistence
    /// failure the caller must pass the returned [`IngestionToken`] to
    /// [`Self::rollback_last_ingestion`].
    pub fn add_interaction(
        &mut self,
        interaction: Interaction,
    ) -> Result<IngestionToken, MemoryStoreError> {
        let id = interaction.id;
        if let Err(err) = self.vector_index.add(interaction.embedding.clone()) {
            tracing::error!(%id, %err, "rejected ingestion: embedding dimension mismatch");
            return Err(err.into());
        }
        let graph_token = self.graph.update(&interaction.concepts);
        self.short_term.push(interaction);
        self.clusters_dirty = true;
        tracing::debug!(%id, short_term_len = self.short_term.len(), "ingested interaction");
        Ok(IngestionToken { graph_token })
    }

    /// Undo the most recent [`Self::add_interaction`] call: pop the
    /// short-term record, pop the vector index entry, and undo the graph
    /// update. Used when the in-memory mutation has already occurred and
    /// must be rolled back.
    pub fn rollback_last_ingestion(&mut self, token: IngestionToken) {
        let rolled_back = self.short_term.pop();
        self.vector_index.pop_last();
        self.graph.rollback(token.graph_token);
        self.clusters_dirty = true;
        tracing::warn!(id = ?rolled_back.map(|i| i.id), "rolled back ingestion after persistence failure");
    }

    fn ensure_clusters_fresh(&mut self) {
        #[cfg(feature = "cluster-fallback")]
        {
            if !self.clusters_dirty {
                return;
            }
            let embeddings: Vec<(usize, Vec<f32>)> = self
                .short_term
                .iter()
                .enumerate()
                .map(|(i, interaction)| (i, interaction.embedding.clone()))
                .collect();
            // Recomputation is amortized to "next retrieval" rather than run
            // on every insertion, which would dominate cost quickly.
            let n = embeddings.len();
            if let Err(err) = self.clusters.recompute(&embeddings, self.cluster_seed) {
                tracing::warn!(%err, "skipping cluster recompute");
            } else {
                tracing::debug!(n, k = self.clusters.k(), "recomputed cluster map");
            }
            self.clusters_dirty = false;
        }
        #[cfg(not(feature = "cluster-fallback"))]
        {
            self.clusters_dirty = false;
        }
    }

    /// The retrieval scoring pipeline.
    pub fn retrieve(
        &mut self,
        query_vec: &[f32],
        query_concepts: &[String],
        similarity_threshold: f32,
        exclude_last_n: usize,
    ) -> Vec<RetrievedInteraction> {
        let n = self.short_term.len();
        if n == 0 {
            return Vec::new();
        }

        self.ensure_clusters_fresh();

        let query_norm = l2_normalize(query_vec);
        let now = Utc::now();
        let scan_end = n.saturating_sub(exclude_last_n);

        let mut relevant: Vec<(f32, usize)> = Vec::new();

        for i in 0..scan_end {
            let embedding_norm = l2_normalize(&self.short_term[i].embedding);
            let sim = cosine_similarity(&query_norm, &embedding_norm) * 100.0;

            let age_s =
                (now - self.short_term[i].timestamp).num_milliseconds() as f64 / 1000.0;
            let eff_decay = self.short_term[i].decay_factor * (-self.decay_rate * age_s).exp();
            let reinforcement = (1.0 + self.short_term[i].access_count as f64).ln();
            let adj_sim = (sim as f64) * eff_decay * reinforcement;
            tracing::trace!(index = i, sim, age_s, adj_sim, "scored candidate");

            if adj_sim as f32 >= similarity_threshold {
                relevant.push((adj_sim as f32, i));
                self.short_term[i].access_count += 1;
                self.short_term[i].timestamp = now;
                self.short_term[i].decay_factor *= self.promote_factor;
            } else {
                self.short_term[i].decay_factor *= self.demote_factor;
            }
        }

        let seed_concepts: Vec<String> = query_concepts.to_vec();
        let activated = self.graph.spreading_activation(&seed_concepts);

        let mut scored: Vec<(f32, usize)> = relevant
            .into_iter()
            .map(|(adj_sim, i)| {
                let activation_score: f64 = self.short_term[i]
                    .concepts
                    .iter()
                    .map(|c| activated.get(c).copied().unwrap_or(0.0))
                    .sum();
                (adj_sim + activation_score as f32, i)
            })
            .collect();

        scored.sort_by(|(score_a, i_a), (score_b, i_b)| {
            score_b
                .partial_cmp(score_a)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| {
                    self.short_term[*i_b]
                        .timestamp
                        .cmp(&self.short_term[*i_a].timestamp)
                })
                .then_with(|| self.short_term[*i_a].id.to_string().cmp(&self.short_term[*i_b].id.to_string()))
        });

        let mut results: Vec<RetrievedInteraction> = scored
            .into_iter()
            .map(|(score, i)| RetrievedInteraction {
                interaction: self.short_term[i].clone(),
                similarity: score,
                is_fallback: false,
            })
            .collect();

        #[cfg(feature = "cluster-fallback")]
        {
            for (index, sim) in self.clusters.semantic_lookup(&query_norm) {
                if let Some(interaction) = self.short_term.get(index) {
                    results.push(RetrievedInteraction {
                        interaction: interaction.clone(),
                        similarity: sim,
                        is_fallback: true,
                    });
                }
            }
        }

        results
    }

    /// Promote every short-term record whose `access_count` exceeds the
    /// configured threshold into long-term, skipping ids already present.
    /// Idempotent.
    pub fn classify(&mut self) {
        let existing: HashSet<_> = self.long_term.iter().map(|i| i.id).collect();
        let mut promoted = 0usize;
        for interaction in &self.short_term {
            if interaction.access_count > self.promotion_access_threshold
                && !existing.contains(&interaction.id)
            {
                self.long_term.push(interaction.clone());
                promoted += 1;
            }
        }
        if promoted > 0 {
            tracing::debug!(promoted, long_term_len = self.long_term.len(), "promoted to long-term");
        }
    }

    pub fn dimension(&self) -> usize {
        self.dimension
    }
}
