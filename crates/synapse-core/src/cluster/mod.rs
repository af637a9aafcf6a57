//! Cluster Map (C3)
//!
//! k-means partition of the current short-term embedding set, used as a
//! coarse semantic fallback when the primary similarity pipeline comes up
//! short. Gated behind the `cluster-fallback` feature — a caller happy
//! with primary-pipeline-only retrieval can compile it out.

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;

use crate::vector::cosine_similarity;

/// Maximum number of clusters: `K = min(MAX_CLUSTERS, N)`.
pub const MAX_CLUSTERS: usize = 10;

/// Fixed iteration cap for Lloyd's algorithm.
const MAX_ITERATIONS: usize = 100;

/// Centroid-movement convergence threshold.
const CONVERGENCE_EPSILON: f32 = 1e-4;

/// Number of fallback results returned by [`ClusterMap::semantic_lookup`].
const FALLBACK_TOP_N: usize = 5;

#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum ClusterError {
    #[error("expected a {expected}-dimensional vector, got {got}")]
    DimensionMismatch { expected: usize, got: usize },
}

/// One member of a cluster: a reference back to the caller's short-term
/// index plus the embedding that put it there.
#[derive(Debug, Clone)]
pub struct ClusterMember {
    pub index: usize,
    pub embedding: Vec<f32>,
}

/// One k-means cluster.
#[derive(Debug, Clone)]
pub struct Cluster {
    pub centroid: Vec<f32>,
    pub members: Vec<ClusterMember>,
}

/// k-means partition over the current embedding set, recomputed (not
/// mutated) whenever the caller asks — recomputing after every insertion is
/// O(N·K·I) and dominates quickly, so `MemoryStore` amortizes this and
/// decides when to call [`ClusterMap::recompute`] rather than firing it on
/// every ingestion.
#[derive(Debug, Clone)]
pub struct ClusterMap {
    dimension: usize,
    clusters: Vec<Cluster>,
}

impl ClusterMap {
    pub fn new(dimension: usize) -> Self {
        Self { dimension, clusters: Vec::new() }
    }

    pub fn k(&self) -> usize {
        self.clusters.len()
    }

    pub fn clusters(&self) -> &[Cluster] {
        &self.clusters
    }

    /// Recompute the partition from scratch over `embeddings` (short-term
    /// index, raw embedding pairs). `K = min(MAX_CLUSTERS, N)`; with
    /// `N < 2` the map holds no clusters at all. Centroid initialization
    /// is a deterministic Forgy draw from `seed`, so tests are reproducible.
    pub fn recompute(
        &mut self,
        embeddings: &[(usize, Vec<f32>)],
        seed: u64,
    ) -> Result<(), ClusterError> {
        for (_, v) in embeddings {
            if v.len() != self.dimension {
                return Err(ClusterError::DimensionMismatch {
                    expected: self.dimension,
                    got: v.len(),
                });
            }
        }

        let n = embeddings.len();
        if n < 2 {
            self.clusters = Vec::new();
            return Ok(());
        }

        let k = MAX_CLUSTERS.min(n);
        let mut rng = StdRng::seed_from_u64(seed);

        let mut indices: Vec<usize> = (0..n).collect();
        indices.shuffle(&mut rng);
        let mut centroids: Vec<Vec<f32>> =
            indices[..k].iter().map(|&i| embeddings[i].1.clone()).collect();

        let mut assignments = vec![0usize; n];

        for _iteration in 0..MAX_ITERATIONS {
            for (i, (_, v)) in embeddings.iter().enumerate() {
                let mut best = 0usize;
                let mut best_dist = f32::INFINITY;
                for (c, centroid) in centroids.iter().enumerate() {
                    let dist = crate::vector::l2_distance_squared(v, centroid);
                    if dist < best_dist {
                        best_dist = dist;
                        best = c;
                    }
                }
                assignments[i] = best;
            }

            let mut sums = vec![vec![0.0_f32; self.dimension]; k];
            let mut counts = vec![0usize; k];
            for (i, (_, v)) in embeddings.iter().enumerate() {
                let c = assignments[i];
                counts[c] += 1;
                for d in 0..self.dimension {
                    sums[c][d] += v[d];
                }
            }

            let mut max_shift = 0.0_f32;
            let mut new_centroids = centroids.clone();
            for c in 0..k {
                if counts[c] == 0 {
                    continue; // keep previous centroid for an emptied cluster
                }
                let mean: Vec<f32> = sums[c].iter().map(|s| s / counts[c] as f32).collect();
                let shift = crate::vector::l2_distance_squared(&mean, &centroids[c]).sqrt();
                max_shift = max_shift.max(shift);
                new_centroids[c] = mean;
            }
            centroids = new_centroids;

            if max_shift < CONVERGENCE_EPSILON {
                break;
            }
        }

        let mut clusters: Vec<Cluster> =
            centroids.into_iter().map(|c| Cluster { centroid: c, members: Vec::new() }).collect();
        for (i, (src_index, v)) in embeddings.iter().enumerate() {
            clusters[assignments[i]]
                .members
                .push(ClusterMember { index: *src_index, embedding: v.clone() });
        }

        self.clusters = clusters;
        Ok(())
    }

    /// Best-matching cluster, then top-5 members within it by cosine
    /// similarity to `query_vec` (already normalized). Empty if there are
    /// no clusters (fewer than 2 embeddings ingested so far).
    pub fn semantic_lookup(&self, query_vec: &[f32]) -> Vec<(usize, f32)> {
        if self.clusters.is_empty() {
            return Vec::new();
        }

        let mut best_cluster = 0usize;
        let mut best_sim = f32::NEG_INFINITY;
        for (i, cluster) in self.clusters.iter().enumerate() {
            let sim = cosine_similarity(query_vec, &cluster.centroid);
            if sim > best_sim {
                best_sim = sim;
                best_cluster = i;
            }
        }

        let mut scored: Vec<(usize, f32)> = self.clusters[best_cluster]
            .members
            .iter()
            .map(|m| (m.index, cosine_similarity(query_vec, &m.embedding)))
            .collect();
        scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
        scored.truncate(FALLBACK_TOP_N);
        scored
    }
}
