//! Vector Index (C1)
//!
//! Exact brute-force similarity search over fixed-dimension float vectors.
//! Sufficient for the expected short-term scale (N ≤ 10^5); an ANN backend
//! is a documented extension point (see `DESIGN.md`), not implemented here,
//! since it would be a concrete search-provider choice and couldn't preserve
//! deterministic tie-breaks without extra reconciliation machinery.

/// Errors raised by [`VectorIndex`].
#[non_exhaustive]
#[derive(Debug, Clone, thiserror::Error)]
pub enum VectorIndexError {
    #[error("expected a {expected}-dimensional vector, got {got}")]
    DimensionMismatch { expected: usize, got: usize },

    #[error("vector index is empty")]
    Empty,
}

/// Column-store of raw (not necessarily normalized) embedding vectors,
/// indexed by insertion position. Positions are stable except for the
/// `pop_last` rollback path — ingestion never removes from the middle,
/// only the most recent append can be undone.
#[derive(Debug, Clone)]
pub struct VectorIndex {
    dimension: usize,
    vectors: Vec<Vec<f32>>,
}

impl VectorIndex {
    /// Create an empty index for `dimension`-length vectors.
    pub fn new(dimension: usize) -> Self {
        Self { dimension, vectors: Vec::new() }
    }

    /// Target dimension of every stored vector.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    pub fn len(&self) -> usize {
        self.vectors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vectors.is_empty()
    }

    /// Append `vector`, returning its stable index.
    pub fn add(&mut self, vector: Vec<f32>) -> Result<usize, VectorIndexError> {
        if vector.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                got: vector.len(),
            });
        }
        self.vectors.push(vector);
        Ok(self.vectors.len() - 1)
    }

    /// Remove the most recently added vector. Used only by the ingestion
    /// rollback path when persistence fails after the in-memory write.
    pub fn pop_last(&mut self) -> Option<Vec<f32>> {
        self.vectors.pop()
    }

    pub fn get(&self, index: usize) -> Option<&[f32]> {
        self.vectors.get(index).map(|v| v.as_slice())
    }

    pub fn iter(&self) -> impl Iterator<Item = &[f32]> {
        self.vectors.iter().map(|v| v.as_slice())
    }

    /// Exact top-k nearest neighbors to `query` by squared Euclidean
    /// distance (L2), ascending. Ties break by ascending index — an
    /// ordering a future ANN swap would need to preserve.
    pub fn search_topk(
        &self,
        query: &[f32],
        k: usize,
    ) -> Result<Vec<(usize, f32)>, VectorIndexError> {
        if query.len() != self.dimension {
            return Err(VectorIndexError::DimensionMismatch {
                expected: self.dimension,
                got: query.len(),
            });
        }
        if self.vectors.is_empty() {
            return Ok(Vec::new());
        }

        let mut scored: Vec<(usize, f32)> = self
            .vectors
            .iter()
            .enumerate()
            .map(|(i, v)| (i, l2_distance_squared(query, v)))
            .collect();

        scored.sort_by(|a, b| {
            a.1.partial_cmp(&b.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then(a.0.cmp(&b.0))
        });
        scored.truncate(k);
        Ok(scored)
    }
}

/// Squared Euclidean distance. Unlike full Euclidean distance, avoids a
/// `sqrt` per comparison for ranking purposes — monotonic in true distance.
pub fn l2_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    a.iter().zip(b.iter()).map(|(x, y)| (x - y).powi(2)).sum()
}

/// Cosine similarity. Defined to be `0.0` when either vector has zero norm
/// (no divide-by-zero) or on dimension mismatch, rather than panicking.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() {
        return 0.0;
    }
    let mut dot = 0.0_f32;
    let mut norm_a = 0.0_f32;
    let mut norm_b = 0.0_f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    let denom = (norm_a * norm_b).sqrt();
    if denom > 0.0 { dot / denom } else { 0.0 }
}

/// L2-normalize `v` to unit length. Returns a zero vector unchanged (no
/// divide-by-zero), matching the cosine-similarity convention above.
pub fn l2_normalize(v: &[f32]) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 0.0 {
        v.iter().map(|x| x / norm).collect()
    } else {
        v.to_vec()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_rejects_wrong_dimension() {
        let mut idx = VectorIndex::new(4);
        assert!(idx.add(vec![1.0, 2.0, 3.0]).is_err());
    }

    #[test]
    fn search_topk_orders_by_distance_with_index_tiebreak() {
        let mut idx = VectorIndex::new(2);
        idx.add(vec![0.0, 0.0]).unwrap();
        idx.add(vec![1.0, 0.0]).unwrap();
        idx.add(vec![0.0, 0.0]).unwrap(); // duplicate distance of index 0, tie broken by index

        let results = idx.search_topk(&[0.0, 0.0], 3).unwrap();
        assert_eq!(results[0].0, 0);
        assert_eq!(results[1].0, 2);
        assert_eq!(results[2].0, 1);
    }

    #[test]
    fn pop_last_undoes_append() {
        let mut idx = VectorIndex::new(2);
        idx.add(vec![1.0, 1.0]).unwrap();
        idx.add(vec![2.0, 2.0]).unwrap();
        assert_eq!(idx.pop_last(), Some(vec![2.0, 2.0]));
        assert_eq!(idx.len(), 1);
    }

    #[test]
    fn cosine_similarity_zero_vector_is_zero() {
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[1.0, 1.0]), 0.0);
        assert_eq!(cosine_similarity(&[0.0, 0.0], &[0.0, 0.0]), 0.0);
    }

    #[test]
    fn cosine_similarity_identical_is_one() {
        let v = [0.3, 0.4, 0.1];
        let sim = cosine_similarity(&v, &v);
        assert!((sim - 1.0).abs() < 1e-5);
    }

    #[test]
    fn l2_normalize_is_idempotent() {
        let v = vec![3.0, 4.0];
        let once = l2_normalize(&v);
        let twice = l2_normalize(&once);
        for (a, b) in once.iter().zip(twice.iter()) {
            assert!((a - b).abs() < 1e-6);
        }
    }
}
