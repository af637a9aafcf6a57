//! Concept Graph (C2)
//!
//! A weighted undirected co-occurrence graph over concept strings, used for
//! two-step spreading activation during retrieval. Backed by a plain
//! adjacency map rather than a graph crate like `petgraph` — the only
//! operations needed (pairwise weight increment, bounded propagation) don't
//! need graph-traversal algorithms.

use std::collections::{BTreeSet, HashMap};

/// Weighted undirected co-occurrence graph over concept strings.
///
/// Invariant: `weight(a, b)` equals the number of ingested interactions
/// whose concept set contained both `a` and `b`. Self-loops are forbidden.
/// Edges are additive-only within a process lifetime — no removal on
/// eviction (see `DESIGN.md` Open Questions).
#[derive(Debug, Clone, Default)]
pub struct ConceptGraph {
    adjacency: HashMap<String, HashMap<String, u32>>,
}

/// Exact record of what a single [`ConceptGraph::update`] call changed,
/// sufficient for [`ConceptGraph::rollback`] to undo it precisely: which
/// nodes were created from scratch, and which pair weights were
/// incremented (each entry undoes one `+1`).
#[derive(Debug, Clone, Default)]
pub struct GraphUpdateToken {
    new_nodes: Vec<String>,
    incremented_pairs: Vec<(String, String)>,
}

impl ConceptGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of distinct concept nodes that have appeared in at least one
    /// ingested interaction.
    pub fn node_count(&self) -> usize {
        self.adjacency.len()
    }

    pub fn contains_node(&self, concept: &str) -> bool {
        self.adjacency.contains_key(concept)
    }

    /// Current weight of the edge between `a` and `b`, or `None` if no such
    /// edge exists (or `a == b`, which never forms an edge).
    pub fn weight(&self, a: &str, b: &str) -> Option<u32> {
        if a == b {
            return None;
        }
        self.adjacency.get(a).and_then(|n| n.get(b)).copied()
    }

    /// Ingest one interaction's concept set: ensure every concept has a
    /// node, then increment the weight of every unordered pair by 1
    /// (creating the edge with weight 1 if absent). No-op for an empty or
    /// singleton set (no pairs to form).
    ///
    /// Returns a [`GraphUpdateToken`] recording exactly what this call
    /// changed, so [`Self::rollback`] can undo it precisely — needed by
    /// the ingestion failure path, which must undo graph edge weight
    /// increments.
    pub fn update(&mut self, concepts: &BTreeSet<String>) -> GraphUpdateToken {
        let mut new_nodes = Vec::new();
        for c in concepts {
            if !self.adjacency.contains_key(c) {
                self.adjacency.insert(c.clone(), HashMap::new());
                new_nodes.push(c.clone());
            }
        }

        let mut incremented_pairs = Vec::new();
        let ordered: Vec<&String> = concepts.iter().collect();
        for i in 0..ordered.len() {
            for j in (i + 1)..ordered.len() {
                let (a, b) = (ordered[i], ordered[j]);
                if a == b {
                    continue;
                }
                *self.adjacency.entry(a.clone()).or_default().entry(b.clone()).or_insert(0) += 1;
                *self.adjacency.entry(b.clone()).or_default().entry(a.clone()).or_insert(0) += 1;
                incremented_pairs.push((a.clone(), b.clone()));
            }
        }

        GraphUpdateToken { new_nodes, incremented_pairs }
    }

    /// Exactly undo a prior [`Self::update`] call: decrement each
    /// incremented edge (removing it once its weight reaches zero), then
    /// remove any node that call created from scratch.
    pub fn rollback(&mut self, token: GraphUpdateToken) {
        for (a, b) in &token.incremented_pairs {
            if let Some(neighbors) = self.adjacency.get_mut(a) {
                if let Some(w) = neighbors.get_mut(b) {
                    *w = w.saturating_sub(1);
                    if *w == 0 {
                        neighbors.remove(b);
                    }
                }
            }
            if let Some(neighbors) = self.adjacency.get_mut(b) {
                if let Some(w) = neighbors.get_mut(a) {
                    *w = w.saturating_sub(1);
                    if *w == 0 {
                        neighbors.remove(a);
                    }
                }
            }
        }
        for node in token.new_nodes {
            self.adjacency.remove(&node);
        }
    }

    /// Two-step spreading activation from `seed_concepts`.
    ///
    /// Each seed starts with activation `1.0`. In each of exactly two
    /// steps, every node activated *before that step began* spreads
    /// `a * 0.5 * weight(n, m)` to each neighbor `m` not yet activated
    /// before that step, summed across all contributing neighbors. A node
    /// already activated never receives further activation in a later
    /// step, so propagation terminates after step 2 with no further
    /// growth possible from these seeds.
    pub fn spreading_activation(&self, seed_concepts: &[String]) -> HashMap<String, f64> {
        let mut activated: HashMap<String, f64> = HashMap::new();
        for seed in seed_concepts {
            activated.entry(seed.clone()).or_insert(1.0);
        }

        for _step in 0..2 {
            let snapshot: Vec<(String, f64)> =
                activated.iter().map(|(k, v)| (k.clone(), *v)).collect();
            let mut increments: HashMap<String, f64> = HashMap::new();

            for (node, activation) in &snapshot {
                let Some(neighbors) = self.adjacency.get(node) else { continue };
                for (neighbor, weight) in neighbors {
                    if neighbor == node {
                        continue; // no self-loops
                    }
                    if activated.contains_key(neighbor) {
                        continue; // already activated before this step
                    }
                    *increments.entry(neighbor.clone()).or_insert(0.0) +=
                        activation * 0.5 * (*weight as f64);
                }
            }

            for (node, inc) in increments {
                *activated.entry(node).or_insert(0.0) += inc;
            }
        }

        activated
    }
}
