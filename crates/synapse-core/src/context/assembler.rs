//! Context Assembler (C8)
//!
//! Prunes and summarizes recent/retrieved interactions into a single bounded
//! context string, falling back to the window manager (C7) when the
//! assembled text overflows the token budget.

use chrono::{DateTime, Utc};

use crate::config::MemoryConfig;
use crate::memory::Interaction;

use super::window::{create_windows, estimate_tokens, merge, window_size};

/// One entry in the [`ContextAssembler`]'s buffer.
#[derive(Debug, Clone)]
pub struct BufferEntry {
    pub interaction: Interaction,
    pub similarity: f32,
    pub added_at: DateTime<Utc>,
}

/// Tunables consumed by [`ContextAssembler::build_context`].
#[derive(Debug, Clone)]
pub struct ContextOptions {
    pub max_time_window_ms: i64,
    pub relevance_threshold: f32,
    pub max_context_size: usize,
    pub max_tokens: usize,
    pub min_window: usize,
    pub max_window: usize,
    pub overlap_ratio: f32,
    pub avg_token_len: usize,
    pub truncation_limit: Option<usize>,
    pub system_context: Option<String>,
}

impl ContextOptions {
    /// Derive the §6 recognized context-assembler options straight from
    /// `config`, the way the facade (C9) builds them by default —
    /// `system_context` is per-call, not a config field, so it's the only
    /// piece a caller still supplies.
    pub fn from_config(config: &MemoryConfig, system_context: Option<String>) -> Self {
        Self {
            max_time_window_ms: config.max_time_window_ms,
            relevance_threshold: config.relevance_threshold,
            max_context_size: config.max_context_size,
            max_tokens: config.max_tokens,
            min_window: config.min_window,
            max_window: config.max_window,
            overlap_ratio: config.overlap_ratio,
            avg_token_len: config.avg_token_len,
            truncation_limit: config.context_truncation_limit,
            system_context,
        }
    }
}

/// Concept-grouped summarizer, pruner, and window-overflow handler owning
/// the context buffer.
#[derive(Debug, Clone, Default)]
pub struct ContextAssembler {
    buffer: Vec<BufferEntry>,
}

impl ContextAssembler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn buffer_len(&self) -> usize {
        self.buffer.len()
    }

    /// Step 1: evict stale/irrelevant entries, sort by similarity
    /// descending, truncate to `max_context_size`.
    fn prune(&mut self, options: &ContextOptions, now: DateTime<Utc>) {
        self.buffer.retain(|entry| {
            let age_ms = (now - entry.added_at).num_milliseconds();
            age_ms <= options.max_time_window_ms && entry.similarity >= options.relevance_threshold
        });
        self.buffer
            .sort_by(|a, b| b.similarity.partial_cmp(&a.similarity).unwrap_or(std::cmp::Ordering::Equal));
        self.buffer.truncate(options.max_context_size);
    }

    /// Step 2: ingest new retrievals (their own similarity) and recent
    /// interactions (fixed similarity 0.9), both stamped `added_at = now`.
    fn ingest(
        &mut self,
        retrievals: &[(Interaction, f32)],
        recent_interactions: &[Interaction],
        now: DateTime<Utc>,
    ) {
        for (interaction, similarity) in retrievals {
            self.buffer.push(BufferEntry { interaction: interaction.clone(), similarity: *similarity, added_at: now });
        }
        for interaction in recent_interactions {
            self.buffer.push(BufferEntry { interaction: interaction.clone(), similarity: 0.9, added_at: now });
        }
    }

    /// Step 3: group `entries` by primary concept and render each group.
    fn summarize(entries: &[BufferEntry], truncation_limit: Option<usize>) -> String {
        let mut groups: Vec<(String, Vec<&BufferEntry>)> = Vec::new();
        for entry in entries {
            let key = entry.interaction.primary_concept().to_string();
            match groups.iter_mut().find(|(k, _)| *k == key) {
                Some((_, members)) => members.push(entry),
                None => groups.push((key, vec![entry])),
            }
        }

        let mut blocks = Vec::new();
        for (concept, members) in &groups {
            if members.len() == 1 {
                let entry = members[0];
                blocks.push(format!(
                    "Q: {}\nA: {}",
                    entry.interaction.prompt, entry.interaction.output
                ));
            } else {
                let mut block = format!("Topic: {concept}\n");
                let lines: Vec<String> = members
                    .iter()
                    .take(5)
                    .map(|entry| {
                        let output = truncate_output(&entry.interaction.output, truncation_limit);
                        format!("- {} → {}", entry.interaction.prompt, output)
                    })
                    .collect();
                block.push_str(&lines.join("\n"));
                blocks.push(block);
            }
        }
        blocks.join("\n\n")
    }

    /// Prune, ingest, summarize, assemble, and hand off to the window
    /// manager if the result overflows the token budget.
    pub fn build_context(
        &mut self,
        retrievals: &[(Interaction, f32)],
        recent_interactions: &[Interaction],
        options: &ContextOptions,
    ) -> String {
        let now = Utc::now();
        self.prune(options, now);
        self.ingest(retrievals, recent_interactions, now);
        self.prune(options, now);

        if self.buffer.is_empty() {
            return String::new();
        }

        let summary = Self::summarize(&self.buffer, options.truncation_limit);

        let mut sections = Vec::new();
        if let Some(system) = &options.system_context {
            sections.push(format!("System Context: {system}"));
        }
        if !summary.is_empty() {
            sections.push(format!("Relevant Context:\n{summary}"));
        }
        let assembled = sections.join("\n\n");

        if estimate_tokens(&assembled, options.avg_token_len) <= options.max_tokens {
            return assembled;
        }

        let w = window_size(&assembled, options.min_window, options.max_window, options.avg_token_len);
        let windows = create_windows(&assembled, w, options.overlap_ratio);
        merge(&windows, options.min_window, options.max_window, options.overlap_ratio)
    }
}

fn truncate_output(output: &str, limit: Option<usize>) -> String {
    match limit {
        Some(limit) if output.chars().count() > limit => {
            let truncated: String = output.chars().take(limit).collect();
            format!("{truncated}...")
        }
        _ => output.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeSet;

    fn interaction(prompt: &str, output: &str, concept: &str) -> Interaction {
        let mut concepts = BTreeSet::new();
        concepts.insert(concept.to_string());
        Interaction::new(prompt, output, vec![0.0; 4], concepts)
    }

    fn options() -> ContextOptions {
        ContextOptions {
            max_time_window_ms: 86_400_000,
            relevance_threshold: 0.0,
            max_context_size: 5,
            max_tokens: 8192,
            min_window: 100,
            max_window: 2000,
            overlap_ratio: 0.1,
            avg_token_len: 4,
            truncation_limit: None,
            system_context: None,
        }
    }

    #[test]
    fn empty_inputs_produce_empty_context() {
        let mut assembler = ContextAssembler::new();
        let out = assembler.build_context(&[], &[], &options());
        assert_eq!(out, "");
    }

    #[test]
    fn buffer_length_never_exceeds_max_context_size() {
        let mut assembler = ContextAssembler::new();
        let retrievals: Vec<(Interaction, f32)> = (0..10)
            .map(|i| (interaction(&format!("p{i}"), &format!("o{i}"), "ai"), 0.5))
            .collect();
        assembler.build_context(&retrievals, &[], &options());
        assert!(assembler.buffer_len() <= options().max_context_size);
    }

    #[test]
    fn scenario_concept_grouping_with_truncation() {
        let retrievals = vec![
            (interaction("p1", "this output is much longer than twenty characters", "ai"), 0.9),
            (interaction("p2", "short", "ai"), 0.8),
            (interaction("p3", "another one here", "ai"), 0.7),
            (interaction("p4", "bio output text", "bio"), 0.6),
        ];
        let mut opts = options();
        opts.truncation_limit = Some(20);

        let mut assembler = ContextAssembler::new();
        let out = assembler.build_context(&retrievals, &[], &opts);

        assert!(out.contains("Topic: ai"));
        assert!(out.contains("Q: p4\nA: bio output text"));
        assert!(out.contains("..."));
        assert!(out.contains("this output is much ..."));
        assert!(!out.contains("short..."));
    }

    #[test]
    fn recent_interactions_get_fixed_similarity() {
        let mut assembler = ContextAssembler::new();
        let recent = vec![interaction("p", "o", "ai")];
        assembler.build_context(&[], &recent, &options());
        assert_eq!(assembler.buffer.len(), 1);
        assert!((assembler.buffer[0].similarity - 0.9).abs() < f32::EPSILON);
    }

    #[test]
    fn system_context_header_is_prepended() {
        let mut assembler = ContextAssembler::new();
        let mut opts = options();
        opts.system_context = Some("be concise".to_string());
        let out = assembler.build_context(&[(interaction("p", "o", "ai"), 0.9)], &[], &opts);
        assert!(out.starts_with("System Context: be concise"));
    }

    #[test]
    fn from_config_carries_every_recognized_context_option() {
        let config = MemoryConfig { max_context_size: 7, relevance_threshold: 0.3, ..MemoryConfig::default() };
        let opts = ContextOptions::from_config(&config, Some("be terse".to_string()));
        assert_eq!(opts.max_context_size, 7);
        assert!((opts.relevance_threshold - 0.3).abs() < f32::EPSILON);
        assert_eq!(opts.max_time_window_ms, config.max_time_window_ms);
        assert_eq!(opts.max_tokens, config.max_tokens);
        assert_eq!(opts.min_window, config.min_window);
        assert_eq!(opts.max_window, config.max_window);
        assert!((opts.overlap_ratio - config.overlap_ratio).abs() < f32::EPSILON);
        assert_eq!(opts.avg_token_len, config.avg_token_len);
        assert_eq!(opts.truncation_limit, config.context_truncation_limit);
        assert_eq!(opts.system_context.as_deref(), Some("be terse"));
    }
}
