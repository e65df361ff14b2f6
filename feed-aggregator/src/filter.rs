use crate::config::{RelevanceConfig, ThresholdDecay};
use crate::rss_utils::text::contains_ignore_case;
use crate::traits::RandomSource;
use crate::types::{RawEntry, SearchTag};
use rand::Rng;
use tracing::debug;

/// Admits entries matching a category tag, plus a random share of the rest.
///
/// Walking the feed in order, the admission threshold starts at
/// `initial_threshold` and (with linear decay) drops by `1/N` per entry.
/// A non-matching entry is rejected while the threshold is at or above 1,
/// admitted once it reaches 0 or below, and in between admitted when a roll
/// in `[0, 1)` lands at or above the threshold.
#[derive(Debug, Clone)]
pub struct RelevanceFilter {
    config: RelevanceConfig,
}

impl RelevanceFilter {
    pub fn new(config: RelevanceConfig) -> Self {
        Self { config }
    }

    pub fn admit(
        &self,
        entries: Vec<RawEntry>,
        tags: &[SearchTag],
        rng: &dyn RandomSource,
    ) -> Vec<RawEntry> {
        let total = entries.len();
        if total == 0 {
            return Vec::new();
        }

        let step = match self.config.decay {
            ThresholdDecay::Linear => 1.0 / total as f64,
            ThresholdDecay::Constant => 0.0,
        };
        let tag_names: Vec<&str> = tags
            .iter()
            .map(|t| t.name.trim())
            .filter(|name| !name.is_empty())
            .collect();

        let mut threshold = self.config.initial_threshold;
        let mut admitted = Vec::with_capacity(total);
        let mut matched = 0usize;

        for entry in entries {
            if matches_any_tag(&entry, &tag_names) {
                matched += 1;
                admitted.push(entry);
            } else if admit_by_chance(threshold, rng) {
                admitted.push(entry);
            }
            threshold -= step;
        }

        debug!(
            "Relevance filter admitted {}/{} entries ({} tag matches)",
            admitted.len(),
            total,
            matched
        );
        admitted
    }
}

impl Default for RelevanceFilter {
    fn default() -> Self {
        Self::new(RelevanceConfig::default())
    }
}

/// True when any tag name occurs in the entry summary, ignoring case.
pub fn matches_any_tag(entry: &RawEntry, tag_names: &[&str]) -> bool {
    let Some(summary) = entry.summary.as_deref() else {
        return false;
    };
    tag_names.iter().any(|tag| contains_ignore_case(summary, tag))
}

pub fn admit_by_chance(threshold: f64, rng: &dyn RandomSource) -> bool {
    if threshold <= 0.0 {
        true
    } else if threshold >= 1.0 {
        false
    } else {
        rng.next_f64() >= threshold
    }
}

/// Rolls from the thread-local RNG.
#[derive(Debug, Default, Clone, Copy)]
pub struct ThreadRandom;

impl RandomSource for ThreadRandom {
    fn next_f64(&self) -> f64 {
        rand::thread_rng().gen::<f64>()
    }
}

/// Always returns the same roll.
#[derive(Debug, Clone, Copy)]
pub struct FixedRandom(pub f64);

impl RandomSource for FixedRandom {
    fn next_f64(&self) -> f64 {
        self.0
    }
}
