//! Lexical-overlap scoring of candidate snippets and their packing order.

use std::collections::HashSet;

use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use crate::core::snippet::Definition;

/// Characters that separate symbol tokens.
const SEPARATORS: &[char] = &[
    '.', ',', '/', '#', '!', '$', '%', '^', '&', '*', ';', ':', '{', '}', '=', '-', '_', '`', '~', '(', ')', '[', ']',
];

/// Configured ordering, without its seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum RankingOrder {
    Ascending,
    #[default]
    Descending,
    Shuffled,
}

impl RankingOrder {
    pub fn with_seed(self, seed: u64) -> RankingStrategy {
        match self {
            RankingOrder::Ascending => RankingStrategy::Ascending,
            RankingOrder::Descending => RankingStrategy::Descending,
            RankingOrder::Shuffled => RankingStrategy::Shuffled { seed },
        }
    }
}

/// Order in which scored candidates are offered to the packer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RankingStrategy {
    /// Least similar first
    Ascending,
    /// Most similar first
    Descending,
    /// Deterministic shuffle
    Shuffled { seed: u64 },
}

/// Symbol tokens of `text`: split on whitespace and punctuation, deduplicated.
pub fn symbols_of(text: &str) -> HashSet<&str> {
    text.split(|c: char| c.is_whitespace() || SEPARATORS.contains(&c))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// `|a ∩ b| / |a ∪ b|`, zero when both are empty.
pub fn jaccard(a: &HashSet<&str>, b: &HashSet<&str>) -> f32 {
    let union = a.union(b).count();
    if union == 0 {
        return 0.0;
    }
    a.intersection(b).count() as f32 / union as f32
}

/// Slice straddling the cursor: the last `size * prefix_share` chars of the
/// prefix followed by the first `size * (1 - prefix_share)` chars of the suffix.
pub fn scoring_window(prefix: &str, suffix: &str, size: usize, prefix_share: f64) -> String {
    let share = prefix_share.clamp(0.0, 1.0);
    let from_prefix = (size as f64 * share) as usize;
    let from_suffix = (size as f64 * (1.0 - share)) as usize;

    let prefix_chars = prefix.chars().count();
    let head: String = prefix.chars().skip(prefix_chars.saturating_sub(from_prefix)).collect();
    let tail: String = suffix.chars().take(from_suffix).collect();
    head + &tail
}

/// Drop candidates that are blank or already verbatim in the caret window.
pub fn drop_redundant(candidates: Vec<Definition>, caret_window: &str) -> Vec<Definition> {
    candidates
        .into_iter()
        .filter(|d| {
            let trimmed = d.content.trim();
            !trimmed.is_empty() && !caret_window.contains(trimmed)
        })
        .collect()
}

/// Assign a Jaccard score against `window` to every unscored candidate.
pub fn score(candidates: Vec<Definition>, window: &str) -> Vec<Definition> {
    let window_symbols = symbols_of(window);
    candidates
        .into_iter()
        .map(|d| match d.score {
            Some(_) => d,
            None => {
                let s = jaccard(&symbols_of(&d.content), &window_symbols);
                d.with_score(s)
            }
        })
        .collect()
}

/// Order candidates for packing. Sorting is stable, so ties keep their
/// discovery order.
pub fn order(mut candidates: Vec<Definition>, strategy: RankingStrategy) -> Vec<Definition> {
    let key = |d: &Definition| d.score.unwrap_or(0.0);
    match strategy {
        RankingStrategy::Ascending => candidates.sort_by(|a, b| key(a).total_cmp(&key(b))),
        RankingStrategy::Descending => candidates.sort_by(|a, b| key(b).total_cmp(&key(a))),
        RankingStrategy::Shuffled { seed } => {
            let mut rng = StdRng::seed_from_u64(seed);
            candidates.shuffle(&mut rng);
        }
    }
    candidates
}
