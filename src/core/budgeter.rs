use anyhow::{Context, Result, anyhow};
use moka::sync::Cache;
use tiktoken_rs::{CoreBPE, cl100k_base, get_bpe_from_model, o200k_base};
use xxhash_rust::xxh64::Xxh64;

use crate::core::snippet::Definition;

/// Anything that can count tokens. One instance is shared by every stage of
/// a request so scoring windows, pruning and budget arithmetic agree.
pub trait TokenCounter: Send + Sync {
    fn count(&self, s: &str) -> usize;
}

/// Tiktoken-backed counter with a memo of recent counts.
pub struct Budgeter {
    /// Byte Pair Encoding (BPE) tokenizer for counting tokens
    bpe: CoreBPE,

    /// Token count cache for fast repeated queries
    cache: Cache<u64, usize>,
}

impl Budgeter {
    /// Create a new Budgeter for a given model or encoding name.
    ///
    /// Supported values include model names (e.g., "gpt-4o", "gpt-4") or encoding names
    /// ("cl100k_base", "o200k_base"). Falls back to encoding names if model lookup fails.
    ///
    /// # Errors
    /// Returns an error if the model or encoding is unsupported or cannot be loaded.
    pub fn new(model_or_encoding: &str) -> Result<Self> {
        let lower = model_or_encoding.to_ascii_lowercase();

        // Try to get BPE from model name first, fallback to encoding name.
        let bpe = match get_bpe_from_model(&lower) {
            Ok(b) => b,
            Err(_) => match lower.as_str() {
                "o200k_base" => o200k_base().context("load o200k_base")?,
                "cl100k_base" => cl100k_base().context("load cl100k_base")?,
                _ => return Err(anyhow!("Unsupported model/encoding: {model_or_encoding}")),
            },
        };

        Ok(Self {
            bpe,
            cache: Cache::new(100_000),
        })
    }
}

impl TokenCounter for Budgeter {
    /// Count tokens, keyed in the cache by the xxhash64 of the text.
    fn count(&self, s: &str) -> usize {
        let mut hasher = Xxh64::new(0);
        hasher.update(s.as_bytes());
        let key = hasher.digest();

        if let Some(t) = self.cache.get(&key) {
            return t;
        }

        let t = self.bpe.encode_ordinary(s).len();
        self.cache.insert(key, t);
        t
    }
}

/// Counts whitespace-separated words. Cheap and exact, which makes budget
/// arithmetic easy to reason about offline.
#[derive(Debug, Default, Clone, Copy)]
pub struct WhitespaceCounter;

impl TokenCounter for WhitespaceCounter {
    fn count(&self, s: &str) -> usize {
        s.split_whitespace().count()
    }
}

/// Counter for a configured tokenizer name; `whitespace` selects
/// [`WhitespaceCounter`], everything else goes through tiktoken.
pub fn counter_for(model: &str) -> Result<Box<dyn TokenCounter>> {
    if model.eq_ignore_ascii_case("whitespace") {
        return Ok(Box::new(WhitespaceCounter));
    }
    Ok(Box::new(Budgeter::new(model)?))
}

/// Greedily select `ordered` snippets under `budget` tokens.
///
/// Each snippet costs its token count plus `overhead`. A snippet that does
/// not fit is skipped, not a stopping point: a later, cheaper one may still
/// fit. An exactly-fitting snippet is accepted.
pub fn pack(
    ordered: Vec<Definition>,
    budget: usize,
    overhead: usize,
    counter: &dyn TokenCounter,
) -> Vec<Definition> {
    let mut remaining = budget;
    let mut out = Vec::new();

    for snippet in ordered {
        if remaining == 0 {
            break;
        }
        let cost = counter.count(&snippet.content) + overhead;
        if cost <= remaining {
            remaining -= cost;
            out.push(snippet);
        } else {
            tracing::debug!(path = %snippet.source_path.display(), cost, remaining, "snippet does not fit");
        }
    }

    out
}
