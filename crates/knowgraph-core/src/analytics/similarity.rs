//! Pluggable text similarity for question recall and keyword extraction.

use std::collections::BTreeSet;
use std::sync::LazyLock;

use regex::Regex;

static TOKEN_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z_][A-Za-z0-9_]+").unwrap());

const STOP_WORDS: &[&str] = &[
    "a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "do", "does", "for",
    "from", "how", "i", "in", "is", "it", "of", "on", "or", "should", "that", "the", "this",
    "to", "was", "we", "what", "when", "where", "which", "who", "why", "will", "with", "you",
];

/// Lower-cased word tokens of two or more characters, stop words removed.
pub fn tokenize(text: &str) -> BTreeSet<String> {
    TOKEN_RE
        .find_iter(text)
        .map(|m| m.as_str().to_lowercase())
        .filter(|token| !STOP_WORDS.contains(&token.as_str()))
        .collect()
}

/// Symmetric similarity in [0, 1].
pub trait TextSimilarity: Send + Sync {
    fn similarity(&self, a: &str, b: &str) -> f64;
}

/// |A ∩ B| / |A ∪ B| over [`tokenize`] output.
#[derive(Clone, Copy, Debug, Default)]
pub struct JaccardSimilarity;

impl TextSimilarity for JaccardSimilarity {
    fn similarity(&self, a: &str, b: &str) -> f64 {
        let left = tokenize(a);
        let right = tokenize(b);
        if left.is_empty() && right.is_empty() {
            return 0.0;
        }
        let shared = left.intersection(&right).count();
        let union = left.union(&right).count();
        shared as f64 / union as f64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenizer_drops_stop_words_and_case() {
        let tokens = tokenize("How does the OrderService load an Order?");
        let expected: BTreeSet<String> = ["orderservice", "load", "order"]
            .iter()
            .map(|s| s.to_string())
            .collect();
        assert_eq!(tokens, expected);
    }

    #[test]
    fn jaccard_is_symmetric_and_bounded() {
        let sim = JaccardSimilarity;
        let a = "where is the user repository registered";
        let b = "user repository registration";
        assert_eq!(sim.similarity(a, b), sim.similarity(b, a));
        assert!((sim.similarity(a, a) - 1.0).abs() < 1e-12);
        assert_eq!(sim.similarity("alpha beta", "gamma delta"), 0.0);
        assert_eq!(sim.similarity("", "the"), 0.0);
        let partial = sim.similarity(a, b);
        assert!(partial > 0.0 && partial < 1.0);
    }
}
