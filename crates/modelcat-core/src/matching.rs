//! Fuzzy matching between artifact references and hub model ids.
//!
//! Both sides of a comparison are reduced to a canonical hyphenated form,
//! then scored by one-to-one token overlap. The scorer is pure (zero I/O),
//! deterministic, and symmetric in its arguments.

use crate::config::MatchConfig;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Leading tokens that name the packaging, not the model.
const STRIP_PREFIXES: &[&str] = &["modelcar-"];

/// Normalize a free-form model identifier for comparison.
///
/// Strips the registry/namespace path and any trailing tag, lowercases,
/// folds `_`, `.` and spaces into `-`, collapses runs of `-`, and removes
/// known packaging prefixes. Idempotent: normalizing an already-normalized
/// identifier returns it unchanged.
pub fn normalize_identifier(identifier: &str) -> String {
    let mut s = identifier.trim();

    // Registry and namespace prefixes end at the last path separator.
    if let Some(pos) = s.rfind('/') {
        s = &s[pos + 1..];
    }

    // Trailing ":tag" (a digest or version tag on an image reference).
    if let Some(pos) = s.find(':') {
        s = &s[..pos];
    }

    let mut result: String = s
        .to_lowercase()
        .chars()
        .map(|c| if matches!(c, '_' | '.' | ' ') { '-' } else { c })
        .collect();

    // Collapse repeated separators
    while result.contains("--") {
        result = result.replace("--", "-");
    }
    result = result.trim_matches('-').to_string();

    // Strip packaging prefixes until a fixed point so the function stays
    // idempotent even for stuttered names.
    loop {
        let before = result.len();
        for prefix in STRIP_PREFIXES {
            if let Some(rest) = result.strip_prefix(prefix) {
                result = rest.to_string();
            }
        }
        if result.len() == before {
            break;
        }
    }

    result
}

/// Confidence tier derived from a similarity score via fixed thresholds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Confidence {
    None,
    Medium,
    High,
}

impl Confidence {
    pub fn from_score(score: f64) -> Self {
        if score >= MatchConfig::HIGH_CONFIDENCE_THRESHOLD {
            Confidence::High
        } else if score >= MatchConfig::MATCH_THRESHOLD {
            Confidence::Medium
        } else {
            Confidence::None
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Confidence::None => "none",
            Confidence::Medium => "medium",
            Confidence::High => "high",
        }
    }
}

impl std::fmt::Display for Confidence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Best candidate for a reference, with its score and tier.
#[derive(Debug, Clone)]
pub struct MatchResult {
    pub candidate: String,
    pub score: f64,
    pub confidence: Confidence,
}

/// Symmetric similarity between two model identifiers, in `[0, 1]`.
///
/// Tokens are matched one-to-one: a token appearing twice on one side can
/// consume at most two equal tokens on the other, which is what keeps the
/// score symmetric. When one normalized identifier contains the other, the
/// token score gets a convex boost toward 1.0.
pub fn similarity(a: &str, b: &str) -> f64 {
    let norm_a = normalize_identifier(a);
    let norm_b = normalize_identifier(b);

    if norm_a.is_empty() && norm_b.is_empty() {
        return 0.0;
    }
    if norm_a == norm_b {
        return 1.0;
    }

    let tokens_a: Vec<&str> = norm_a.split('-').filter(|t| !t.is_empty()).collect();
    let tokens_b: Vec<&str> = norm_b.split('-').filter(|t| !t.is_empty()).collect();

    let longest = tokens_a.len().max(tokens_b.len());
    if longest == 0 {
        return 0.0;
    }

    // One-to-one matching: each token in B may be consumed once.
    let mut remaining: HashMap<&str, usize> = HashMap::new();
    for token in &tokens_b {
        *remaining.entry(token).or_insert(0) += 1;
    }
    let mut common = 0usize;
    for token in &tokens_a {
        if let Some(count) = remaining.get_mut(token) {
            if *count > 0 {
                *count -= 1;
                common += 1;
            }
        }
    }

    let token_score = common as f64 / longest as f64;

    if norm_a.contains(&norm_b) || norm_b.contains(&norm_a) {
        token_score + (1.0 - token_score) * MatchConfig::SUBSTRING_BOOST
    } else {
        token_score
    }
}

/// Score `target` against every candidate id and return the best one.
///
/// Always returns the maximum-scoring candidate (ties keep the first);
/// callers gate on [`MatchResult::confidence`] or the score itself.
pub fn find_best_match<'a, I>(target: &str, candidates: I) -> Option<MatchResult>
where
    I: IntoIterator<Item = &'a str>,
{
    let mut best: Option<MatchResult> = None;
    for candidate in candidates {
        let score = similarity(target, candidate);
        let better = match &best {
            Some(current) => score > current.score,
            None => true,
        };
        if better {
            best = Some(MatchResult {
                candidate: candidate.to_string(),
                score,
                confidence: Confidence::from_score(score),
            });
        }
    }
    best
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_registry_and_tag() {
        assert_eq!(
            normalize_identifier("registry.redhat.io/rhelai1/modelcar-granite-8b-starter:1.5"),
            "granite-8b-starter"
        );
        assert_eq!(
            normalize_identifier("ibm-granite/granite-3.1-8b-instruct"),
            "granite-3-1-8b-instruct"
        );
    }

    #[test]
    fn test_normalize_separators() {
        assert_eq!(
            normalize_identifier("Meta-Llama-3.1-8B-Instruct-quantized.w4a16"),
            "meta-llama-3-1-8b-instruct-quantized-w4a16"
        );
        assert_eq!(normalize_identifier("some_model  name"), "some-model-name");
        assert_eq!(normalize_identifier("a--b---c"), "a-b-c");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        for input in [
            "registry.redhat.io/rhelai1/modelcar-granite-8b:1.5",
            "modelcar-modelcar-llama-3",
            "Meta-Llama-3.1-8B-Instruct",
            "--weird__input..",
            "",
        ] {
            let once = normalize_identifier(input);
            assert_eq!(normalize_identifier(&once), once, "input: {input:?}");
        }
    }

    #[test]
    fn test_similarity_symmetry() {
        let pairs = [
            ("modelcar-llama-3-1-8b", "Meta-Llama-3.1-8B-Instruct"),
            ("granite-8b", "granite-7b"),
            ("a-a-b", "a-b"),
            ("", "anything"),
        ];
        for (a, b) in pairs {
            assert_eq!(similarity(a, b), similarity(b, a), "pair: {a:?} / {b:?}");
        }
    }

    #[test]
    fn test_similarity_exact_match() {
        assert_eq!(similarity("Granite-8B", "granite_8b"), 1.0);
    }

    #[test]
    fn test_similarity_empty_inputs() {
        assert_eq!(similarity("", ""), 0.0);
        assert_eq!(similarity("---", "..."), 0.0);
    }

    #[test]
    fn test_duplicate_tokens_consume_one_to_one() {
        // "a-a-b" vs "a-b": the second "a" finds no unconsumed partner.
        let score = similarity("a-a-b", "a-b");
        assert!((score - (2.0 / 3.0 + (1.0 / 3.0) * 0.1)).abs() < 1e-9);
    }

    #[test]
    fn test_specific_match_beats_generic_match() {
        let reference = "modelcar-llama-3-1-8b-instruct-quantized-w4a16";
        let specific = similarity(reference, "Meta-Llama-3.1-8B-Instruct-quantized.w4a16");
        let generic = similarity(reference, "Llama-3.1-8B-Instruct");

        assert!(
            specific >= generic + 0.1,
            "specific {specific} should beat generic {generic} by at least 0.1"
        );
    }

    #[test]
    fn test_confidence_thresholds_inclusive() {
        assert_eq!(Confidence::from_score(0.49), Confidence::None);
        assert_eq!(Confidence::from_score(0.5), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.79), Confidence::Medium);
        assert_eq!(Confidence::from_score(0.8), Confidence::High);
        assert_eq!(Confidence::from_score(1.0), Confidence::High);
    }

    #[test]
    fn test_find_best_match_keeps_maximum() {
        let candidates = [
            "Llama-3.1-8B-Instruct",
            "Meta-Llama-3.1-8B-Instruct-quantized.w4a16",
            "granite-8b-code",
        ];
        let result = find_best_match(
            "modelcar-llama-3-1-8b-instruct-quantized-w4a16",
            candidates.iter().copied(),
        )
        .unwrap();
        assert_eq!(result.candidate, "Meta-Llama-3.1-8B-Instruct-quantized.w4a16");
        assert_eq!(result.confidence, Confidence::High);
    }
}
