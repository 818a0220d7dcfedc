//! Approximate string matching.
//!
//! Values are normalized (lowercased, every run of non-alphanumeric
//! characters squashed to one space, trimmed) and scored with the
//! normalized indel similarity:
//!
//! ```text
//! ratio(a, b) = 100 * 2 * LCS(a, b) / (len(a) + len(b))
//! ```
//!
//! where `LCS` is the longest common subsequence over chars. This is the
//! "quick ratio" flavour of similarity: insertions and deletions only, no
//! substitutions, so it is not a Levenshtein distance.

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;

/// Scores at or above this value count as a match.
pub const DEFAULT_THRESHOLD: f64 = 80.0;

static NON_ALPHANUMERIC: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("static pattern is valid"));

/// Lowercase, squash punctuation/whitespace runs to a single space, trim.
pub fn normalize(value: &str) -> String {
    NON_ALPHANUMERIC
        .replace_all(&value.to_lowercase(), " ")
        .trim()
        .to_string()
}

/// Similarity of two already-normalized strings, in [0, 100].
///
/// Returns 0 when either side is empty.
pub fn ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    (2 * lcs_len(&a, &b)) as f64 * 100.0 / total as f64
}

/// Normalize both sides, then score.
pub fn quick_ratio(a: &str, b: &str) -> f64 {
    ratio(&normalize(a), &normalize(b))
}

/// Longest common subsequence length, two-row DP.
fn lcs_len(a: &[char], b: &[char]) -> usize {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    let mut prev = vec![0usize; short.len() + 1];
    let mut curr = vec![0usize; short.len() + 1];

    for &lc in long {
        for (j, &sc) in short.iter().enumerate() {
            curr[j + 1] = if lc == sc {
                prev[j] + 1
            } else {
                curr[j].max(prev[j + 1])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[short.len()]
}

/// Best candidate for a reference value.
#[derive(Debug, Clone, PartialEq)]
pub struct BestMatch<'a> {
    /// Position of the candidate in the sequence it came from
    pub index: usize,
    /// Original (un-normalized) candidate value
    pub value: &'a str,
    /// Similarity in [0, 100]
    pub score: f64,
}

/// A candidate sequence normalized once, scored against many references.
#[derive(Debug, Clone)]
pub struct Choices<'a> {
    entries: Vec<Option<(&'a str, String)>>,
}

impl<'a> Choices<'a> {
    /// Only string values are comparable; other entries are kept as gaps so
    /// indexes still line up with the source sequence.
    pub fn new(candidates: impl IntoIterator<Item = &'a Value>) -> Self {
        let entries = candidates
            .into_iter()
            .map(|v| v.as_str().map(|s| (s, normalize(s))))
            .collect();
        Self { entries }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Highest-scoring comparable candidate; ties keep the earliest one.
    ///
    /// `None` when the reference is not a string or no candidate is
    /// comparable.
    pub fn best_match(&self, reference: &Value) -> Option<BestMatch<'a>> {
        let reference = normalize(reference.as_str()?);

        let mut best: Option<BestMatch<'a>> = None;
        for (index, entry) in self.entries.iter().enumerate() {
            let Some((original, normalized)) = entry else {
                continue;
            };
            let score = ratio(&reference, normalized);
            if best.as_ref().map_or(true, |b| score > b.score) {
                best = Some(BestMatch {
                    index,
                    value: *original,
                    score,
                });
            }
        }
        best
    }
}

/// Best match of `reference` among `candidates`.
pub fn best_match<'a>(
    reference: &Value,
    candidates: impl IntoIterator<Item = &'a Value>,
) -> Option<BestMatch<'a>> {
    Choices::new(candidates).best_match(reference)
}

/// Threshold policy applied on top of [`best_match`].
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FuzzyMatcher {
    threshold: f64,
}

impl FuzzyMatcher {
    pub fn new(threshold: f64) -> Self {
        Self { threshold }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    /// Boundary inclusive.
    pub fn is_match(&self, score: f64) -> bool {
        score >= self.threshold
    }

    /// Best match, kept only if it meets the threshold.
    pub fn find<'a>(&self, reference: &Value, choices: &Choices<'a>) -> Option<BestMatch<'a>> {
        choices
            .best_match(reference)
            .filter(|m| self.is_match(m.score))
    }
}

impl Default for FuzzyMatcher {
    fn default() -> Self {
        Self::new(DEFAULT_THRESHOLD)
    }
}
