// 🔤 Reference Similarity
// Ratios used to cluster transaction references. Every metric returns a value
// in [0, 1], is symmetric, and gives 1.0 for identical inputs.

use crate::config::SimilarityMetricKind;
use std::collections::HashMap;

/// Winkler prefix bonus per shared leading character.
pub const PREFIX_SCALE: f64 = 0.1;

/// At most this many leading characters earn the prefix bonus.
pub const MAX_PREFIX: usize = 4;

/// Sequences at least this long get their very frequent characters ignored
/// when seeding matches.
const POPULAR_THRESHOLD: usize = 200;

pub trait SimilarityMetric: Send + Sync {
    fn ratio(&self, a: &str, b: &str) -> f64;
}

pub fn metric_for(kind: SimilarityMetricKind) -> Box<dyn SimilarityMetric> {
    match kind {
        SimilarityMetricKind::JaroWinkler => Box::new(JaroWinkler),
        SimilarityMetricKind::MatchingBlocks => Box::new(MatchingBlocks),
    }
}

// ============================================================================
// JARO-WINKLER
// ============================================================================

/// Jaro similarity with the Winkler common-prefix boost, applied unconditionally.
/// Greedy match counting can differ by argument order, so pairs are evaluated
/// in canonical order.
#[derive(Debug, Clone, Copy, Default)]
pub struct JaroWinkler;

impl SimilarityMetric for JaroWinkler {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let (a, b) = canonical_pair(a, b);
        let jaro = jaro(a, b);
        let prefix = a
            .chars()
            .zip(b.chars())
            .take(MAX_PREFIX)
            .take_while(|(x, y)| x == y)
            .count();

        (jaro + prefix as f64 * PREFIX_SCALE * (1.0 - jaro)).min(1.0)
    }
}

pub fn jaro(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let window = (a.len().max(b.len()) / 2).saturating_sub(1);
    let mut b_matched = vec![false; b.len()];
    let mut a_matches = Vec::new();

    for (i, ca) in a.iter().enumerate() {
        let lo = i.saturating_sub(window);
        let hi = (i + window + 1).min(b.len());
        for j in lo..hi {
            if !b_matched[j] && b[j] == *ca {
                b_matched[j] = true;
                a_matches.push(*ca);
                break;
            }
        }
    }

    let matches = a_matches.len();
    if matches == 0 {
        return 0.0;
    }

    let b_matches = b
        .iter()
        .zip(b_matched.iter())
        .filter(|(_, matched)| **matched)
        .map(|(c, _)| *c);
    let half_transpositions = a_matches
        .iter()
        .zip(b_matches)
        .filter(|(x, y)| **x != *y)
        .count();

    let m = matches as f64;
    let t = half_transpositions as f64 / 2.0;
    (m / a.len() as f64 + m / b.len() as f64 + (m - t) / m) / 3.0
}

// ============================================================================
// MATCHING BLOCKS (Ratcliff/Obershelp)
// ============================================================================

/// `2 * M / (|a| + |b|)` where M is the size of the recursively found longest
/// common blocks. The raw measure depends on argument order, so pairs are
/// evaluated in a canonical order (shorter first, then lexicographic).
#[derive(Debug, Clone, Copy, Default)]
pub struct MatchingBlocks;

impl SimilarityMetric for MatchingBlocks {
    fn ratio(&self, a: &str, b: &str) -> f64 {
        let (first, second) = canonical_pair(a, b);
        matching_blocks_ratio(first, second)
    }
}

fn canonical_pair<'a>(a: &'a str, b: &'a str) -> (&'a str, &'a str) {
    if (a.chars().count(), a) <= (b.chars().count(), b) {
        (a, b)
    } else {
        (b, a)
    }
}

pub fn matching_blocks_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    let matcher = BlockMatcher::new(&a, &b);
    2.0 * matcher.matched_characters() as f64 / total as f64
}

struct BlockMatcher<'a> {
    a: &'a [char],
    b: &'a [char],
    /// Positions of each character in `b`
    b2j: HashMap<char, Vec<usize>>,
}

impl<'a> BlockMatcher<'a> {
    fn new(a: &'a [char], b: &'a [char]) -> Self {
        let mut b2j: HashMap<char, Vec<usize>> = HashMap::new();
        for (j, c) in b.iter().enumerate() {
            b2j.entry(*c).or_default().push(j);
        }

        if b.len() >= POPULAR_THRESHOLD {
            let limit = b.len() / 100 + 1;
            b2j.retain(|_, positions| positions.len() <= limit);
        }

        BlockMatcher { a, b, b2j }
    }

    fn longest_match(&self, alo: usize, ahi: usize, blo: usize, bhi: usize) -> (usize, usize, usize) {
        let (mut best_i, mut best_j, mut best_size) = (alo, blo, 0);
        let mut j2len: HashMap<usize, usize> = HashMap::new();

        for i in alo..ahi {
            let mut next_j2len = HashMap::new();
            if let Some(positions) = self.b2j.get(&self.a[i]) {
                for &j in positions {
                    if j < blo {
                        continue;
                    }
                    if j >= bhi {
                        break;
                    }
                    let k = if j == 0 { 0 } else { j2len.get(&(j - 1)).copied().unwrap_or(0) } + 1;
                    next_j2len.insert(j, k);
                    if k > best_size {
                        best_i = i + 1 - k;
                        best_j = j + 1 - k;
                        best_size = k;
                    }
                }
            }
            j2len = next_j2len;
        }

        // Popular characters were left out of b2j; grow the block over them
        while best_i > alo && best_j > blo && self.a[best_i - 1] == self.b[best_j - 1] {
            best_i -= 1;
            best_j -= 1;
            best_size += 1;
        }
        while best_i + best_size < ahi
            && best_j + best_size < bhi
            && self.a[best_i + best_size] == self.b[best_j + best_size]
        {
            best_size += 1;
        }

        (best_i, best_j, best_size)
    }

    fn matched_characters(&self) -> usize {
        let mut queue = vec![(0, self.a.len(), 0, self.b.len())];
        let mut matched = 0;

        while let Some((alo, ahi, blo, bhi)) = queue.pop() {
            let (i, j, k) = self.longest_match(alo, ahi, blo, bhi);
            if k == 0 {
                continue;
            }
            matched += k;
            if alo < i && blo < j {
                queue.push((alo, i, blo, j));
            }
            if i + k < ahi && j + k < bhi {
                queue.push((i + k, ahi, j + k, bhi));
            }
        }

        matched
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_identical_strings_score_one() {
        for metric in [metric_for(SimilarityMetricKind::JaroWinkler), metric_for(SimilarityMetricKind::MatchingBlocks)] {
            assert!(close(metric.ratio("tesco express", "tesco express"), 1.0));
            assert!(close(metric.ratio("", ""), 1.0));
        }
    }

    #[test]
    fn test_disjoint_strings_score_zero() {
        assert!(close(JaroWinkler.ratio("abc", "xyz"), 0.0));
        assert!(close(MatchingBlocks.ratio("abc", "xyz"), 0.0));
        assert!(close(JaroWinkler.ratio("abc", ""), 0.0));
    }

    #[test]
    fn test_jaro_reference_values() {
        // Classic textbook pairs
        assert!((jaro("martha", "marhta") - 0.944444).abs() < 1e-5);
        assert!((JaroWinkler.ratio("martha", "marhta") - 0.961111).abs() < 1e-5);
        assert!((jaro("dixon", "dicksonx") - 0.766667).abs() < 1e-5);
    }

    #[test]
    fn test_shared_prefix_is_rewarded() {
        let ratio = JaroWinkler.ratio("ikea dublin", "ikea cork");
        assert!(ratio > 0.8, "got {ratio}");
        assert!(JaroWinkler.ratio("ikea dublin", "tesco express") < 0.55);
    }

    #[test]
    fn test_matching_blocks_reference_values() {
        // Longest block "ikea " then nothing in common on the right
        assert!(close(matching_blocks_ratio("ikea dublin", "ikea cork"), 0.5));
        assert!(close(matching_blocks_ratio("abcd", "bcde"), 0.75));
    }

    #[test]
    fn test_metrics_are_symmetric() {
        let pairs = [
            ("spotify premium", "spotify family"),
            ("abcd", "dcba"),
            ("tesco express 1234", "express tesco"),
        ];
        for (a, b) in pairs {
            assert!(close(JaroWinkler.ratio(a, b), JaroWinkler.ratio(b, a)));
            assert!(close(MatchingBlocks.ratio(a, b), MatchingBlocks.ratio(b, a)));
        }
    }

    #[test]
    fn test_ratios_stay_in_unit_interval() {
        let long_a = "a".repeat(250) + "b";
        let long_b = "a".repeat(240) + "c";
        for metric in [metric_for(SimilarityMetricKind::JaroWinkler), metric_for(SimilarityMetricKind::MatchingBlocks)] {
            let ratio = metric.ratio(&long_a, &long_b);
            assert!((0.0..=1.0).contains(&ratio), "got {ratio}");
        }
    }
}
