// 🧩 Reference Clustering Engine
// Single-pass, greedy, order-dependent grouping of transactions by how similar
// their (normalized) references are. No backtracking, no re-clustering: the
// same ordered input always yields the same groups.

use crate::config::UserConfiguration;
use crate::similarity::{metric_for, JaroWinkler, SimilarityMetric};
use crate::transaction::{GroupedTransaction, Transaction};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Join a group when the least similar member is above this ratio...
pub const MIN_RATIO_THRESHOLD: f64 = 0.55;

/// ...or when the most similar member is above this one.
pub const MAX_RATIO_THRESHOLD: f64 = 0.8;

/// Words kept in a group's display name
pub const GROUP_NAME_WORDS: usize = 10;

/// Runs of 4+ digits are card numbers, references, dates; never merchant text
static DIGIT_RUN: Lazy<Option<Regex>> = Lazy::new(|| Regex::new(r"\d{4,}").ok());

// ============================================================================
// NORMALIZATION
// ============================================================================

#[derive(Debug, Clone, Default)]
pub struct ReferenceNormalizer {
    noise: Vec<String>,
}

impl ReferenceNormalizer {
    pub fn new(noise: Vec<String>) -> Self {
        let noise = noise
            .into_iter()
            .map(|n| n.to_lowercase())
            .filter(|n| !n.is_empty())
            .collect();
        ReferenceNormalizer { noise }
    }

    /// Strip every noise substring, then every run of 4+ digits
    pub fn normalize(&self, reference: &str) -> String {
        let mut cleaned = reference.to_string();
        for noise in &self.noise {
            cleaned = cleaned.replace(noise.as_str(), "");
        }

        match DIGIT_RUN.as_ref() {
            Some(pattern) => pattern.replace_all(&cleaned, "").into_owned(),
            None => cleaned,
        }
    }
}

// ============================================================================
// GROUPS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransactionGroup {
    /// Zero-based, in creation order
    pub number: usize,

    /// Display name: most frequent words of the normalized references
    pub name: String,

    /// References as they appear on the member transactions, in assignment order
    pub references: Vec<String>,

    /// Normalized forms of `references`, used for comparison and naming
    pub normalized: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct GroupingResult {
    pub transactions: Vec<GroupedTransaction>,
    pub groups: Vec<TransactionGroup>,
}

impl GroupingResult {
    pub fn group(&self, number: usize) -> Option<&TransactionGroup> {
        self.groups.get(number)
    }
}

#[derive(Debug, Clone, Copy)]
struct SimilarityStats {
    min: f64,
    max: f64,
}

// ============================================================================
// CLUSTERING ENGINE
// ============================================================================

pub struct ClusteringEngine {
    normalizer: ReferenceNormalizer,
    metric: Box<dyn SimilarityMetric>,
}

impl ClusteringEngine {
    pub fn new(normalizer: ReferenceNormalizer, metric: Box<dyn SimilarityMetric>) -> Self {
        ClusteringEngine { normalizer, metric }
    }

    pub fn from_config(config: &UserConfiguration) -> Self {
        Self::new(
            ReferenceNormalizer::new(config.filter_reference_words_for_grouping.clone()),
            metric_for(config.similarity_metric),
        )
    }

    /// Group index for each reference, plus the member indexes of each group
    pub fn assign(&self, references: &[&str]) -> (Vec<usize>, Vec<Vec<usize>>) {
        let normalized: Vec<String> = references
            .iter()
            .map(|r| self.normalizer.normalize(r))
            .collect();

        let mut groups: Vec<Vec<usize>> = Vec::new();
        let mut assignment = Vec::with_capacity(references.len());

        for (index, reference) in normalized.iter().enumerate() {
            let joined = groups.iter().position(|members| {
                let stats = self.similarity_stats(reference, members.iter().map(|&m| normalized[m].as_str()));
                stats.min > MIN_RATIO_THRESHOLD || stats.max > MAX_RATIO_THRESHOLD
            });

            match joined {
                Some(group) => {
                    groups[group].push(index);
                    assignment.push(group);
                }
                None => {
                    assignment.push(groups.len());
                    groups.push(vec![index]);
                }
            }
        }

        (assignment, groups)
    }

    /// Annotate every transaction with its group number and name
    pub fn group_transactions(&self, transactions: Vec<Transaction>) -> GroupingResult {
        let references: Vec<&str> = transactions
            .iter()
            .map(|t| t.reference_text.as_str())
            .collect();
        let (assignment, members) = self.assign(&references);

        let groups: Vec<TransactionGroup> = members
            .iter()
            .enumerate()
            .map(|(number, indexes)| {
                let references: Vec<String> = indexes
                    .iter()
                    .map(|&i| transactions[i].reference_text.clone())
                    .collect();
                let normalized: Vec<String> = references
                    .iter()
                    .map(|r| self.normalizer.normalize(r))
                    .collect();
                TransactionGroup {
                    number,
                    name: group_name(&normalized),
                    references,
                    normalized,
                }
            })
            .collect();

        tracing::info!(
            transactions = transactions.len(),
            groups = groups.len(),
            "transactions grouped by reference similarity"
        );

        let transactions = transactions
            .into_iter()
            .zip(assignment)
            .map(|(transaction, number)| {
                let name = groups[number].name.clone();
                transaction.with_group(number, name)
            })
            .collect();

        GroupingResult { transactions, groups }
    }

    fn similarity_stats<'a>(&self, reference: &str, members: impl Iterator<Item = &'a str>) -> SimilarityStats {
        members.fold(
            SimilarityStats {
                min: f64::INFINITY,
                max: f64::NEG_INFINITY,
            },
            |stats, member| {
                let ratio = self.metric.ratio(reference, member);
                SimilarityStats {
                    min: stats.min.min(ratio),
                    max: stats.max.max(ratio),
                }
            },
        )
    }
}

impl Default for ClusteringEngine {
    fn default() -> Self {
        Self::new(ReferenceNormalizer::default(), Box::new(JaroWinkler))
    }
}

/// Top words by frequency across the group; equal counts keep first-seen order
pub fn group_name<S: AsRef<str>>(normalized_references: &[S]) -> String {
    let mut order: Vec<&str> = Vec::new();
    let mut counts: HashMap<&str, usize> = HashMap::new();

    for word in normalized_references
        .iter()
        .flat_map(|reference| reference.as_ref().split_whitespace())
    {
        let count = counts.entry(word).or_insert(0);
        if *count == 0 {
            order.push(word);
        }
        *count += 1;
    }

    // stable sort keeps first-seen order among ties
    order.sort_by(|a, b| counts[b].cmp(&counts[a]));
    order
        .into_iter()
        .take(GROUP_NAME_WORDS)
        .collect::<Vec<_>>()
        .join(" ")
}

// ============================================================================
// TESTS
// ============================================================================
