// 🏷️ Categorization Rules - Rules as Data
// Tag and keyword rules from the user configuration, applied in fixed precedence:
// tag on the transaction's own reference, then keyword on the group's
// references, then a deterministic fallback derived from the group name.

use crate::config::{CategoryDefinition, UserConfiguration};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use uuid::Uuid;

/// Namespace for fallback category ids
pub const FALLBACK_NAMESPACE: Uuid = Uuid::from_u128(0xd705d48e_6833_4b96_bb38_5d95a197bb7f);

// ============================================================================
// CATEGORY INDEX
// ============================================================================

/// Inverted indexes from lowercased tag/keyword to category name
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CategoryIndex {
    pub tags: BTreeMap<String, String>,
    pub references: BTreeMap<String, String>,
}

impl CategoryIndex {
    /// Expense definitions are indexed before income ones; a token claimed by
    /// two categories ends up with the later one
    pub fn build(expense: &[CategoryDefinition], income: &[CategoryDefinition]) -> Self {
        let mut index = CategoryIndex::default();

        for definition in expense.iter().chain(income) {
            for tag in &definition.tags {
                insert_token(&mut index.tags, tag, &definition.name);
            }
            for reference in &definition.references {
                insert_token(&mut index.references, reference, &definition.name);
            }
        }

        tracing::debug!(
            tags = index.tags.len(),
            references = index.references.len(),
            "category index built"
        );
        index
    }
}

fn insert_token(map: &mut BTreeMap<String, String>, token: &str, category: &str) {
    let key = token.to_lowercase();
    if key.is_empty() {
        return;
    }

    if let Some(previous) = map.insert(key.clone(), category.to_string()) {
        if previous != category {
            tracing::warn!(
                token = %key,
                previous = %previous,
                category = %category,
                "token claimed by two categories, keeping the later one"
            );
        }
    }
}

// ============================================================================
// CATEGORIZATION RESULT
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MatchSource {
    Tag,
    GroupReference,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Categorization {
    pub category: String,
    pub source: MatchSource,
}

// ============================================================================
// CATEGORY ENGINE
// ============================================================================

pub struct CategoryEngine {
    config: Arc<UserConfiguration>,
}

impl CategoryEngine {
    pub fn new(config: Arc<UserConfiguration>) -> Self {
        CategoryEngine { config }
    }

    /// Category for one transaction. `group_references` are the references of
    /// every member of the transaction's group, `fallback` is the group name.
    pub fn categorize(&self, reference: &str, group_references: &[String], fallback: &str) -> Categorization {
        if let Some(category) = self.tag_match(reference) {
            return Categorization {
                category,
                source: MatchSource::Tag,
            };
        }

        if let Some(category) = self.group_reference_match(group_references) {
            return Categorization {
                category,
                source: MatchSource::GroupReference,
            };
        }

        Categorization {
            category: fallback_category(fallback),
            source: MatchSource::Fallback,
        }
    }

    /// Category of any configured tag found in the reference
    pub fn tag_match(&self, reference: &str) -> Option<String> {
        let haystack = reference.to_lowercase();
        first_match(&self.config.category_index().tags, &haystack, "tag")
    }

    /// Category of any keyword found in the group's references, concatenated
    /// without a separator
    pub fn group_reference_match(&self, group_references: &[String]) -> Option<String> {
        let haystack = group_references.concat().to_lowercase();
        first_match(&self.config.category_index().references, &haystack, "group reference")
    }
}

/// Smallest matching category name; several distinct matches are logged
fn first_match(index: &BTreeMap<String, String>, haystack: &str, kind: &str) -> Option<String> {
    let matches: BTreeSet<&str> = index
        .iter()
        .filter(|(token, _)| haystack.contains(token.as_str()))
        .map(|(_, category)| category.as_str())
        .collect();

    if matches.len() > 1 {
        tracing::info!(
            kind,
            candidates = ?matches,
            "several categories match, taking the first in name order"
        );
    }

    matches.into_iter().next().map(str::to_string)
}

/// `<fallback>.<uuid5(FALLBACK_NAMESPACE, fallback)>`, stable across runs
pub fn fallback_category(fallback: &str) -> String {
    let id = Uuid::new_v5(&FALLBACK_NAMESPACE, fallback.as_bytes());
    format!("{}.{}", fallback, id)
}

// ============================================================================
// TESTS
// ============================================================================
