// 🔍 Deduplication Engine - Collapse overlapping fetch snapshots
// One record per logical transaction id, chosen by completeness.

use crate::parser::{derive_id, RawTransaction};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::HashMap;
use uuid::Uuid;

// ============================================================================
// DUPLICATE SET
// ============================================================================

/// Records that resolved to the same logical id
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DuplicateSet {
    pub logical_id: String,

    /// Index (into the input) of the record that was kept
    pub kept: usize,

    /// Indexes of the records that were dropped, in input order
    pub dropped: Vec<usize>,
}

/// Logical id per input record, plus the random provider ids generated for
/// records that arrived without any id
struct Resolution {
    ids: Vec<String>,
    stamps: HashMap<usize, String>,
}

// ============================================================================
// DEDUPLICATION ENGINE
// ============================================================================

#[derive(Debug, Default)]
pub struct DeduplicationEngine;

impl DeduplicationEngine {
    pub fn new() -> Self {
        DeduplicationEngine
    }

    /// Keep one record per logical id, in first-seen order.
    ///
    /// Records without any id get a random provider id stamped on the returned
    /// copy, so deriving their id again later gives the same answer and the
    /// output is a fixed point of this function.
    pub fn dedupe(&self, records: &[RawTransaction]) -> Vec<RawTransaction> {
        let resolution = self.resolve(records);

        self.group(records, &resolution)
            .into_iter()
            .map(|set| {
                if !set.dropped.is_empty() {
                    tracing::info!(
                        logical_id = %set.logical_id,
                        kept = set.kept,
                        dropped = ?set.dropped,
                        "deduplicating records"
                    );
                }
                stamp(&records[set.kept], resolution.stamps.get(&set.kept))
            })
            .collect()
    }

    /// Every logical id that more than one record resolved to
    pub fn find_duplicates(&self, records: &[RawTransaction]) -> Vec<DuplicateSet> {
        let resolution = self.resolve(records);

        self.group(records, &resolution)
            .into_iter()
            .filter(|set| !set.dropped.is_empty())
            .collect()
    }

    fn resolve(&self, records: &[RawTransaction]) -> Resolution {
        let mut ids: Vec<Option<String>> = records
            .iter()
            .map(|r| r.has_identity().then(|| r.logical_id()))
            .collect();
        let mut stamps = HashMap::new();

        // Most complete id-less records first, so a later subset can attach to them
        let mut id_less: Vec<usize> = (0..records.len())
            .filter(|&i| ids[i].is_none())
            .collect();
        id_less.sort_by(|&a, &b| records[b].populated_fields().cmp(&records[a].populated_fields()));

        for i in id_less {
            // A record missing its datetime or reference must stay visible to validation
            let subsumer = if records[i].is_well_formed() {
                (0..records.len()).find(|&j| {
                    j != i && ids[j].is_some() && records[i].is_subsumed_by(&records[j])
                })
            } else {
                None
            };

            let id = match subsumer {
                Some(j) => {
                    tracing::debug!(record = i, joined = j, "id-less record subsumed by another record");
                    if let Some(stamp) = stamps.get(&j).cloned() {
                        stamps.insert(i, stamp);
                    }
                    ids[j].clone()
                }
                None => {
                    let stamp = Uuid::new_v4().to_string();
                    let amount = &records[i].transaction_amount;
                    let id = derive_id(&stamp, amount.amount, &amount.currency);
                    tracing::debug!(record = i, logical_id = %id, "generated id for id-less record");
                    stamps.insert(i, stamp);
                    Some(id)
                }
            };
            ids[i] = id;
        }

        Resolution {
            ids: ids.into_iter().map(Option::unwrap_or_default).collect(),
            stamps,
        }
    }

    fn group(&self, records: &[RawTransaction], resolution: &Resolution) -> Vec<DuplicateSet> {
        let mut order: Vec<(String, Vec<usize>)> = Vec::new();
        let mut position: HashMap<&str, usize> = HashMap::new();

        for (index, id) in resolution.ids.iter().enumerate() {
            match position.get(id.as_str()) {
                Some(&slot) => order[slot].1.push(index),
                None => {
                    position.insert(id.as_str(), order.len());
                    order.push((id.clone(), vec![index]));
                }
            }
        }

        order
            .into_iter()
            .map(|(logical_id, members)| {
                let kept = pick_representative(records, &members);
                let dropped = members.into_iter().filter(|&m| m != kept).collect();
                DuplicateSet {
                    logical_id,
                    kept,
                    dropped,
                }
            })
            .collect()
    }
}

/// Most populated fields wins; ties go to the smallest canonical form
fn pick_representative(records: &[RawTransaction], members: &[usize]) -> usize {
    members
        .iter()
        .copied()
        .min_by(|&a, &b| compare_completeness(&records[a], &records[b]))
        .unwrap_or(members[0])
}

fn compare_completeness(a: &RawTransaction, b: &RawTransaction) -> Ordering {
    b.populated_fields()
        .cmp(&a.populated_fields())
        .then_with(|| a.canonical_form().cmp(&b.canonical_form()))
}

fn stamp(record: &RawTransaction, stamp: Option<&String>) -> RawTransaction {
    let mut out = record.clone();
    if !out.has_identity() {
        if let Some(id) = stamp {
            out.internal_transaction_id = Some(id.clone());
        }
    }
    out
}

// ============================================================================
// TESTS
// ============================================================================
