// 📊 Aggregator - amount and contributing references per key
// One fold over the input in first-seen key order, then a stable sort by amount.

use crate::transaction::Transaction;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::hash::Hash;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AmountSummary<K> {
    pub key: K,
    pub amount: Decimal,

    /// Reference of every contributing transaction, in input order
    pub references: Vec<String>,

    /// Per-key enrichment fields, serialized next to the fixed ones
    #[serde(flatten)]
    pub context: Map<String, Value>,
}

/// Group by `key`, summing amounts and collecting references. Entries come out
/// ascending by amount; equal amounts keep first-seen key order.
pub fn sum_amount_by<T, K, F, C>(transactions: &[T], key: F, context: C) -> Vec<AmountSummary<K>>
where
    T: AsRef<Transaction>,
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
    C: Fn(&K) -> Map<String, Value>,
{
    let mut summaries: Vec<AmountSummary<K>> = Vec::new();
    let mut slots: HashMap<K, usize> = HashMap::new();

    for transaction in transactions {
        let k = key(transaction);
        let inner = transaction.as_ref();

        let slot = *slots.entry(k.clone()).or_insert_with(|| {
            summaries.push(AmountSummary {
                key: k.clone(),
                amount: Decimal::ZERO,
                references: Vec::new(),
                context: Map::new(),
            });
            summaries.len() - 1
        });

        let summary = &mut summaries[slot];
        summary.amount += inner.amount;
        summary.references.push(inner.reference_text.clone());
    }

    for summary in summaries.iter_mut() {
        summary.context = context(&summary.key);
    }

    summaries.sort_by(|a, b| a.amount.cmp(&b.amount));
    summaries
}

/// `sum_amount_by` without enrichment
pub fn sum_amount_by_key<T, K, F>(transactions: &[T], key: F) -> Vec<AmountSummary<K>>
where
    T: AsRef<Transaction>,
    K: Eq + Hash + Clone,
    F: Fn(&T) -> K,
{
    sum_amount_by(transactions, key, |_| Map::new())
}

pub fn sum_amount<T: AsRef<Transaction>>(transactions: &[T]) -> Decimal {
    transactions.iter().map(|t| t.as_ref().amount).sum()
}
