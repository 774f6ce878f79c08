// 🔁 Internal Transfer Matcher
// Removes offsetting pairs that are money moving between the user's own accounts.
//
// A pair is: both references contain an internal marker, amounts cancel out
// exactly, and the booking times are strictly closer than the bank
// processing window. Pairing is single-pass in input order.

use crate::config::UserConfiguration;
use crate::transaction::Transaction;
use chrono::Duration;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// A detected pair, by transaction id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferPair {
    /// The transaction whose scan found the pair
    pub initiator: String,
    pub counterpart: String,
}

#[derive(Debug, Clone)]
pub struct TransferMatcher {
    markers: Vec<String>,
    window: Duration,
}

impl TransferMatcher {
    pub fn new(markers: Vec<String>, window: Duration) -> Self {
        let markers = markers
            .into_iter()
            .map(|m| m.to_lowercase())
            .filter(|m| !m.is_empty())
            .collect();
        TransferMatcher { markers, window }
    }

    pub fn from_config(config: &UserConfiguration) -> Self {
        Self::new(
            config.internal_transfer_references.clone(),
            config.processing_window(),
        )
    }

    /// Non-zero amount and at least one marker in the reference
    pub fn is_transfer_shaped(&self, transaction: &Transaction) -> bool {
        transaction.amount != Decimal::ZERO
            && self
                .markers
                .iter()
                .any(|marker| transaction.reference_text.contains(marker.as_str()))
    }

    /// Detect pairs. Each transaction is consumed by at most one pair; with several
    /// candidates the first in list order is taken.
    pub fn find_pairs<T: AsRef<Transaction>>(&self, transactions: &[T]) -> Vec<(usize, usize)> {
        let mut consumed: HashSet<usize> = HashSet::new();
        let mut pairs = Vec::new();

        for (index, current) in transactions.iter().map(AsRef::as_ref).enumerate() {
            if consumed.contains(&index) || !self.is_transfer_shaped(current) {
                continue;
            }

            let candidates: Vec<usize> = transactions
                .iter()
                .map(AsRef::as_ref)
                .enumerate()
                .filter(|(other_index, other)| {
                    *other_index != index
                        && !consumed.contains(other_index)
                        && self.is_transfer_shaped(other)
                        && current.amount == -other.amount
                        && (current.datetime - other.datetime).abs() < self.window
                })
                .map(|(other_index, _)| other_index)
                .collect();

            let Some(&chosen) = candidates.first() else {
                continue;
            };

            if candidates.len() > 1 {
                tracing::warn!(
                    transaction_id = %current.transaction_id,
                    candidates = candidates.len(),
                    "ambiguous internal transfer, pairing with the first candidate"
                );
            }

            consumed.insert(index);
            consumed.insert(chosen);
            pairs.push((index, chosen));

            tracing::info!(
                initiator = %current.transaction_id,
                counterpart = %transactions[chosen].as_ref().transaction_id,
                amount = %current.amount,
                "internal transfer pair detected"
            );
        }

        pairs
    }

    /// Detected pairs by transaction id
    pub fn detect<T: AsRef<Transaction>>(&self, transactions: &[T]) -> Vec<TransferPair> {
        self.find_pairs(transactions)
            .into_iter()
            .map(|(a, b)| TransferPair {
                initiator: transactions[a].as_ref().transaction_id.clone(),
                counterpart: transactions[b].as_ref().transaction_id.clone(),
            })
            .collect()
    }

    /// Input minus every paired transaction, order preserved
    pub fn remove_internal_transfers<T: AsRef<Transaction> + Clone>(&self, transactions: &[T]) -> Vec<T> {
        let consumed: HashSet<usize> = self
            .find_pairs(transactions)
            .into_iter()
            .flat_map(|(a, b)| [a, b])
            .collect();

        transactions
            .iter()
            .enumerate()
            .filter(|(index, _)| !consumed.contains(index))
            .map(|(_, transaction)| transaction.clone())
            .collect()
    }
}

// ============================================================================
// TESTS
// ============================================================================
