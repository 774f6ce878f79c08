// Transaction records flowing through the pipeline
//
// Each stage returns a new, richer record instead of mutating the previous
// one: Transaction -> GroupedTransaction -> CategorizedTransaction.

use chrono::{DateTime, FixedOffset};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

// ============================================================================
// TRANSACTION
// ============================================================================

/// Validated transaction, produced from one deduplicated raw record
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    /// Unique after deduplication
    #[serde(rename = "transactionId")]
    pub transaction_id: String,

    /// Booking time, timezone-aware
    pub datetime: DateTime<FixedOffset>,

    /// Signed amount: positive = money in, negative = money out
    pub amount: Decimal,

    /// Merged narrative, lower-cased and whitespace-normalized
    #[serde(rename = "referenceText")]
    pub reference_text: String,

    #[serde(rename = "bankTransactionCode")]
    pub bank_transaction_code: String,
}

impl Transaction {
    pub fn new(
        transaction_id: impl Into<String>,
        datetime: DateTime<FixedOffset>,
        amount: Decimal,
        reference_text: &str,
        bank_transaction_code: impl Into<String>,
    ) -> Self {
        Transaction {
            transaction_id: transaction_id.into(),
            datetime,
            amount,
            reference_text: normalize_reference_text(reference_text),
            bank_transaction_code: bank_transaction_code.into(),
        }
    }

    pub fn is_credit(&self) -> bool {
        self.amount > Decimal::ZERO
    }

    pub fn is_debit(&self) -> bool {
        self.amount < Decimal::ZERO
    }

    /// Attach the clustering result, producing the next record
    pub fn with_group(self, group_number: usize, group_name: impl Into<String>) -> GroupedTransaction {
        GroupedTransaction {
            transaction: self,
            group_number,
            group_name: group_name.into(),
        }
    }
}

impl AsRef<Transaction> for Transaction {
    fn as_ref(&self) -> &Transaction {
        self
    }
}

/// Lower-case and collapse runs of whitespace to a single space
pub fn normalize_reference_text(text: &str) -> String {
    text.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

// ============================================================================
// GROUPED TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupedTransaction {
    #[serde(flatten)]
    pub transaction: Transaction,

    #[serde(rename = "groupNumber")]
    pub group_number: usize,

    #[serde(rename = "groupName")]
    pub group_name: String,
}

impl GroupedTransaction {
    pub fn with_category(self, custom_category: impl Into<String>) -> CategorizedTransaction {
        CategorizedTransaction {
            grouped: self,
            custom_category: custom_category.into(),
        }
    }
}

impl AsRef<Transaction> for GroupedTransaction {
    fn as_ref(&self) -> &Transaction {
        &self.transaction
    }
}

// ============================================================================
// CATEGORIZED TRANSACTION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategorizedTransaction {
    #[serde(flatten)]
    pub grouped: GroupedTransaction,

    #[serde(rename = "customCategory")]
    pub custom_category: String,
}

impl CategorizedTransaction {
    pub fn group_number(&self) -> usize {
        self.grouped.group_number
    }

    pub fn group_name(&self) -> &str {
        &self.grouped.group_name
    }
}

impl AsRef<Transaction> for CategorizedTransaction {
    fn as_ref(&self) -> &Transaction {
        &self.grouped.transaction
    }
}

// ============================================================================
// TESTS
// ============================================================================
