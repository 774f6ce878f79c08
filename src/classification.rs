// 💰 Transaction Type Classifier
// Splits transactions into income and expense sides for reporting.

use crate::config::UserConfiguration;
use crate::transaction::Transaction;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum TransactionType {
    Income,
    Expense,
    Unknown,
}

#[derive(Debug, Clone, Default)]
pub struct TransactionClassifier {
    income_references: Vec<String>,
    income_codes: Vec<String>,
    expense_codes: Vec<String>,
}

impl TransactionClassifier {
    pub fn new(income_references: Vec<String>, income_codes: Vec<String>, expense_codes: Vec<String>) -> Self {
        TransactionClassifier {
            income_references: income_references
                .into_iter()
                .map(|r| r.to_lowercase())
                .filter(|r| !r.is_empty())
                .collect(),
            income_codes,
            expense_codes,
        }
    }

    pub fn from_config(config: &UserConfiguration) -> Self {
        Self::new(
            config.income_references.clone(),
            config.income_transaction_codes.clone(),
            config.expense_transaction_codes.clone(),
        )
    }

    pub fn classify(&self, transaction: &Transaction) -> TransactionType {
        if self.is_income(transaction) {
            TransactionType::Income
        } else if self.is_expense(transaction) {
            TransactionType::Expense
        } else {
            TransactionType::Unknown
        }
    }

    /// Money in whose reference names an income source, or whose bank code was
    /// explicitly configured as income
    pub fn is_income(&self, transaction: &Transaction) -> bool {
        transaction.is_credit()
            && (self
                .income_references
                .iter()
                .any(|r| transaction.reference_text.contains(r.as_str()))
                || self.income_codes.contains(&transaction.bank_transaction_code))
    }

    pub fn is_expense(&self, transaction: &Transaction) -> bool {
        transaction.is_debit() && self.expense_codes.contains(&transaction.bank_transaction_code)
    }

    /// `(income, expense)`; unknown transactions follow the expenses
    pub fn split(&self, transactions: Vec<Transaction>) -> (Vec<Transaction>, Vec<Transaction>) {
        let mut income = Vec::new();
        let mut expense = Vec::new();
        let mut unknown = Vec::new();

        for transaction in transactions {
            match self.classify(&transaction) {
                TransactionType::Income => income.push(transaction),
                TransactionType::Expense => expense.push(transaction),
                TransactionType::Unknown => unknown.push(transaction),
            }
        }

        if !unknown.is_empty() {
            tracing::info!(count = unknown.len(), "unknown-type transactions reported as expenses");
        }
        expense.extend(unknown);
        (income, expense)
    }
}
