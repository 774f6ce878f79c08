// 🔄 Report Pipeline
// raw records -> dedupe -> validate -> drop internal transfers -> time filter
// -> income/expense split -> cluster -> categorize -> aggregate

use crate::aggregation::{sum_amount, sum_amount_by, sum_amount_by_key, AmountSummary};
use crate::classification::TransactionClassifier;
use crate::config::UserConfiguration;
use crate::deduplication::DeduplicationEngine;
use crate::error::PipelineResult;
use crate::grouping::{ClusteringEngine, TransactionGroup};
use crate::parser::RawTransaction;
use crate::rules::CategoryEngine;
use crate::temporal::TimeRange;
use crate::transaction::{CategorizedTransaction, Transaction};
use crate::transfers::{TransferMatcher, TransferPair};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::{json, Map};
use std::sync::Arc;

// ============================================================================
// REPORT MODELS
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BalanceSummary {
    pub start_time: String,
    pub end_time: String,
    pub total_income: Decimal,
    pub total_expense: Decimal,
    pub total_balance: Decimal,
}

/// Everything reported for one side (income or expense)
#[derive(Debug, Clone)]
pub struct SideReport {
    /// Keyed by group number, enriched with `groupName`
    pub per_group: Vec<AmountSummary<usize>>,
    pub per_category: Vec<AmountSummary<String>>,
    pub transactions: Vec<CategorizedTransaction>,
    pub groups: Vec<TransactionGroup>,
}

impl SideReport {
    pub fn total(&self) -> Decimal {
        sum_amount(&self.transactions)
    }
}

#[derive(Debug, Clone)]
pub struct ReportSet {
    pub range: TimeRange,
    pub balance: BalanceSummary,
    pub income: SideReport,
    pub expense: SideReport,
    pub transfers: Vec<TransferPair>,
}

// ============================================================================
// PIPELINE
// ============================================================================

pub struct ReportPipeline {
    config: Arc<UserConfiguration>,
    deduplicator: DeduplicationEngine,
    transfers: TransferMatcher,
    classifier: TransactionClassifier,
    clustering: ClusteringEngine,
    categories: CategoryEngine,
}

impl ReportPipeline {
    pub fn new(config: Arc<UserConfiguration>) -> Self {
        ReportPipeline {
            deduplicator: DeduplicationEngine::new(),
            transfers: TransferMatcher::from_config(&config),
            classifier: TransactionClassifier::from_config(&config),
            clustering: ClusteringEngine::from_config(&config),
            categories: CategoryEngine::new(Arc::clone(&config)),
            config,
        }
    }

    pub fn config(&self) -> &UserConfiguration {
        &self.config
    }

    /// Deduplicate and validate. Any malformed record aborts the batch.
    pub fn prepare(&self, raw: &[RawTransaction]) -> PipelineResult<Vec<Transaction>> {
        self.deduplicator
            .dedupe(raw)
            .iter()
            .map(RawTransaction::to_transaction)
            .collect()
    }

    pub fn run(&self, raw: &[RawTransaction], range: TimeRange) -> PipelineResult<ReportSet> {
        let transactions = self.prepare(raw)?;
        tracing::info!(
            raw = raw.len(),
            deduplicated = transactions.len(),
            "transactions prepared"
        );

        let transfers = self.transfers.detect(&transactions);
        let transactions = self.transfers.remove_internal_transfers(&transactions);
        let transactions = range.filter(transactions);
        tracing::info!(
            transfer_pairs = transfers.len(),
            in_range = transactions.len(),
            "internal transfers removed and time range applied"
        );

        let (income, expense) = self.classifier.split(transactions);
        let income = self.categorize_side(income);
        let expense = self.categorize_side(expense);

        let total_income = income.total();
        let total_expense = expense.total();
        let balance = BalanceSummary {
            start_time: range.start.to_rfc3339(),
            end_time: range.end.to_rfc3339(),
            total_income,
            total_expense,
            total_balance: total_income + total_expense,
        };

        Ok(ReportSet {
            range,
            balance,
            income,
            expense,
            transfers,
        })
    }

    /// Cluster one side, categorize each transaction and aggregate
    pub fn categorize_side(&self, transactions: Vec<Transaction>) -> SideReport {
        let grouping = self.clustering.group_transactions(transactions);
        let groups = grouping.groups;

        let transactions: Vec<CategorizedTransaction> = grouping
            .transactions
            .into_iter()
            .map(|grouped| {
                let group_references = groups
                    .get(grouped.group_number)
                    .map(|g| g.references.as_slice())
                    .unwrap_or_default();
                let categorization = self.categories.categorize(
                    &grouped.transaction.reference_text,
                    group_references,
                    &grouped.group_name,
                );
                tracing::debug!(
                    transaction_id = %grouped.transaction.transaction_id,
                    category = %categorization.category,
                    source = ?categorization.source,
                    "transaction categorized"
                );
                grouped.with_category(categorization.category)
            })
            .collect();

        let per_group = sum_amount_by(
            &transactions,
            |t| t.group_number(),
            |number| {
                let mut context = Map::new();
                if let Some(group) = groups.get(*number) {
                    context.insert("groupName".to_string(), json!(group.name));
                }
                context
            },
        );
        let per_category = sum_amount_by_key(&transactions, |t| t.custom_category.clone());

        SideReport {
            per_group,
            per_category,
            transactions,
            groups,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::CategoryDefinition;
    use crate::error::PipelineError;

    fn create_test_config() -> UserConfiguration {
        UserConfiguration {
            internal_transfer_references: vec!["own account".to_string()],
            income_references: vec!["acme".to_string()],
            bank_processing_time_in_days: 3,
            expense_category_definition: vec![CategoryDefinition::new("Groceries", &["tesco"], &["#food"])],
            income_category_definition: vec![CategoryDefinition::new("Salary", &["acme"], &[])],
            ..UserConfiguration::default()
        }
    }

    fn create_test_record(id: &str, amount: &str, reference: &str, date: &str, code: &str) -> RawTransaction {
        RawTransaction::new(amount.parse().unwrap(), "EUR")
            .with_transaction_id(id)
            .with_booking_date(date)
            .with_remittance(reference)
            .with_bank_code(code)
    }

    fn pipeline() -> ReportPipeline {
        ReportPipeline::new(Arc::new(create_test_config()))
    }

    fn full_range() -> TimeRange {
        TimeRange::parse("2024-01-01T00:00:00Z", "2024-12-31T23:59:59Z").unwrap()
    }

    #[test]
    fn test_end_to_end_balance() {
        let raw = vec![
            create_test_record("1", "2000", "acme salary", "2024-03-01", "Credit Transfer"),
            create_test_record("2", "-30", "tesco express", "2024-03-02", "CARD_PAYMENT"),
            create_test_record("3", "-20", "tesco metro", "2024-03-03", "CARD_PAYMENT"),
            create_test_record("4", "-500", "own account savings", "2024-03-04", "Transfer"),
            create_test_record("5", "500", "own account main", "2024-03-04", "Transfer"),
            create_test_record("2", "-30", "tesco express", "2024-03-02", "CARD_PAYMENT"),
        ];

        let report = pipeline().run(&raw, full_range()).unwrap();

        assert_eq!(report.transfers.len(), 1);
        assert_eq!(report.balance.total_income, Decimal::from(2000));
        assert_eq!(report.balance.total_expense, Decimal::from(-50));
        assert_eq!(report.balance.total_balance, Decimal::from(1950));
        assert_eq!(report.income.per_category[0].key, "Salary");
        assert_eq!(report.expense.per_category.len(), 1);
        assert_eq!(report.expense.per_category[0].key, "Groceries");
        assert_eq!(report.expense.per_category[0].references, vec!["tesco express", "tesco metro"]);
    }

    #[test]
    fn test_time_range_applies_after_transfer_removal() {
        // The pair straddles the range end; both sides are still removed
        let raw = vec![
            create_test_record("out", "-100", "own account a", "2024-03-31", "Transfer"),
            create_test_record("in", "100", "own account b", "2024-04-01", "Transfer"),
        ];
        let range = TimeRange::parse("2024-03-01T00:00:00Z", "2024-03-31T23:59:59Z").unwrap();

        let report = pipeline().run(&raw, range).unwrap();
        assert!(report.expense.transactions.is_empty());
        assert!(report.income.transactions.is_empty());
    }

    #[test]
    fn test_per_group_carries_group_name() {
        let raw = vec![create_test_record("1", "-9.99", "spotify premium", "2024-05-01", "CARD_PAYMENT")];

        let report = pipeline().run(&raw, full_range()).unwrap();
        let entry = &report.expense.per_group[0];
        assert_eq!(entry.key, 0);
        assert_eq!(entry.context["groupName"], "spotify premium");

        let category = &report.expense.transactions[0].custom_category;
        assert!(category.starts_with("spotify premium."));
    }

    #[test]
    fn test_malformed_record_aborts_batch() {
        let raw = vec![
            create_test_record("1", "-1", "ok", "2024-05-01", "CARD_PAYMENT"),
            RawTransaction::new(Decimal::ONE, "EUR").with_transaction_id("2").with_remittance("no date"),
        ];

        let err = pipeline().run(&raw, full_range()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));
    }

    #[test]
    fn test_bare_record_next_to_matching_amount_still_aborts() {
        let raw = vec![
            create_test_record("a", "-5", "bus", "2024-05-01", "CARD_PAYMENT"),
            RawTransaction::new("-5".parse().unwrap(), "EUR"),
        ];

        let err = pipeline().run(&raw, full_range()).unwrap_err();
        assert!(matches!(err, PipelineError::MalformedRecord { .. }));
    }
}
