use chrono::{DateTime, Duration};
use ledger_normalizer::{
    derive_id, load_merged, merge_snapshots, write_merged, ClusteringEngine, DeduplicationEngine, PipelineError,
    RawTransaction, ReportPipeline, ReportWriter, TimeRange, Transaction, TransferMatcher, UserConfiguration,
};
use rust_decimal::Decimal;
use serde_json::json;
use std::fs;
use std::io::Write;
use std::sync::Arc;
use tempfile::{tempdir, NamedTempFile};

const USER_CONFIG: &str = r##"
InternalTransferReferences: ["transfer to savings", "from savings"]
BankProcessingTimeInDays: 4
FilterReferenceWordsForGrouping: [",", "vdp-"]
IncomeReferences: ["acme"]
ExpenseCategoryDefinition:
  - CategoryName: Groceries
    CategoryReferences: ["tesco", "aldi"]
    CategoryTags: ["#food"]
  - CategoryName: Furniture
    CategoryReferences: ["ikea"]
    CategoryTags: []
IncomeCategoryDefinition:
  - CategoryName: Salary
    CategoryReferences: ["acme"]
    CategoryTags: ["#salary"]
"##;

fn write_config() -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(USER_CONFIG.as_bytes()).unwrap();
    file
}

fn load_config() -> Arc<UserConfiguration> {
    let file = write_config();
    Arc::new(UserConfiguration::load(file.path()).unwrap())
}

fn create_test_record(id: &str, amount: &str, reference: &str, datetime: &str, code: &str) -> RawTransaction {
    RawTransaction::new(amount.parse().unwrap(), "EUR")
        .with_transaction_id(id)
        .with_booking_datetime(datetime)
        .with_remittance(reference)
        .with_bank_code(code)
}

fn sample_records() -> Vec<RawTransaction> {
    vec![
        create_test_record("1", "3000.00", "ACME Ltd March", "2024-03-01T09:00:00Z", "Credit Transfer"),
        create_test_record("2", "-120.00", "IKEA Dublin", "2024-03-02T12:00:00Z", "CARD_PAYMENT"),
        create_test_record("3", "-80.00", "IKEA Cork", "2024-03-03T12:00:00Z", "CARD_PAYMENT"),
        create_test_record("4", "-25.40", "VDP-TESCO EXPRESS 123456", "2024-03-04T18:00:00Z", "CARD_PAYMENT"),
        create_test_record("5", "-500.00", "Transfer to savings", "2024-03-05T08:00:00Z", "Transfer"),
        create_test_record("6", "500.00", "From savings", "2024-03-06T08:00:00Z", "Transfer"),
        create_test_record("7", "-9.99", "Netflix #food", "2024-03-07T08:00:00Z", "CARD_PAYMENT"),
        create_test_record("8", "-40.00", "ATM withdrawal", "2024-03-08T08:00:00Z", "ATM"),
        create_test_record("2", "-120.00", "IKEA Dublin", "2024-03-02T12:00:00Z", "CARD_PAYMENT"),
        create_test_record("9", "-15.00", "tesco metro", "2024-04-02T12:00:00Z", "CARD_PAYMENT"),
    ]
}

fn march() -> TimeRange {
    TimeRange::parse("2024-03-01T00:00:00Z", "2024-03-31T23:59:59Z").unwrap()
}

#[test]
fn full_report_for_march() {
    let pipeline = ReportPipeline::new(load_config());
    let reports = pipeline.run(&sample_records(), march()).unwrap();

    assert_eq!(reports.transfers.len(), 1);
    assert_eq!(reports.balance.total_income, "3000.00".parse::<Decimal>().unwrap());
    assert_eq!(reports.balance.total_expense, "-275.39".parse::<Decimal>().unwrap());
    assert_eq!(reports.balance.total_balance, "2724.61".parse::<Decimal>().unwrap());

    let income_ids: Vec<&str> = reports
        .income
        .transactions
        .iter()
        .map(|t| t.grouped.transaction.transaction_id.as_str())
        .collect();
    assert_eq!(income_ids, vec!["1"]);

    let categories: Vec<(&str, &str)> = reports
        .expense
        .transactions
        .iter()
        .map(|t| (t.grouped.transaction.transaction_id.as_str(), t.custom_category.as_str()))
        .collect();
    assert_eq!(categories[0], ("2", "Furniture"));
    assert_eq!(categories[1], ("3", "Furniture"));
    assert_eq!(categories[2], ("4", "Groceries"));
    assert_eq!(categories[3], ("7", "Groceries"));
    assert_eq!(categories[4].0, "8");
    assert!(categories[4].1.starts_with("atm withdrawal."));
}

#[test]
fn per_category_is_sorted_ascending() {
    let reports = ReportPipeline::new(load_config()).run(&sample_records(), march()).unwrap();

    let amounts: Vec<Decimal> = reports.expense.per_category.iter().map(|s| s.amount).collect();
    let mut sorted = amounts.clone();
    sorted.sort();
    assert_eq!(amounts, sorted);
    assert_eq!(reports.expense.per_category[0].key, "Furniture");
    assert_eq!(reports.expense.per_category[0].references, vec!["ikea dublin", "ikea cork"]);
}

#[test]
fn invalid_range_is_rejected() {
    let err = TimeRange::parse("2024-04-01T00:00:00Z", "2024-03-01T00:00:00Z").unwrap_err();
    assert!(matches!(err, PipelineError::InvalidTimeRange { .. }));
}

#[test]
fn internal_id_scenario_collapses_to_one_transaction() {
    let with_internal = RawTransaction::new("-45.00".parse().unwrap(), "EUR")
        .with_internal_id("X")
        .with_booking_date("2024-03-10")
        .with_remittance("groceries");
    let without_any = RawTransaction::new("-45.00".parse().unwrap(), "EUR")
        .with_booking_date("2024-03-10")
        .with_remittance("groceries");

    let pipeline = ReportPipeline::new(load_config());
    let transactions = pipeline.prepare(&[with_internal, without_any]).unwrap();

    assert_eq!(transactions.len(), 1);
    assert_eq!(
        transactions[0].transaction_id,
        derive_id("X", "-45.00".parse().unwrap(), "EUR")
    );
}

#[test]
fn transfer_scenario_with_four_day_window() {
    let at = |value: &str| DateTime::parse_from_rfc3339(value).unwrap();
    let transactions = vec![
        Transaction::new("t1", at("2024-01-01T10:00:00Z"), Decimal::from(50), "transfer abc", "X"),
        Transaction::new("t2", at("2024-01-03T10:00:00Z"), Decimal::from(-50), "transfer xyz", "X"),
    ];
    let matcher = TransferMatcher::new(vec!["transfer".to_string()], Duration::days(4));

    assert!(matcher.remove_internal_transfers(&transactions).is_empty());
}

#[test]
fn clustering_scenario() {
    let at = DateTime::parse_from_rfc3339("2024-01-01T10:00:00Z").unwrap();
    let transactions: Vec<Transaction> = ["ikea dublin", "ikea cork", "tesco express"]
        .iter()
        .enumerate()
        .map(|(i, r)| Transaction::new(i.to_string(), at, Decimal::from(-1), r, "CARD_PAYMENT"))
        .collect();

    let result = ClusteringEngine::default().group_transactions(transactions);

    assert_eq!(result.groups.len(), 2);
    assert_eq!(result.groups[0].references, vec!["ikea dublin", "ikea cork"]);
}

#[test]
fn merge_then_report_on_disk() {
    let data = tempdir().unwrap();
    let output = tempdir().unwrap();

    let snapshot = |records: &[RawTransaction]| json!({"booked": records, "pending": []}).to_string();
    let records = sample_records();
    fs::write(data.path().join("transactions-1.json"), snapshot(&records[..6])).unwrap();
    fs::write(data.path().join("transactions-2.json"), snapshot(&records[4..])).unwrap();

    let merged = merge_snapshots(data.path()).unwrap();
    assert_eq!(merged.len(), 9);
    assert_eq!(merged, DeduplicationEngine::new().dedupe(&records));

    write_merged(data.path(), &merged, chrono::Utc::now()).unwrap();
    let loaded = load_merged(&data.path().join("merged_transactions_latest.json")).unwrap();

    let reports = ReportPipeline::new(load_config()).run(&loaded, march()).unwrap();
    let written = ReportWriter::new(output.path()).write(&reports).unwrap();

    assert_eq!(written.len(), 9);
    let per_group: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(&written[5]).unwrap()).unwrap();
    assert!(per_group.as_array().unwrap().iter().all(|entry| entry.get("groupName").is_some()));
}

#[test]
fn config_file_errors_surface_before_processing() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(USER_CONFIG.replace("#food", "food").as_bytes()).unwrap();

    assert!(UserConfiguration::load(file.path()).is_err());
    assert!(UserConfiguration::load(file.path().with_extension("missing")).is_err());
}
