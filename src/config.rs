// ⚙️ User Configuration - Rules as Data
// Immutable configuration shared by every pipeline stage.
//
// Loaded once from YAML, validated before any transaction is touched, then
// passed around behind an `Arc`. Derived inverted indexes are memoized on the
// value itself, so reloading the file yields a fresh value with empty caches.

use crate::error::ConfigError;
use crate::rules::CategoryIndex;
use chrono::Duration;
use once_cell::sync::OnceCell;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::HashSet;
use std::fs;
use std::path::Path;

/// Tags must begin with this sentinel.
pub const TAG_SENTINEL: char = '#';

// ============================================================================
// CATEGORY DEFINITION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CategoryDefinition {
    /// Unique category name reported for matching transactions
    #[serde(rename = "CategoryName")]
    pub name: String,

    /// Keywords matched against the concatenated references of a group
    #[serde(rename = "CategoryReferences")]
    pub references: Vec<String>,

    /// Literal `#tokens` matched against a single transaction reference
    #[serde(rename = "CategoryTags")]
    pub tags: Vec<String>,
}

impl CategoryDefinition {
    pub fn new(name: &str, references: &[&str], tags: &[&str]) -> Self {
        CategoryDefinition {
            name: name.to_string(),
            references: references.iter().map(|r| r.to_string()).collect(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn validate(&self) -> Result<(), ConfigError> {
        if self.name.trim().is_empty() {
            return Err(ConfigError::EmptyCategoryName);
        }

        for tag in &self.tags {
            if !tag.starts_with(TAG_SENTINEL) {
                return Err(ConfigError::InvalidTag {
                    category: self.name.clone(),
                    tag: tag.clone(),
                });
            }
        }

        Ok(())
    }
}

// ============================================================================
// SIMILARITY METRIC SELECTION
// ============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SimilarityMetricKind {
    #[default]
    JaroWinkler,
    MatchingBlocks,
}

// ============================================================================
// USER CONFIGURATION
// ============================================================================

/// Direct map of the user YAML file.
///
/// Category definitions are only readable from outside the crate: the
/// inverted index built from them is cached on first use, so the value is
/// frozen once it is shared.
#[derive(Debug, Serialize, Deserialize)]
pub struct UserConfiguration {
    #[serde(rename = "InternalTransferReferences")]
    pub internal_transfer_references: Vec<String>,

    #[serde(rename = "BankProcessingTimeInDays")]
    pub bank_processing_time_in_days: i64,

    /// Noise substrings stripped from references before clustering
    #[serde(rename = "FilterReferenceWordsForGrouping")]
    pub filter_reference_words_for_grouping: Vec<String>,

    #[serde(rename = "ExpenseCategoryDefinition")]
    pub(crate) expense_category_definition: Vec<CategoryDefinition>,

    #[serde(rename = "IncomeCategoryDefinition")]
    pub(crate) income_category_definition: Vec<CategoryDefinition>,

    #[serde(rename = "ExpenseTransactionCodes", default = "default_expense_codes")]
    pub expense_transaction_codes: Vec<String>,

    /// Bank codes that mark a credit as income on their own; empty unless configured
    #[serde(rename = "IncomeTransactionCodes", default)]
    pub income_transaction_codes: Vec<String>,

    #[serde(rename = "IncomeReferences", default)]
    pub income_references: Vec<String>,

    #[serde(rename = "SimilarityMetric", default)]
    pub similarity_metric: SimilarityMetricKind,

    #[serde(skip)]
    pub(crate) category_index: OnceCell<CategoryIndex>,
}

fn default_expense_codes() -> Vec<String> {
    ["CARD_PAYMENT", "Mobile TopUp", "CARD_REFUND", "Direct Debt"]
        .iter()
        .map(|c| c.to_string())
        .collect()
}

impl Default for UserConfiguration {
    fn default() -> Self {
        UserConfiguration {
            internal_transfer_references: Vec::new(),
            bank_processing_time_in_days: 1,
            filter_reference_words_for_grouping: Vec::new(),
            expense_category_definition: Vec::new(),
            income_category_definition: Vec::new(),
            expense_transaction_codes: default_expense_codes(),
            income_transaction_codes: Vec::new(),
            income_references: Vec::new(),
            similarity_metric: SimilarityMetricKind::default(),
            category_index: OnceCell::new(),
        }
    }
}

impl UserConfiguration {
    /// Read, parse and validate a YAML configuration file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;

        let config = Self::from_yaml_str(&content)?;
        tracing::info!(
            path = %path.display(),
            fingerprint = %config.fingerprint(),
            "user configuration loaded"
        );
        Ok(config)
    }

    pub fn from_yaml_str(content: &str) -> Result<Self, ConfigError> {
        tracing::debug!("parsing user configuration");
        let config: UserConfiguration = serde_yaml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Enforce the invariants serde cannot express
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bank_processing_time_in_days <= 0 {
            return Err(ConfigError::InvalidProcessingWindow(
                self.bank_processing_time_in_days,
            ));
        }

        let mut seen = HashSet::new();
        for definition in self.category_definitions() {
            definition.validate()?;
            if !seen.insert(definition.name.as_str()) {
                return Err(ConfigError::DuplicateCategory(definition.name.clone()));
            }
        }

        Ok(())
    }

    pub fn expense_categories(&self) -> &[CategoryDefinition] {
        &self.expense_category_definition
    }

    pub fn income_categories(&self) -> &[CategoryDefinition] {
        &self.income_category_definition
    }

    /// Expense definitions followed by income definitions
    pub fn category_definitions(&self) -> impl Iterator<Item = &CategoryDefinition> {
        self.expense_category_definition
            .iter()
            .chain(self.income_category_definition.iter())
    }

    pub fn processing_window(&self) -> Duration {
        Duration::days(self.bank_processing_time_in_days)
    }

    /// Inverted tag/keyword indexes, built on first use and cached on this value
    pub fn category_index(&self) -> &CategoryIndex {
        self.category_index
            .get_or_init(|| {
                CategoryIndex::build(
                    &self.expense_category_definition,
                    &self.income_category_definition,
                )
            })
    }

    /// SHA-256 over the canonical JSON form; equal configurations share a fingerprint
    pub fn fingerprint(&self) -> String {
        let canonical = serde_json::to_string(self).unwrap_or_default();
        let mut hasher = Sha256::new();
        hasher.update(canonical.as_bytes());
        format!("{:x}", hasher.finalize())
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    const FULL_CONFIG: &str = r##"
InternalTransferReferences: ["mock", "internal"]
BankProcessingTimeInDays: 2
ExpenseTransactionCodes: ["test", "transaction_code"]
FilterReferenceWordsForGrouping: ["non-sense", "characters"]
ExpenseCategoryDefinition:
  - CategoryName: CookieCashCrunch
    CategoryReferences: ["SweetSpendSpree", "DoughDissipation"]
    CategoryTags: ["#FritterFunds", "#CrumbleCash"]
  - CategoryName: StormySpendingStreams
    CategoryReferences: ["DownpourDollars", "PuddlePayments"]
    CategoryTags: ["#DrainTheDeposits", "#LiquidateLiquidity"]
IncomeCategoryDefinition:
  - CategoryName: InterestIgloo
    CategoryReferences: ["SavingsSnowball", "CapitalChill"]
    CategoryTags: ["#CoolCash", "#FrostyFunds"]
"##;

    #[test]
    fn test_parse_full_config() {
        let config = UserConfiguration::from_yaml_str(FULL_CONFIG).unwrap();

        assert_eq!(config.internal_transfer_references, vec!["mock", "internal"]);
        assert_eq!(config.bank_processing_time_in_days, 2);
        assert_eq!(config.expense_transaction_codes, vec!["test", "transaction_code"]);
        assert_eq!(config.expense_categories().len(), 2);
        assert_eq!(config.income_categories()[0].name, "InterestIgloo");
        assert_eq!(config.similarity_metric, SimilarityMetricKind::JaroWinkler);
        assert_eq!(config.processing_window(), Duration::days(2));
    }

    #[test]
    fn test_optional_fields_fall_back_to_defaults() {
        let without_codes = FULL_CONFIG.replace(
            "ExpenseTransactionCodes: [\"test\", \"transaction_code\"]\n",
            "",
        );
        let config = UserConfiguration::from_yaml_str(&without_codes).unwrap();

        assert_eq!(config.expense_transaction_codes, default_expense_codes());
        assert!(config.income_transaction_codes.is_empty());
        assert!(config.income_references.is_empty());
    }

    #[test]
    fn test_missing_category_list_is_rejected() {
        let start = FULL_CONFIG.find("ExpenseCategoryDefinition").unwrap();
        let end = FULL_CONFIG.find("IncomeCategoryDefinition").unwrap();
        let mut broken = FULL_CONFIG.to_string();
        broken.replace_range(start..end, "");

        let err = UserConfiguration::from_yaml_str(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::Parse(_)));
    }

    #[test]
    fn test_wrongly_typed_field_is_rejected() {
        let broken = FULL_CONFIG.replace(
            "InternalTransferReferences: [\"mock\", \"internal\"]",
            "InternalTransferReferences: 12",
        );

        assert!(UserConfiguration::from_yaml_str(&broken).is_err());
    }

    #[test]
    fn test_tag_without_hashtag_is_rejected() {
        let broken = FULL_CONFIG.replace("#CoolCash", "CoolCash");

        let err = UserConfiguration::from_yaml_str(&broken).unwrap_err();
        match err {
            ConfigError::InvalidTag { category, tag } => {
                assert_eq!(category, "InterestIgloo");
                assert_eq!(tag, "CoolCash");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_duplicate_category_names_are_rejected() {
        let broken = FULL_CONFIG.replace("InterestIgloo", "CookieCashCrunch");

        let err = UserConfiguration::from_yaml_str(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::DuplicateCategory(name) if name == "CookieCashCrunch"));
    }

    #[test]
    fn test_non_positive_window_is_rejected() {
        let broken = FULL_CONFIG.replace("BankProcessingTimeInDays: 2", "BankProcessingTimeInDays: 0");

        let err = UserConfiguration::from_yaml_str(&broken).unwrap_err();
        assert!(matches!(err, ConfigError::InvalidProcessingWindow(0)));
    }

    #[test]
    fn test_fingerprint_is_stable_and_content_sensitive() {
        let a = UserConfiguration::from_yaml_str(FULL_CONFIG).unwrap();
        let b = UserConfiguration::from_yaml_str(FULL_CONFIG).unwrap();
        let c = UserConfiguration::from_yaml_str(&FULL_CONFIG.replace("mock", "mocked")).unwrap();

        assert_eq!(a.fingerprint(), b.fingerprint());
        assert_ne!(a.fingerprint(), c.fingerprint());
        assert_eq!(a.fingerprint().len(), 64);
    }

    #[test]
    fn test_category_index_is_memoized() {
        let config = UserConfiguration::from_yaml_str(FULL_CONFIG).unwrap();

        let first = config.category_index() as *const CategoryIndex;
        let second = config.category_index() as *const CategoryIndex;
        assert_eq!(first, second);
    }

    #[test]
    fn test_category_index_reflects_loaded_definitions() {
        let config = UserConfiguration::from_yaml_str(FULL_CONFIG).unwrap();
        let rebuilt = CategoryIndex::build(config.expense_categories(), config.income_categories());

        assert_eq!(config.category_index(), &rebuilt);
    }
}
