// Ledger Normalizer - Core Library
// Deduplication, internal-transfer removal, reference clustering,
// categorization and aggregation of bank transactions.

pub mod error;
pub mod config;
pub mod transaction;
pub mod parser;
pub mod deduplication;
pub mod transfers;
pub mod similarity;
pub mod grouping;
pub mod rules;
pub mod aggregation;
pub mod temporal;
pub mod classification;
pub mod pipeline;
pub mod report;
pub mod snapshot;

// Re-export commonly used types
pub use error::{ConfigError, PipelineError, PipelineResult};
pub use config::{CategoryDefinition, SimilarityMetricKind, UserConfiguration};
pub use transaction::{CategorizedTransaction, GroupedTransaction, Transaction};
pub use parser::{derive_id, RawTransaction, RawTransactionBatch, TransactionAmount};
pub use deduplication::{DeduplicationEngine, DuplicateSet};
pub use transfers::{TransferMatcher, TransferPair};
pub use similarity::{JaroWinkler, MatchingBlocks, SimilarityMetric};
pub use grouping::{ClusteringEngine, GroupingResult, ReferenceNormalizer, TransactionGroup};
pub use rules::{fallback_category, Categorization, CategoryEngine, CategoryIndex, MatchSource};
pub use aggregation::{sum_amount, sum_amount_by, sum_amount_by_key, AmountSummary};
pub use temporal::TimeRange;
pub use classification::{TransactionClassifier, TransactionType};
pub use pipeline::{BalanceSummary, ReportPipeline, ReportSet, SideReport};
pub use report::ReportWriter;
pub use snapshot::{load_merged, merge_snapshots, write_merged};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
