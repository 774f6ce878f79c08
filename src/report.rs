// 📝 Report Writer
// Lays a ReportSet out on disk under <output>/<start>_<end>/

use crate::pipeline::{ReportSet, SideReport};
use crate::transaction::CategorizedTransaction;
use anyhow::{Context, Result};
use rust_decimal::Decimal;
use serde::Serialize;
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};

/// Flat row for the CSV export; csv cannot serialize flattened structs
#[derive(Debug, Serialize)]
struct CsvRow<'a> {
    #[serde(rename = "transactionId")]
    transaction_id: &'a str,
    datetime: String,
    amount: Decimal,
    #[serde(rename = "referenceText")]
    reference_text: &'a str,
    #[serde(rename = "bankTransactionCode")]
    bank_transaction_code: &'a str,
    #[serde(rename = "groupNumber")]
    group_number: usize,
    #[serde(rename = "groupName")]
    group_name: &'a str,
    #[serde(rename = "customCategory")]
    custom_category: &'a str,
}

impl<'a> From<&'a CategorizedTransaction> for CsvRow<'a> {
    fn from(t: &'a CategorizedTransaction) -> Self {
        let inner = &t.grouped.transaction;
        CsvRow {
            transaction_id: &inner.transaction_id,
            datetime: inner.datetime.to_rfc3339(),
            amount: inner.amount,
            reference_text: &inner.reference_text,
            bank_transaction_code: &inner.bank_transaction_code,
            group_number: t.group_number(),
            group_name: t.group_name(),
            custom_category: &t.custom_category,
        }
    }
}

pub struct ReportWriter {
    output_dir: PathBuf,
}

impl ReportWriter {
    pub fn new<P: AsRef<Path>>(output_dir: P) -> Self {
        ReportWriter {
            output_dir: output_dir.as_ref().to_path_buf(),
        }
    }

    /// Directory a report set is written to
    pub fn report_dir(&self, reports: &ReportSet) -> PathBuf {
        self.output_dir.join(reports.range.label())
    }

    /// Write every report file; returns the paths written
    pub fn write(&self, reports: &ReportSet) -> Result<Vec<PathBuf>> {
        let dir = self.report_dir(reports);
        fs::create_dir_all(&dir)
            .with_context(|| format!("Failed to create report directory: {:?}", dir))?;

        let mut written = vec![write_json(&dir.join("balance.json"), &reports.balance)?];
        written.extend(write_side(&dir, "income", &reports.income)?);
        written.extend(write_side(&dir, "expense", &reports.expense)?);

        tracing::info!(dir = %dir.display(), files = written.len(), "reports written");
        Ok(written)
    }
}

fn write_side(dir: &Path, prefix: &str, side: &SideReport) -> Result<Vec<PathBuf>> {
    let written = vec![
        write_json(&dir.join(format!("{prefix}_per_group.json")), &side.per_group)?,
        write_json(&dir.join(format!("{prefix}_per_category.json")), &side.per_category)?,
        write_json(
            &dir.join(format!("{prefix}_categorized_transactions.json")),
            &side.transactions,
        )?,
        write_csv(
            &dir.join(format!("{prefix}_categorized_transactions.csv")),
            &side.transactions,
        )?,
    ];
    Ok(written)
}

/// Pretty-printed JSON
pub fn write_json<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<PathBuf> {
    let file = File::create(path).with_context(|| format!("Failed to create file: {:?}", path))?;
    serde_json::to_writer_pretty(BufWriter::new(file), value)
        .with_context(|| format!("Failed to write JSON: {:?}", path))?;
    tracing::debug!(path = %path.display(), "json written");
    Ok(path.to_path_buf())
}

pub fn write_csv(path: &Path, transactions: &[CategorizedTransaction]) -> Result<PathBuf> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("Failed to create CSV file: {:?}", path))?;

    for transaction in transactions {
        writer
            .serialize(CsvRow::from(transaction))
            .context("Failed to serialize transaction row")?;
    }
    writer.flush().context("Failed to flush CSV file")?;

    Ok(path.to_path_buf())
}
