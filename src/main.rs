use anyhow::{Context, Result};
use chrono::Utc;
use clap::{Parser, Subcommand};
use ledger_normalizer::{
    load_merged, merge_snapshots, write_merged, ReportPipeline, ReportWriter, TimeRange, UserConfiguration,
};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "ledger-normalizer", version, about = "Deduplicate, categorize and report bank transactions")]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Merge every `transactions*.json` snapshot into one deduplicated file
    Merge {
        #[arg(long, default_value = "data")]
        data_dir: PathBuf,
    },

    /// Generate balance, per-group and per-category reports for a time range
    Report {
        /// RFC 3339, inclusive
        #[arg(long = "start-time", short = 's', default_value = "1970-01-01T00:00:00Z")]
        start_time: String,

        /// RFC 3339, inclusive
        #[arg(long = "end-time", short = 'e', default_value = "2100-01-01T00:00:00Z")]
        end_time: String,

        #[arg(long, short = 't', default_value = "data/merged_transactions_latest.json")]
        transactions_file_path: PathBuf,

        #[arg(long, short = 'u', default_value = "config/user_config.yaml")]
        user_config_file_path: PathBuf,

        #[arg(long, short = 'o', default_value = "reports")]
        output_dir: PathBuf,
    },
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Merge { data_dir } => run_merge(data_dir),
        Command::Report {
            start_time,
            end_time,
            transactions_file_path,
            user_config_file_path,
            output_dir,
        } => run_report(
            &start_time,
            &end_time,
            transactions_file_path,
            user_config_file_path,
            output_dir,
        ),
    }
}

/// `RUST_LOG` when set, `info` otherwise
fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).with_target(false).init();
}

fn run_merge(data_dir: PathBuf) -> Result<()> {
    let merged = merge_snapshots(&data_dir)?;
    let written = write_merged(&data_dir, &merged, Utc::now())?;

    for path in written {
        tracing::info!(path = %path.display(), records = merged.len(), "merged transactions written");
    }
    Ok(())
}

fn run_report(
    start_time: &str,
    end_time: &str,
    transactions_file_path: PathBuf,
    user_config_file_path: PathBuf,
    output_dir: PathBuf,
) -> Result<()> {
    let range = TimeRange::parse(start_time, end_time).context("Invalid report time range")?;

    let config = UserConfiguration::load(&user_config_file_path)
        .with_context(|| format!("Failed to load user configuration: {:?}", user_config_file_path))?;
    let raw = load_merged(&transactions_file_path)?;

    let reports = ReportPipeline::new(Arc::new(config))
        .run(&raw, range)
        .context("Failed to process transactions")?;
    ReportWriter::new(&output_dir).write(&reports)?;

    tracing::info!(
        total_income = %reports.balance.total_income,
        total_expense = %reports.balance.total_expense,
        total_balance = %reports.balance.total_balance,
        "finished reports"
    );
    Ok(())
}
