// ⏰ Reporting Window
// Time must be explicit: every report covers one closed interval [start, end].

use crate::error::{PipelineError, PipelineResult};
use crate::transaction::Transaction;
use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: DateTime<FixedOffset>,
    pub end: DateTime<FixedOffset>,
}

impl TimeRange {
    pub fn new(start: DateTime<FixedOffset>, end: DateTime<FixedOffset>) -> PipelineResult<Self> {
        if start > end {
            return Err(PipelineError::InvalidTimeRange {
                start: start.to_rfc3339(),
                end: end.to_rfc3339(),
            });
        }
        Ok(TimeRange { start, end })
    }

    /// Parse both bounds as RFC 3339
    pub fn parse(start: &str, end: &str) -> PipelineResult<Self> {
        let parse = |value: &str| {
            DateTime::parse_from_rfc3339(value).map_err(|e| PipelineError::InvalidTimeRange {
                start: start.to_string(),
                end: format!("{end} ({value}: {e})"),
            })
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Both bounds inclusive
    pub fn contains(&self, datetime: &DateTime<FixedOffset>) -> bool {
        self.start <= *datetime && *datetime <= self.end
    }

    pub fn filter<T: AsRef<Transaction>>(&self, transactions: Vec<T>) -> Vec<T> {
        transactions
            .into_iter()
            .filter(|t| self.contains(&t.as_ref().datetime))
            .collect()
    }

    /// Directory-safe label, e.g. `2024-01-01T00:00:00+00:00_2024-02-01T00:00:00+00:00`
    pub fn label(&self) -> String {
        format!("{}_{}", self.start.to_rfc3339(), self.end.to_rfc3339())
    }
}
