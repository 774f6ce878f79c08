// 🏗️ Raw Record Adapter
// Booked-transaction objects as delivered by the banking API, and their
// validated conversion into `Transaction`.

use crate::error::{PipelineError, PipelineResult};
use crate::transaction::Transaction;
use chrono::{DateTime, FixedOffset, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use uuid::Uuid;

/// Namespace for ids derived from provider ids when the bank id is absent
pub const DERIVED_ID_NAMESPACE: Uuid = Uuid::from_u128(0x29fff09d_93fa_49d2_a902_eb39f25ba953);

pub const UNKNOWN_BANK_TRANSACTION_CODE: &str = "UNKNOWN_PROPRIETARY_TRANSACTION_CODE";
pub const INVALID_CATEGORY_CODE: &str = "INVALID CATEGORY";

/// Narrative values that carry no information
const INVALID_REFERENCES: [&str; 2] = ["", "-"];

// ============================================================================
// CORE TYPES
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionAmount {
    pub amount: Decimal,
    pub currency: String,
}

/// RawTransaction - one booked record, exactly as fetched.
/// Either `bookingDatetime` or `bookingDate` is expected.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawTransaction {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_datetime: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub booking_date: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub internal_transaction_id: Option<String>,

    pub transaction_amount: TransactionAmount,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub transaction_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub creditor_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub debtor_name: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remittance_information_unstructured: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remittance_information_unstructured_array: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub merchant_category_code: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub proprietary_bank_transaction_code: Option<String>,
}

impl RawTransaction {
    /// Create a record holding only the required amount
    pub fn new(amount: Decimal, currency: &str) -> Self {
        RawTransaction {
            booking_datetime: None,
            booking_date: None,
            internal_transaction_id: None,
            transaction_amount: TransactionAmount {
                amount,
                currency: currency.to_string(),
            },
            transaction_id: None,
            creditor_name: None,
            debtor_name: None,
            remittance_information_unstructured: None,
            remittance_information_unstructured_array: None,
            merchant_category_code: None,
            proprietary_bank_transaction_code: None,
        }
    }

    /// Builder pattern: add bank-assigned id
    pub fn with_transaction_id(mut self, id: &str) -> Self {
        self.transaction_id = Some(id.to_string());
        self
    }

    /// Builder pattern: add provider-internal id
    pub fn with_internal_id(mut self, id: &str) -> Self {
        self.internal_transaction_id = Some(id.to_string());
        self
    }

    pub fn with_booking_datetime(mut self, datetime: &str) -> Self {
        self.booking_datetime = Some(datetime.to_string());
        self
    }

    pub fn with_booking_date(mut self, date: &str) -> Self {
        self.booking_date = Some(date.to_string());
        self
    }

    pub fn with_creditor(mut self, name: &str) -> Self {
        self.creditor_name = Some(name.to_string());
        self
    }

    pub fn with_debtor(mut self, name: &str) -> Self {
        self.debtor_name = Some(name.to_string());
        self
    }

    pub fn with_remittance(mut self, text: &str) -> Self {
        self.remittance_information_unstructured = Some(text.to_string());
        self
    }

    pub fn with_remittance_lines(mut self, lines: &[&str]) -> Self {
        self.remittance_information_unstructured_array =
            Some(lines.iter().map(|l| l.to_string()).collect());
        self
    }

    pub fn with_bank_code(mut self, code: &str) -> Self {
        self.proprietary_bank_transaction_code = Some(code.to_string());
        self
    }

    // ========================================================================
    // IDENTITY
    // ========================================================================

    /// True when the record carries either a bank id or a provider id
    pub fn has_identity(&self) -> bool {
        self.transaction_id.is_some() || self.internal_transaction_id.is_some()
    }

    /// Logical id: the bank id, else a v5 hash of provider id + amount + currency.
    /// Records without any id hash a fresh random id, so callers wanting a stable
    /// result should run them through the deduplicator first.
    pub fn logical_id(&self) -> String {
        if let Some(id) = &self.transaction_id {
            return id.clone();
        }

        let internal_id = self
            .internal_transaction_id
            .clone()
            .unwrap_or_else(|| Uuid::new_v4().to_string());

        derive_id(
            &internal_id,
            self.transaction_amount.amount,
            &self.transaction_amount.currency,
        )
    }

    /// Number of populated fields, used to pick the most complete duplicate
    pub fn populated_fields(&self) -> usize {
        let optional = [
            self.booking_datetime.is_some(),
            self.booking_date.is_some(),
            self.internal_transaction_id.is_some(),
            self.transaction_id.is_some(),
            self.creditor_name.is_some(),
            self.debtor_name.is_some(),
            self.remittance_information_unstructured.is_some(),
            self.remittance_information_unstructured_array.is_some(),
            self.merchant_category_code.is_some(),
            self.proprietary_bank_transaction_code.is_some(),
        ];

        // transactionAmount is always present
        1 + optional.iter().filter(|populated| **populated).count()
    }

    /// Field names and values in declaration order
    pub fn canonical_form(&self) -> String {
        serde_json::to_string(self).unwrap_or_default()
    }

    /// Carries a parsable datetime and a non-empty reference
    pub fn is_well_formed(&self) -> bool {
        self.datetime().is_ok() && self.reference().is_ok()
    }

    /// True when every populated field of `self` holds the same value in `other`
    pub fn is_subsumed_by(&self, other: &RawTransaction) -> bool {
        fn covers<T: PartialEq>(mine: &Option<T>, theirs: &Option<T>) -> bool {
            mine.is_none() || mine == theirs
        }

        self.transaction_amount == other.transaction_amount
            && covers(&self.booking_datetime, &other.booking_datetime)
            && covers(&self.booking_date, &other.booking_date)
            && covers(&self.internal_transaction_id, &other.internal_transaction_id)
            && covers(&self.transaction_id, &other.transaction_id)
            && covers(&self.creditor_name, &other.creditor_name)
            && covers(&self.debtor_name, &other.debtor_name)
            && covers(
                &self.remittance_information_unstructured,
                &other.remittance_information_unstructured,
            )
            && covers(
                &self.remittance_information_unstructured_array,
                &other.remittance_information_unstructured_array,
            )
            && covers(&self.merchant_category_code, &other.merchant_category_code)
            && covers(
                &self.proprietary_bank_transaction_code,
                &other.proprietary_bank_transaction_code,
            )
    }

    // ========================================================================
    // FIELD EXTRACTION
    // ========================================================================

    pub fn datetime(&self) -> PipelineResult<DateTime<FixedOffset>> {
        if let Some(value) = &self.booking_datetime {
            return parse_booking_datetime(value).ok_or_else(|| {
                PipelineError::malformed(self.describe(), format!("invalid bookingDatetime '{}'", value))
            });
        }

        if let Some(value) = &self.booking_date {
            return parse_booking_date(value).ok_or_else(|| {
                PipelineError::malformed(self.describe(), format!("invalid bookingDate '{}'", value))
            });
        }

        Err(PipelineError::malformed(self.describe(), "no booking datetime found"))
    }

    /// Distinct narrative values, lower-cased, sorted and joined with ", "
    pub fn reference(&self) -> PipelineResult<String> {
        let candidates = [
            self.creditor_name.clone(),
            self.remittance_information_unstructured.clone(),
            self.remittance_information_unstructured_array
                .as_ref()
                .map(|lines| lines.join(", ")),
            self.debtor_name.clone(),
        ];

        let references: BTreeSet<String> = candidates
            .into_iter()
            .flatten()
            .filter(|value| !INVALID_REFERENCES.contains(&value.trim()))
            .map(|value| value.to_lowercase())
            .collect();

        if references.is_empty() {
            return Err(PipelineError::malformed(self.describe(), "no reference found"));
        }

        Ok(references.into_iter().collect::<Vec<_>>().join(", "))
    }

    pub fn bank_transaction_code(&self) -> &str {
        self.proprietary_bank_transaction_code
            .as_deref()
            .unwrap_or(UNKNOWN_BANK_TRANSACTION_CODE)
    }

    pub fn category_code(&self) -> &str {
        self.merchant_category_code
            .as_deref()
            .unwrap_or(INVALID_CATEGORY_CODE)
    }

    /// Validate and convert; any missing required field aborts with an error
    pub fn to_transaction(&self) -> PipelineResult<Transaction> {
        if self.transaction_amount.currency.trim().is_empty() {
            return Err(PipelineError::malformed(self.describe(), "empty currency"));
        }

        Ok(Transaction::new(
            self.logical_id(),
            self.datetime()?,
            self.transaction_amount.amount,
            &self.reference()?,
            self.bank_transaction_code(),
        ))
    }

    fn describe(&self) -> String {
        self.transaction_id
            .clone()
            .or_else(|| self.internal_transaction_id.clone())
            .unwrap_or_else(|| {
                format!(
                    "<no id> {} {}",
                    self.transaction_amount.amount, self.transaction_amount.currency
                )
            })
    }
}

/// uuid5(namespace, internal id + amount + currency)
pub fn derive_id(internal_id: &str, amount: Decimal, currency: &str) -> String {
    let name = format!("{}{}{}", internal_id, amount.normalize(), currency);
    Uuid::new_v5(&DERIVED_ID_NAMESPACE, name.as_bytes()).to_string()
}

fn parse_booking_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(datetime) = DateTime::parse_from_rfc3339(value) {
        return Some(datetime);
    }

    parse_naive_datetime(value)
}

fn parse_booking_date(value: &str) -> Option<DateTime<FixedOffset>> {
    if let Ok(date) = NaiveDate::parse_from_str(value, "%Y-%m-%d") {
        let midnight = date.and_hms_opt(0, 0, 0)?;
        return Some(Utc.from_utc_datetime(&midnight).fixed_offset());
    }

    parse_booking_datetime(value)
}

/// Naive timestamps carry no offset; they are taken as UTC
fn parse_naive_datetime(value: &str) -> Option<DateTime<FixedOffset>> {
    let naive = NaiveDateTime::parse_from_str(value, "%Y-%m-%dT%H:%M:%S%.f").ok()?;
    Some(Utc.from_utc_datetime(&naive).fixed_offset())
}

// ============================================================================
// FETCH SNAPSHOT
// ============================================================================

/// One fetch snapshot. Pending records have no stable identity and are kept opaque.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RawTransactionBatch {
    #[serde(default)]
    pub booked: Vec<RawTransaction>,

    #[serde(default)]
    pub pending: Vec<serde_json::Value>,
}

impl RawTransactionBatch {
    pub fn concat(mut self, other: RawTransactionBatch) -> RawTransactionBatch {
        self.booked.extend(other.booked);
        self.pending.extend(other.pending);
        self
    }
}

// ============================================================================
// TESTS
// ============================================================================
