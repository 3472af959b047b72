//! Normalized transaction records
//!
//! Every source adapter emits the same row shape regardless of provider:
//! a join key (`clean_id`), a monetary value, and whatever optional columns
//! the provider happens to carry.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::error::SourceError;

/// One normalized transaction row.
///
/// `clean_id` is the join key across the backend and analytics sides. It is
/// deterministically derived from the provider's native transaction
/// identifier (trimmed, with provider-specific suffix normalization applied
/// by the adapter that produced the row).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRecord {
    pub clean_id: String,
    pub value: Decimal,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub browser: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub device: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payment_method: Option<String>,
}

impl NormalizedRecord {
    /// A record with only the mandatory columns set.
    pub fn new(clean_id: impl Into<String>, value: Decimal) -> Self {
        Self {
            clean_id: clean_id.into(),
            value,
            date: None,
            browser: None,
            device: None,
            status: None,
            payment_method: None,
        }
    }

    /// Set the transaction date (`YYYY-MM-DD`).
    #[must_use]
    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    /// Set the order/payment status column.
    #[must_use]
    pub fn with_status(mut self, status: impl Into<String>) -> Self {
        self.status = Some(status.into());
        self
    }

    /// Set the payment method column.
    #[must_use]
    pub fn with_payment_method(mut self, method: impl Into<String>) -> Self {
        self.payment_method = Some(method.into());
        self
    }
}

/// Check a fetched batch against a provider's minimal column set.
///
/// Adapters call this before returning so that malformed provider output
/// surfaces as a [`SourceError::DataValidation`] instead of silently
/// producing rows that can never match. `require_date` is set by providers
/// whose contract includes a per-row date (GA4).
pub fn validate_batch(
    records: &[NormalizedRecord],
    source_tag: &str,
    require_date: bool,
) -> Result<(), SourceError> {
    for (idx, record) in records.iter().enumerate() {
        if record.clean_id.trim().is_empty() {
            return Err(SourceError::validation(format!(
                "{source_tag} record {idx} is missing required column: clean_id"
            )));
        }
        if require_date && record.date.is_none() {
            return Err(SourceError::validation(format!(
                "{source_tag} record {idx} is missing required column: date"
            )));
        }
    }
    Ok(())
}

/// Normalize a provider's native transaction identifier into a join key.
///
/// Trims surrounding whitespace and, when `strip_disambiguation` is set,
/// removes a single trailing `-1` suffix (storefronts append one when an
/// order number collides with a historical import).
#[must_use]
pub fn clean_id(raw: &str, strip_disambiguation: bool) -> String {
    let trimmed = raw.trim();
    if strip_disambiguation {
        if let Some(stripped) = trimmed.strip_suffix("-1") {
            if !stripped.is_empty() {
                return stripped.to_string();
            }
        }
    }
    trimmed.to_string()
}
