//! Reconciliation matcher
//!
//! Pure set/aggregate diff between the backend and analytics record tables.
//! No I/O, no clock: the same two inputs always produce the same report.

use std::collections::HashSet;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::record::NormalizedRecord;

/// Outcome of diffing the two sides of a reconciliation run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchReport {
    /// Percentage of backend records whose `clean_id` also appears in the
    /// analytics set, rounded to two decimals. 0 when the backend is empty.
    pub match_rate: f64,
    /// Sum of `value` over all backend records.
    pub total_backend_value: Decimal,
    /// Sum of `value` over all analytics records.
    pub total_ga4_value: Decimal,
    /// Number of backend ids absent from analytics.
    pub missing_count: usize,
    /// Every backend id absent from analytics, sorted ascending.
    pub missing_ids: Vec<String>,
    /// Record count on the analytics side.
    pub ga4_records: usize,
    /// Record count on the backend side.
    pub backend_records: usize,
}

/// The persisted summary of a completed job: the match report plus the
/// echoed request window and the attempt that produced it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultSummary {
    pub match_rate: f64,
    pub total_backend_value: Decimal,
    pub total_ga4_value: Decimal,
    pub missing_count: usize,
    pub missing_ids: Vec<String>,
    pub days_analyzed: i64,
    pub date_range: SummaryDateRange,
    pub ga4_records: usize,
    pub backend_records: usize,
    pub retry_attempt: u32,
}

/// The requested window as submitted, echoed back in the summary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SummaryDateRange {
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

impl MatchReport {
    /// Attach the request window and attempt number, producing the summary
    /// persisted on the job row and sent to webhook consumers.
    #[must_use]
    pub fn into_summary(
        self,
        days: i64,
        start_date: Option<String>,
        end_date: Option<String>,
        attempt: u32,
    ) -> ResultSummary {
        ResultSummary {
            match_rate: self.match_rate,
            total_backend_value: self.total_backend_value,
            total_ga4_value: self.total_ga4_value,
            missing_count: self.missing_count,
            missing_ids: self.missing_ids,
            days_analyzed: days,
            date_range: SummaryDateRange {
                start_date,
                end_date,
            },
            ga4_records: self.ga4_records,
            backend_records: self.backend_records,
            retry_attempt: attempt,
        }
    }
}

/// Diff the backend table against the analytics table.
///
/// `common = ids(analytics) ∩ ids(backend)`, `missing = ids(backend) −
/// ids(analytics)`. The match rate divides by the backend count and is
/// defined as 0 for an empty backend.
#[must_use]
pub fn reconcile(backend: &[NormalizedRecord], analytics: &[NormalizedRecord]) -> MatchReport {
    let analytics_ids: HashSet<&str> = analytics.iter().map(|r| r.clean_id.as_str()).collect();
    let backend_ids: HashSet<&str> = backend.iter().map(|r| r.clean_id.as_str()).collect();

    let common = backend_ids.intersection(&analytics_ids).count();

    let mut missing_ids: Vec<String> = backend_ids
        .difference(&analytics_ids)
        .map(|id| (*id).to_string())
        .collect();
    missing_ids.sort();

    let match_rate = if backend_ids.is_empty() {
        0.0
    } else {
        round2(common as f64 / backend_ids.len() as f64 * 100.0)
    };

    MatchReport {
        match_rate,
        total_backend_value: backend.iter().map(|r| r.value).sum(),
        total_ga4_value: analytics.iter().map(|r| r.value).sum(),
        missing_count: missing_ids.len(),
        missing_ids,
        ga4_records: analytics.len(),
        backend_records: backend.len(),
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
