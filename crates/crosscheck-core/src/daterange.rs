//! Date-window resolution
//!
//! Turns a `{days}` or `{start_date, end_date}` request into a concrete
//! half-open datetime interval. The request layer and the source adapters
//! both validate through this module so that a window accepted at submission
//! time can never fail at execution time.

use chrono::{Duration, NaiveDate, NaiveDateTime, Utc};

use crate::error::SourceError;

/// A resolved reconciliation window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    /// First instant of the window.
    pub start: NaiveDateTime,
    /// Last instant of the window.
    pub end: NaiveDateTime,
}

impl DateRange {
    /// Resolve a window from the job's request parameters.
    ///
    /// - `end_date` (YYYY-MM-DD) pins the end to 23:59:59 of that day;
    ///   otherwise the end is now.
    /// - `start_date` pins the start to 00:00:00 of that day; otherwise the
    ///   start is `end - days`.
    ///
    /// # Errors
    ///
    /// [`SourceError::DataValidation`] when a date string is not a valid
    /// `YYYY-MM-DD`, when start is after end, or when start is more than one
    /// day in the future (the buffer tolerates clock/timezone skew).
    pub fn resolve(
        days: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
    ) -> Result<Self, SourceError> {
        Self::resolve_at(days, start_date, end_date, Utc::now().naive_utc())
    }

    /// As [`DateRange::resolve`], with an explicit "now" for deterministic tests.
    pub fn resolve_at(
        days: i64,
        start_date: Option<&str>,
        end_date: Option<&str>,
        now: NaiveDateTime,
    ) -> Result<Self, SourceError> {
        let end = match end_date {
            Some(raw) => end_of_day(parse_date(raw, "end_date")?),
            None => now,
        };

        let start = match start_date {
            Some(raw) => start_of_day(parse_date(raw, "start_date")?),
            // Counting back from an explicitly pinned end lands at 23:59:59
            // of the boundary day; snap to the first instant of that day so
            // the window covers whole days.
            None if end_date.is_some() => start_of_day((end - Duration::days(days)).date()),
            None => end - Duration::days(days),
        };

        if start > end {
            return Err(SourceError::validation(
                "start date must be before end date",
            ));
        }

        if start > now + Duration::days(1) {
            return Err(SourceError::validation(
                "start date cannot be in the future",
            ));
        }

        Ok(Self { start, end })
    }

    /// The window start as a `YYYY-MM-DD` string (provider query parameter).
    #[must_use]
    pub fn start_day(&self) -> String {
        self.start.format("%Y-%m-%d").to_string()
    }

    /// The window end as a `YYYY-MM-DD` string (provider query parameter).
    #[must_use]
    pub fn end_day(&self) -> String {
        self.end.format("%Y-%m-%d").to_string()
    }

    /// The window start as an ISO 8601 timestamp (provider query parameter).
    #[must_use]
    pub fn start_iso(&self) -> String {
        self.start.format("%Y-%m-%dT%H:%M:%S").to_string()
    }

    /// The window end as an ISO 8601 timestamp (provider query parameter).
    #[must_use]
    pub fn end_iso(&self) -> String {
        self.end.format("%Y-%m-%dT%H:%M:%S").to_string()
    }
}

fn parse_date(raw: &str, field: &str) -> Result<NaiveDate, SourceError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d").map_err(|e| {
        SourceError::validation(format!("invalid {field} '{raw}', use YYYY-MM-DD: {e}"))
    })
}

fn start_of_day(date: NaiveDate) -> NaiveDateTime {
    // and_hms_opt(0, 0, 0) is always valid for these components.
    date.and_hms_opt(0, 0, 0).unwrap_or_default()
}

fn end_of_day(date: NaiveDate) -> NaiveDateTime {
    date.and_hms_opt(23, 59, 59).unwrap_or_default()
}
