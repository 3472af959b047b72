//! Per-run fetch memoization.
//!
//! Replaces the process-global response cache with an explicitly injected
//! one: the orchestrator creates a `FetchCache` per invocation and threads
//! it through, so attempts stay independently testable and nothing outlives
//! the run that produced it.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use tokio::sync::RwLock;
use tracing::debug;

use crosscheck_core::{DateRange, NormalizedRecord, SourceError};

use crate::source::Source;

/// Default entry lifetime: ten minutes, matching the provider-side staleness
/// the reports tolerate.
const DEFAULT_TTL: Duration = Duration::from_secs(600);

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    source_tag: &'static str,
    start: String,
    end: String,
}

struct CacheEntry {
    inserted_at: Instant,
    records: Vec<NormalizedRecord>,
}

/// TTL cache over fetched record batches, keyed by provider and window.
pub struct FetchCache {
    ttl: Duration,
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
}

impl Default for FetchCache {
    fn default() -> Self {
        Self::new(DEFAULT_TTL)
    }
}

impl FetchCache {
    /// A cache with the given entry lifetime.
    #[must_use]
    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            entries: RwLock::new(HashMap::new()),
        }
    }

    /// Fetch through the cache: return a live entry if present, otherwise
    /// call the source and memoize the result. Errors are never cached.
    ///
    /// Keyed at day granularity: a window re-resolved from "now" a few
    /// seconds later (as happens between retry attempts) still hits the
    /// entry from the previous attempt.
    pub async fn fetch(
        &self,
        source: &dyn Source,
        range: &DateRange,
    ) -> Result<Vec<NormalizedRecord>, SourceError> {
        let key = CacheKey {
            source_tag: source.source_tag(),
            start: range.start_day(),
            end: range.end_day(),
        };

        if let Some(entry) = self.entries.read().await.get(&key) {
            if entry.inserted_at.elapsed() < self.ttl {
                debug!(
                    source = key.source_tag,
                    records = entry.records.len(),
                    "fetch served from cache"
                );
                return Ok(entry.records.clone());
            }
        }

        let records = source.fetch(range).await?;
        self.entries.write().await.insert(
            key,
            CacheEntry {
                inserted_at: Instant::now(),
                records: records.clone(),
            },
        );
        Ok(records)
    }
}
