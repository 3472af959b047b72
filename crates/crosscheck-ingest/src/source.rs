//! The Source trait and provider dispatch.

use async_trait::async_trait;

use crosscheck_core::{DateRange, NormalizedRecord, SourceError};

use crate::config::SourceConfig;
use crate::ga4::Ga4Source;
use crate::shopify::ShopifySource;
use crate::woocommerce::WooCommerceSource;

/// A data source that can fetch normalized transactions for a window.
///
/// Implementations validate credentials at construction, suspend on network
/// I/O inside [`Source::fetch`], and surface every failure as a
/// [`SourceError`] — never a bare error.
#[async_trait]
pub trait Source: Send + Sync + std::fmt::Debug {
    /// Stable provider tag (`ga4`, `shopify`, `woocommerce`).
    fn source_tag(&self) -> &'static str;

    /// Fetch all transactions inside the window.
    async fn fetch(&self, range: &DateRange) -> Result<Vec<NormalizedRecord>, SourceError>;
}

/// Build the adapter for a decrypted connector config.
///
/// Tagged-union dispatch: the connector's kind selects the implementation.
pub fn build_source(config: SourceConfig) -> Result<Box<dyn Source>, SourceError> {
    match config {
        SourceConfig::Ga4(c) => Ok(Box::new(Ga4Source::new(c)?)),
        SourceConfig::Shopify(c) => Ok(Box::new(ShopifySource::new(c)?)),
        SourceConfig::WooCommerce(c) => Ok(Box::new(WooCommerceSource::new(c)?)),
    }
}

/// Map a transport-level failure (no HTTP status available) onto the error
/// taxonomy. Timeouts and connection failures are retryable API errors.
pub(crate) fn transport_error(source_tag: &'static str, err: &reqwest::Error) -> SourceError {
    if err.is_timeout() {
        SourceError::api_unreachable(
            source_tag,
            format!("request timed out after {}s", crate::PROVIDER_TIMEOUT_SECS),
        )
    } else if err.is_connect() {
        SourceError::api_unreachable(source_tag, format!("connection failed: {err}"))
    } else {
        SourceError::api_unreachable(source_tag, format!("request failed: {err}"))
    }
}
