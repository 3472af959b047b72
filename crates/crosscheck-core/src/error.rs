//! Source error taxonomy
//!
//! Every failure a source adapter (or the date-range resolver) can surface is
//! one of three kinds, and the kind decides what the orchestrator does next:
//! configuration and validation errors terminate the job, API errors are
//! retried when the upstream looks transient.

use thiserror::Error;

/// Error raised by a source adapter or the date-range resolver.
#[derive(Debug, Error)]
pub enum SourceError {
    /// The adapter's credential/config bundle is missing or malformed.
    ///
    /// Raised at construction time, before any network call. Never retried.
    #[error("{source_tag} configuration error: {message}")]
    Configuration {
        source_tag: &'static str,
        message: String,
    },

    /// An upstream provider call failed.
    ///
    /// Retried by the orchestrator only when the status code is unknown,
    /// a 5xx, or 429 (rate limit).
    #[error("{source_tag} API error: {message}")]
    Api {
        source_tag: &'static str,
        message: String,
        status_code: Option<u16>,
    },

    /// The fetched data (or a requested date window) failed validation.
    ///
    /// Never retried: the same input would fail the same way.
    #[error("data validation error: {message}")]
    DataValidation { message: String },
}

impl SourceError {
    /// A configuration error for the given provider.
    pub fn configuration(source_tag: &'static str, message: impl Into<String>) -> Self {
        Self::Configuration {
            source_tag,
            message: message.into(),
        }
    }

    /// An API error with an HTTP status from the given provider.
    pub fn api(source_tag: &'static str, message: impl Into<String>, status_code: u16) -> Self {
        Self::Api {
            source_tag,
            message: message.into(),
            status_code: Some(status_code),
        }
    }

    /// An API error without a usable HTTP status (network failure, timeout).
    pub fn api_unreachable(source_tag: &'static str, message: impl Into<String>) -> Self {
        Self::Api {
            source_tag,
            message: message.into(),
            status_code: None,
        }
    }

    /// A data validation error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::DataValidation {
            message: message.into(),
        }
    }

    /// Whether the orchestrator's retry policy applies to this error.
    ///
    /// Only API errors are ever retryable, and then only when the upstream
    /// failure looks transient: no status (network-level), 5xx, or 429.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Api { status_code, .. } => match status_code {
                None => true,
                Some(code) => *code >= 500 || *code == 429,
            },
            Self::Configuration { .. } | Self::DataValidation { .. } => false,
        }
    }

    /// The provider tag this error originated from, if any.
    #[must_use]
    pub fn source_tag(&self) -> Option<&'static str> {
        match self {
            Self::Configuration { source_tag, .. } | Self::Api { source_tag, .. } => {
                Some(source_tag)
            }
            Self::DataValidation { .. } => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_and_server_errors_are_retryable() {
        assert!(SourceError::api("shopify", "rate limited", 429).is_retryable());
        assert!(SourceError::api("ga4", "boom", 500).is_retryable());
        assert!(SourceError::api("woocommerce", "bad gateway", 503).is_retryable());
        assert!(SourceError::api_unreachable("shopify", "timeout").is_retryable());
    }

    #[test]
    fn client_errors_are_not_retryable() {
        assert!(!SourceError::api("shopify", "unauthorized", 401).is_retryable());
        assert!(!SourceError::api("shopify", "forbidden", 403).is_retryable());
        assert!(!SourceError::api("ga4", "not found", 404).is_retryable());
    }

    #[test]
    fn configuration_and_validation_are_terminal() {
        assert!(!SourceError::configuration("ga4", "missing property_id").is_retryable());
        assert!(!SourceError::validation("start after end").is_retryable());
    }

    #[test]
    fn display_names_the_provider() {
        let err = SourceError::api("shopify", "rate limited", 429);
        assert_eq!(err.to_string(), "shopify API error: rate limited");
        assert_eq!(err.source_tag(), Some("shopify"));
    }
}
