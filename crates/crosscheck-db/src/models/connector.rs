//! Connector model: one encrypted credential/config bundle per data source.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// The external system a connector binds a client to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ConnectorKind {
    /// Google Analytics 4 (the analytics side of a run).
    Ga4,
    /// Shopify storefront (a backend side).
    Shopify,
    /// WooCommerce storefront (a backend side).
    Woocommerce,
}

impl ConnectorKind {
    /// Get the string representation used in the database.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ga4 => "ga4",
            Self::Shopify => "shopify",
            Self::Woocommerce => "woocommerce",
        }
    }

    /// Whether this connector feeds the backend (storefront) side of a run.
    #[must_use]
    pub fn is_backend(&self) -> bool {
        matches!(self, Self::Shopify | Self::Woocommerce)
    }

    /// Whether this connector feeds the analytics side of a run.
    #[must_use]
    pub fn is_analytics(&self) -> bool {
        matches!(self, Self::Ga4)
    }
}

impl fmt::Display for ConnectorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for ConnectorKind {
    type Err = ParseConnectorKindError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "ga4" => Ok(Self::Ga4),
            "shopify" => Ok(Self::Shopify),
            "woocommerce" => Ok(Self::Woocommerce),
            _ => Err(ParseConnectorKindError(s.to_string())),
        }
    }
}

/// Error parsing a connector kind from a string.
#[derive(Debug, Clone)]
pub struct ParseConnectorKindError(String);

impl fmt::Display for ParseConnectorKindError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "invalid connector kind '{}', expected one of: ga4, shopify, woocommerce",
            self.0
        )
    }
}

impl std::error::Error for ParseConnectorKindError {}

/// A stored connector row. `config_encrypted` holds the AES-256-GCM
/// ciphertext of the provider config JSON; it is decrypted into a typed
/// config immediately before adapter construction, never earlier.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Connector {
    pub id: Uuid,
    pub client_id: Uuid,
    pub kind: ConnectorKind,
    pub config_encrypted: String,
    pub created_at: DateTime<Utc>,
}
