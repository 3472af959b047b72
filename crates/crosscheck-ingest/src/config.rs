//! Typed per-provider configuration.
//!
//! Connector configs arrive as decrypted JSON; each provider has a typed
//! shape with construction-time validation so a missing credential fails
//! before any network call is made.

use serde::{Deserialize, Serialize};

use crosscheck_core::SourceError;

/// GA4 connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Ga4Config {
    /// Numeric GA4 property id.
    #[serde(default)]
    pub property_id: String,
    /// Service-account credential JSON (the full key file, as a string).
    #[serde(default)]
    pub credentials_json: String,
    /// Analytics Data API base; override in tests to point at a mock.
    #[serde(default = "default_ga4_endpoint")]
    pub endpoint: String,
}

fn default_ga4_endpoint() -> String {
    "https://analyticsdata.googleapis.com".to_string()
}

impl Ga4Config {
    /// Validate required fields.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.property_id.trim().is_empty() {
            return Err(SourceError::configuration("ga4", "property_id is required"));
        }
        if self.credentials_json.trim().is_empty() {
            return Err(SourceError::configuration(
                "ga4",
                "credentials_json is required",
            ));
        }
        Ok(())
    }

    /// A copy safe for logging: credentials replaced with a placeholder.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            property_id: self.property_id.clone(),
            credentials_json: "***".to_string(),
            endpoint: self.endpoint.clone(),
        }
    }
}

/// Shopify connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopifyConfig {
    /// Shop URL or bare domain (`demo.myshopify.com`).
    #[serde(default)]
    pub shop_url: String,
    /// Admin API access token.
    #[serde(default)]
    pub access_token: String,
}

impl ShopifyConfig {
    /// Validate required fields.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.shop_url.trim().is_empty() {
            return Err(SourceError::configuration("shopify", "shop_url is required"));
        }
        if self.access_token.trim().is_empty() {
            return Err(SourceError::configuration(
                "shopify",
                "access_token is required",
            ));
        }
        Ok(())
    }

    /// The bare shop domain, scheme and trailing slash stripped.
    #[must_use]
    pub fn shop_domain(&self) -> String {
        self.shop_url
            .trim()
            .trim_start_matches("https://")
            .trim_start_matches("http://")
            .trim_end_matches('/')
            .to_string()
    }

    /// The Admin API base. A bare domain gets `https://`; an explicit scheme
    /// is kept as given.
    #[must_use]
    pub fn base_url(&self) -> String {
        let trimmed = self.shop_url.trim().trim_end_matches('/');
        if trimmed.starts_with("http://") || trimmed.starts_with("https://") {
            trimmed.to_string()
        } else {
            format!("https://{trimmed}")
        }
    }

    /// A copy safe for logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            shop_url: self.shop_url.clone(),
            access_token: "***".to_string(),
        }
    }
}

/// WooCommerce connector configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WooCommerceConfig {
    /// Store base URL.
    #[serde(default)]
    pub url: String,
    #[serde(default)]
    pub consumer_key: String,
    #[serde(default)]
    pub consumer_secret: String,
}

impl WooCommerceConfig {
    /// Validate required fields.
    pub fn validate(&self) -> Result<(), SourceError> {
        if self.url.trim().is_empty() {
            return Err(SourceError::configuration("woocommerce", "url is required"));
        }
        if self.consumer_key.trim().is_empty() {
            return Err(SourceError::configuration(
                "woocommerce",
                "consumer_key is required",
            ));
        }
        if self.consumer_secret.trim().is_empty() {
            return Err(SourceError::configuration(
                "woocommerce",
                "consumer_secret is required",
            ));
        }
        Ok(())
    }

    /// A copy safe for logging.
    #[must_use]
    pub fn redacted(&self) -> Self {
        Self {
            url: self.url.clone(),
            consumer_key: "***".to_string(),
            consumer_secret: "***".to_string(),
        }
    }
}

/// A decrypted connector config, tagged by provider.
#[derive(Debug, Clone)]
pub enum SourceConfig {
    Ga4(Ga4Config),
    Shopify(ShopifyConfig),
    WooCommerce(WooCommerceConfig),
}

impl SourceConfig {
    /// Parse a provider config from decrypted JSON.
    pub fn parse(source_tag: &'static str, json: &str) -> Result<Self, SourceError> {
        match source_tag {
            "ga4" => serde_json::from_str(json)
                .map(Self::Ga4)
                .map_err(|e| bad_json("ga4", &e)),
            "shopify" => serde_json::from_str(json)
                .map(Self::Shopify)
                .map_err(|e| bad_json("shopify", &e)),
            "woocommerce" => serde_json::from_str(json)
                .map(Self::WooCommerce)
                .map_err(|e| bad_json("woocommerce", &e)),
            other => Err(SourceError::validation(format!(
                "unknown source kind: {other}"
            ))),
        }
    }
}

fn bad_json(source_tag: &'static str, err: &serde_json::Error) -> SourceError {
    SourceError::configuration(source_tag, format!("invalid config JSON: {err}"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_fail_validation() {
        let config: ShopifyConfig = serde_json::from_str("{}").unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("shop_url"));

        let config: Ga4Config =
            serde_json::from_str(r#"{"property_id": "123456"}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("credentials_json"));

        let config: WooCommerceConfig =
            serde_json::from_str(r#"{"url": "https://shop.example.com"}"#).unwrap();
        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("consumer_key"));
    }

    #[test]
    fn shop_domain_is_normalized() {
        let config = ShopifyConfig {
            shop_url: "https://demo.myshopify.com/".to_string(),
            access_token: "shpat_x".to_string(),
        };
        assert_eq!(config.shop_domain(), "demo.myshopify.com");

        let bare = ShopifyConfig {
            shop_url: "demo.myshopify.com".to_string(),
            access_token: "shpat_x".to_string(),
        };
        assert_eq!(bare.shop_domain(), "demo.myshopify.com");
        assert_eq!(bare.base_url(), "https://demo.myshopify.com");

        let explicit = ShopifyConfig {
            shop_url: "http://127.0.0.1:8080/".to_string(),
            access_token: "shpat_x".to_string(),
        };
        assert_eq!(explicit.base_url(), "http://127.0.0.1:8080");
    }

    #[test]
    fn redacted_hides_credentials() {
        let config = WooCommerceConfig {
            url: "https://shop.example.com".to_string(),
            consumer_key: "ck_live_abc".to_string(),
            consumer_secret: "cs_live_def".to_string(),
        };
        let redacted = config.redacted();
        assert_eq!(redacted.consumer_key, "***");
        assert_eq!(redacted.consumer_secret, "***");
        assert_eq!(redacted.url, config.url);
    }

    #[test]
    fn parse_dispatches_on_tag() {
        let parsed = SourceConfig::parse("shopify", r#"{"shop_url":"x","access_token":"y"}"#);
        assert!(matches!(parsed, Ok(SourceConfig::Shopify(_))));

        let err = SourceConfig::parse("magento", "{}").unwrap_err();
        assert!(err.to_string().contains("magento"));
    }
}
