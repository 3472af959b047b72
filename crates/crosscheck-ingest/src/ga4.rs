//! Google Analytics 4 source adapter.
//!
//! Runs a Data API report over the window with service-account
//! authentication: an RS256-signed JWT assertion is exchanged at the
//! credential's `token_uri` for a bearer token, then `runReport` is queried
//! for purchase transactions.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::info;

use crosscheck_core::record::{clean_id, validate_batch};
use crosscheck_core::{DateRange, NormalizedRecord, SourceError};

use crate::config::Ga4Config;
use crate::source::{transport_error, Source};
use crate::PROVIDER_TIMEOUT_SECS;

const ANALYTICS_SCOPE: &str = "https://www.googleapis.com/auth/analytics.readonly";
const ASSERTION_LIFETIME_SECS: i64 = 3600;

/// Adapter for GA4 purchase data.
#[derive(Debug)]
pub struct Ga4Source {
    config: Ga4Config,
    client: Client,
}

/// The fields of a Google service-account key file this adapter uses.
#[derive(Debug, Deserialize)]
struct ServiceAccountKey {
    client_email: String,
    private_key: String,
    #[serde(default = "default_token_uri")]
    token_uri: String,
}

fn default_token_uri() -> String {
    "https://oauth2.googleapis.com/token".to_string()
}

#[derive(Debug, Serialize)]
struct AssertionClaims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportResponse {
    #[serde(default)]
    rows: Vec<ReportRow>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReportRow {
    #[serde(default)]
    dimension_values: Vec<ReportValue>,
    #[serde(default)]
    metric_values: Vec<ReportValue>,
}

#[derive(Debug, Deserialize)]
struct ReportValue {
    #[serde(default)]
    value: String,
}

impl Ga4Source {
    /// Validate the config and build the HTTP client.
    pub fn new(config: Ga4Config) -> Result<Self, SourceError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                SourceError::configuration("ga4", format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    /// Exchange a signed JWT assertion for a bearer token.
    async fn access_token(&self, key: &ServiceAccountKey) -> Result<String, SourceError> {
        let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes()).map_err(|e| {
            SourceError::configuration("ga4", format!("invalid service-account private key: {e}"))
        })?;

        let now = Utc::now().timestamp();
        let claims = AssertionClaims {
            iss: &key.client_email,
            scope: ANALYTICS_SCOPE,
            aud: &key.token_uri,
            iat: now,
            exp: now + ASSERTION_LIFETIME_SECS,
        };
        let assertion = encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)
            .map_err(|e| {
                SourceError::configuration("ga4", format!("failed to sign token assertion: {e}"))
            })?;

        let response = self
            .client
            .post(&key.token_uri)
            .form(&[
                ("grant_type", "urn:ietf:params:oauth:grant-type:jwt-bearer"),
                ("assertion", assertion.as_str()),
            ])
            .send()
            .await
            .map_err(|e| transport_error("ga4", &e))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, &body));
        }

        let token: TokenResponse = response
            .json()
            .await
            .map_err(|e| SourceError::api_unreachable("ga4", format!("bad token body: {e}")))?;
        Ok(token.access_token)
    }

    fn map_status(&self, status: StatusCode, body: &str) -> SourceError {
        let code = status.as_u16();
        let message = match code {
            401 => "authentication failed, check the service-account credentials".to_string(),
            403 => "access forbidden, grant the service account access to the property".to_string(),
            429 => "rate limit exceeded".to_string(),
            _ => format!(
                "unexpected response {code}: {}",
                body.chars().take(200).collect::<String>()
            ),
        };
        SourceError::api("ga4", message, code)
    }
}

#[async_trait]
impl Source for Ga4Source {
    fn source_tag(&self) -> &'static str {
        "ga4"
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<NormalizedRecord>, SourceError> {
        // The stored credential is the key file verbatim; bad JSON is a
        // configuration problem, not a provider one.
        let key: ServiceAccountKey =
            serde_json::from_str(&self.config.credentials_json).map_err(|e| {
                SourceError::configuration("ga4", format!("invalid credentials JSON: {e}"))
            })?;

        info!(
            target: "ingest",
            property_id = %self.config.property_id,
            start = %range.start_day(),
            end = %range.end_day(),
            "Fetching GA4 report"
        );

        let token = self.access_token(&key).await?;

        let url = format!(
            "{}/v1beta/properties/{}:runReport",
            self.config.endpoint.trim_end_matches('/'),
            self.config.property_id
        );
        let body = json!({
            "dimensions": [
                { "name": "transactionId" },
                { "name": "date" },
                { "name": "browser" },
                { "name": "deviceCategory" },
            ],
            "metrics": [ { "name": "purchaseRevenue" } ],
            "dateRanges": [
                { "startDate": range.start_day(), "endDate": range.end_day() }
            ],
        });

        let response = self
            .client
            .post(&url)
            .bearer_auth(&token)
            .json(&body)
            .send()
            .await
            .map_err(|e| transport_error("ga4", &e))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(self.map_status(status, &text));
        }

        let report: ReportResponse = response
            .json()
            .await
            .map_err(|e| SourceError::api_unreachable("ga4", format!("bad body: {e}")))?;

        let mut records = Vec::with_capacity(report.rows.len());
        for row in report.rows {
            let dim = |n: usize| row.dimension_values.get(n).map(|v| v.value.clone());
            let value: Decimal = row
                .metric_values
                .first()
                .and_then(|v| v.value.parse().ok())
                .unwrap_or_default();

            let mut record =
                NormalizedRecord::new(clean_id(&dim(0).unwrap_or_default(), false), value);
            record.date = match dim(1) {
                Some(raw) if !raw.is_empty() => Some(reformat_date(&raw)?),
                _ => None,
            };
            record.browser = dim(2);
            record.device = dim(3);
            records.push(record);
        }

        validate_batch(&records, "ga4", true)?;

        info!(
            target: "ingest",
            property_id = %self.config.property_id,
            records = records.len(),
            "Fetched GA4 report"
        );
        Ok(records)
    }
}

/// GA4 returns dates as `YYYYMMDD`; normalize to `YYYY-MM-DD`.
fn reformat_date(raw: &str) -> Result<String, SourceError> {
    NaiveDate::parse_from_str(raw, "%Y%m%d")
        .map(|d| d.format("%Y-%m-%d").to_string())
        .map_err(|_| SourceError::validation(format!("ga4 returned unparseable date: {raw}")))
}
