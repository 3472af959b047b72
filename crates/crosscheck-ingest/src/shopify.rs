//! Shopify source adapter.
//!
//! Drains the Admin API orders endpoint for the window, following
//! `Link: <...>; rel="next"` pagination up to the page ceiling.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crosscheck_core::record::{clean_id, validate_batch};
use crosscheck_core::{DateRange, NormalizedRecord, SourceError};

use crate::config::ShopifyConfig;
use crate::source::{transport_error, Source};
use crate::{MAX_PAGES, PROVIDER_TIMEOUT_SECS};

const API_VERSION: &str = "2023-10";
const PAGE_LIMIT: &str = "250";

/// Adapter for Shopify order data.
#[derive(Debug)]
pub struct ShopifySource {
    config: ShopifyConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct OrdersPage {
    #[serde(default)]
    orders: Vec<Order>,
}

#[derive(Debug, Deserialize)]
struct Order {
    name: Option<String>,
    total_price: Option<String>,
    financial_status: Option<String>,
    #[serde(default)]
    payment_gateway_names: Vec<String>,
}

impl ShopifySource {
    /// Validate the config and build the HTTP client.
    pub fn new(config: ShopifyConfig) -> Result<Self, SourceError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                SourceError::configuration("shopify", format!("failed to build HTTP client: {e}"))
            })?;
        Ok(Self { config, client })
    }

    fn map_status(&self, status: StatusCode, body: &str) -> SourceError {
        let code = status.as_u16();
        let message = match code {
            401 => "authentication failed, check the access token".to_string(),
            403 => "access forbidden, check app permissions".to_string(),
            429 => "rate limit exceeded".to_string(),
            _ => format!(
                "unexpected response {code}: {}",
                body.chars().take(200).collect::<String>()
            ),
        };
        SourceError::api("shopify", message, code)
    }
}

#[async_trait]
impl Source for ShopifySource {
    fn source_tag(&self) -> &'static str {
        "shopify"
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<NormalizedRecord>, SourceError> {
        let shop_domain = self.config.shop_domain();
        info!(
            target: "ingest",
            shop_domain = %shop_domain,
            start = %range.start_day(),
            end = %range.end_day(),
            "Fetching Shopify orders"
        );

        let mut url = format!("{}/admin/api/{API_VERSION}/orders.json", self.config.base_url());
        // The first request carries the window; page_info URLs from the Link
        // header embed their own query and must be followed verbatim.
        let mut query: Option<Vec<(&str, String)>> = Some(vec![
            ("status", "any".to_string()),
            ("created_at_min", range.start_iso()),
            ("created_at_max", range.end_iso()),
            ("limit", PAGE_LIMIT.to_string()),
        ]);

        let mut records = Vec::new();
        let mut pages = 0usize;

        loop {
            if pages >= MAX_PAGES {
                warn!(
                    target: "ingest",
                    shop_domain = %shop_domain,
                    max_pages = MAX_PAGES,
                    "Reached page ceiling for Shopify orders"
                );
                break;
            }
            pages += 1;

            let mut request = self
                .client
                .get(&url)
                .header("X-Shopify-Access-Token", self.config.access_token.as_str());
            if let Some(q) = &query {
                request = request.query(q);
            }

            let response = request
                .send()
                .await
                .map_err(|e| transport_error("shopify", &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(self.map_status(status, &body));
            }

            let link_header = response
                .headers()
                .get("Link")
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let page: OrdersPage = response
                .json()
                .await
                .map_err(|e| SourceError::api_unreachable("shopify", format!("bad body: {e}")))?;

            if page.orders.is_empty() {
                break;
            }

            for order in page.orders {
                let raw_id = order.name.unwrap_or_default();
                let value: Decimal = order
                    .total_price
                    .as_deref()
                    .unwrap_or("0")
                    .parse()
                    .unwrap_or_default();
                let mut record = NormalizedRecord::new(clean_id(&raw_id, true), value);
                record.status = order.financial_status;
                record.payment_method = Some(
                    order
                        .payment_gateway_names
                        .first()
                        .cloned()
                        .unwrap_or_else(|| "unknown".to_string()),
                );
                records.push(record);
            }

            match link_header.as_deref().and_then(next_link) {
                Some(next) => {
                    url = next;
                    query = None;
                }
                None => break,
            }
        }

        validate_batch(&records, "shopify", false)?;

        info!(
            target: "ingest",
            shop_domain = %shop_domain,
            orders = records.len(),
            pages,
            "Fetched Shopify orders"
        );
        Ok(records)
    }
}

/// Extract the `rel="next"` URL from a `Link` header, if present.
fn next_link(header: &str) -> Option<String> {
    for part in header.split(',') {
        if part.contains(r#"rel="next""#) {
            let start = part.find('<')?;
            let end = part.find('>')?;
            if start + 1 <= end {
                return Some(part[start + 1..end].to_string());
            }
        }
    }
    None
}
