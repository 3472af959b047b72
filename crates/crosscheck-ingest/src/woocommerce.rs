//! WooCommerce source adapter.
//!
//! Drains the REST orders endpoint page by page; a page shorter than the
//! requested size ends the walk.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, warn};

use crosscheck_core::record::{clean_id, validate_batch};
use crosscheck_core::{DateRange, NormalizedRecord, SourceError};

use crate::config::WooCommerceConfig;
use crate::source::{transport_error, Source};
use crate::{MAX_PAGES, PROVIDER_TIMEOUT_SECS};

const PER_PAGE: usize = 100;

/// Adapter for WooCommerce order data.
#[derive(Debug)]
pub struct WooCommerceSource {
    config: WooCommerceConfig,
    client: Client,
}

#[derive(Debug, Deserialize)]
struct Order {
    id: Option<i64>,
    total: Option<String>,
    status: Option<String>,
    payment_method_title: Option<String>,
    payment_method: Option<String>,
}

impl WooCommerceSource {
    /// Validate the config and build the HTTP client.
    pub fn new(config: WooCommerceConfig) -> Result<Self, SourceError> {
        config.validate()?;
        let client = Client::builder()
            .timeout(Duration::from_secs(PROVIDER_TIMEOUT_SECS))
            .build()
            .map_err(|e| {
                SourceError::configuration(
                    "woocommerce",
                    format!("failed to build HTTP client: {e}"),
                )
            })?;
        Ok(Self { config, client })
    }

    fn map_status(&self, status: StatusCode, body: &str) -> SourceError {
        let code = status.as_u16();
        let message = match code {
            401 => "authentication failed, check the consumer key and secret".to_string(),
            403 => "access forbidden, ensure the REST API is enabled".to_string(),
            429 => "rate limit exceeded".to_string(),
            _ => format!(
                "unexpected response {code}: {}",
                body.chars().take(200).collect::<String>()
            ),
        };
        SourceError::api("woocommerce", message, code)
    }
}

#[async_trait]
impl Source for WooCommerceSource {
    fn source_tag(&self) -> &'static str {
        "woocommerce"
    }

    async fn fetch(&self, range: &DateRange) -> Result<Vec<NormalizedRecord>, SourceError> {
        let endpoint = format!("{}/wp-json/wc/v3/orders", self.config.url.trim_end_matches('/'));
        info!(
            target: "ingest",
            url = %self.config.url,
            start = %range.start_day(),
            end = %range.end_day(),
            "Fetching WooCommerce orders"
        );

        let mut records = Vec::new();
        let mut page = 1usize;

        loop {
            if page > MAX_PAGES {
                warn!(
                    target: "ingest",
                    url = %self.config.url,
                    max_pages = MAX_PAGES,
                    "Reached page ceiling for WooCommerce orders"
                );
                break;
            }

            let response = self
                .client
                .get(&endpoint)
                .basic_auth(&self.config.consumer_key, Some(&self.config.consumer_secret))
                .query(&[
                    ("after", range.start_iso()),
                    ("before", range.end_iso()),
                    ("per_page", PER_PAGE.to_string()),
                    ("page", page.to_string()),
                ])
                .send()
                .await
                .map_err(|e| transport_error("woocommerce", &e))?;

            let status = response.status();
            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(self.map_status(status, &body));
            }

            let orders: Vec<Order> = response.json().await.map_err(|e| {
                SourceError::api_unreachable("woocommerce", format!("bad body: {e}"))
            })?;

            if orders.is_empty() {
                break;
            }

            let page_len = orders.len();
            for order in orders {
                let raw_id = order.id.map(|id| id.to_string()).unwrap_or_default();
                let value: Decimal = order
                    .total
                    .as_deref()
                    .unwrap_or("0")
                    .parse()
                    .unwrap_or_default();
                let mut record = NormalizedRecord::new(clean_id(&raw_id, true), value);
                record.status = order.status;
                record.payment_method = order.payment_method_title.or(order.payment_method);
                records.push(record);
            }

            if page_len < PER_PAGE {
                break;
            }
            page += 1;
        }

        validate_batch(&records, "woocommerce", false)?;

        info!(
            target: "ingest",
            url = %self.config.url,
            orders = records.len(),
            pages = page,
            "Fetched WooCommerce orders"
        );
        Ok(records)
    }
}
