//! Shared fixtures for the adapter integration suites.
//!
//! Each suite uses its own slice of these helpers.
#![allow(dead_code)]

use chrono::NaiveDateTime;
use serde_json::json;

use crosscheck_core::DateRange;

/// Throwaway RSA key used to sign test service-account assertions.
pub const TEST_PRIVATE_KEY: &str = include_str!("../fixtures/test_service_account.pem");

/// A fixed window so request assertions are deterministic.
pub fn january_window() -> DateRange {
    DateRange::resolve_at(
        30,
        Some("2024-01-01"),
        Some("2024-01-31"),
        NaiveDateTime::parse_from_str("2024-02-15T12:00:00", "%Y-%m-%dT%H:%M:%S").unwrap(),
    )
    .unwrap()
}

/// A service-account key file pointing its token exchange at `token_uri`.
pub fn service_account_json(token_uri: &str) -> String {
    json!({
        "type": "service_account",
        "client_email": "reporter@crosscheck-test.iam.gserviceaccount.com",
        "private_key": TEST_PRIVATE_KEY,
        "token_uri": token_uri,
    })
    .to_string()
}

/// A Shopify order object as the Admin API returns it.
pub fn shopify_order(name: &str, total: &str) -> serde_json::Value {
    json!({
        "name": name,
        "total_price": total,
        "financial_status": "paid",
        "payment_gateway_names": ["shopify_payments"],
    })
}

/// A WooCommerce order object as the REST API returns it.
pub fn woo_order(id: i64, total: &str) -> serde_json::Value {
    json!({
        "id": id,
        "total": total,
        "status": "completed",
        "payment_method": "stripe",
        "payment_method_title": "Credit card (Stripe)",
    })
}

/// A GA4 report row: transactionId, date (YYYYMMDD), browser, device, revenue.
pub fn ga4_row(id: &str, date: &str, revenue: &str) -> serde_json::Value {
    json!({
        "dimensionValues": [
            { "value": id },
            { "value": date },
            { "value": "Chrome" },
            { "value": "desktop" },
        ],
        "metricValues": [ { "value": revenue } ],
    })
}
