//! crosscheck source adapters
//!
//! One [`Source`] implementation per external provider, all emitting the
//! same normalized record shape:
//!
//! - [`ga4::Ga4Source`] — Google Analytics 4 Data API (service-account auth)
//! - [`shopify::ShopifySource`] — Shopify Admin API (Link-header pagination)
//! - [`woocommerce::WooCommerceSource`] — WooCommerce REST API (page-count
//!   pagination)
//!
//! Adapters validate their credentials at construction, classify every
//! failure into the [`crosscheck_core::SourceError`] taxonomy, and drain
//! pagination fully (bounded by [`MAX_PAGES`]).

pub mod cache;
pub mod config;
pub mod ga4;
pub mod shopify;
pub mod source;
pub mod woocommerce;

pub use cache::FetchCache;
pub use config::{Ga4Config, ShopifyConfig, SourceConfig, WooCommerceConfig};
pub use source::{build_source, Source};

/// Hard ceiling on pages drained from a paginating provider. Guarantees
/// termination even if a provider's pagination loops; hitting it logs a
/// warning rather than failing the fetch.
pub const MAX_PAGES: usize = 100;

/// Timeout applied to every provider HTTP call.
pub const PROVIDER_TIMEOUT_SECS: u64 = 30;
