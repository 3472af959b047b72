//! Runtime configuration loaded from environment variables.
//!
//! Fail-fast: required variables must be present and valid or loading
//! errors out with a message naming the variable. Insecure development
//! defaults are tolerated but logged loudly.

use std::env;
use std::time::Duration;

use thiserror::Error;

use crate::email::EmailConfig;

/// The documented development-only encryption key (32 bytes of 0x11).
pub const INSECURE_DEV_KEY: &str =
    "1111111111111111111111111111111111111111111111111111111111111111";

/// Errors from configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is absent.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is present but unusable.
    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Everything the orchestrator needs from the environment.
#[derive(Debug, Clone)]
pub struct RuntimeConfig {
    /// 32-byte key for credentials at rest (`CROSSCHECK_ENCRYPTION_KEY`,
    /// 64 hex chars).
    pub encryption_key: Vec<u8>,
    /// Per-delivery webhook timeout (`CROSSCHECK_WEBHOOK_TIMEOUT_SECS`,
    /// default 30).
    pub webhook_timeout: Duration,
    /// Email channel settings (`CROSSCHECK_EMAIL_*`).
    pub email: EmailConfig,
}

impl RuntimeConfig {
    /// Load and validate configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let key_hex = env::var("CROSSCHECK_ENCRYPTION_KEY")
            .map_err(|_| ConfigError::Missing("CROSSCHECK_ENCRYPTION_KEY"))?;

        if key_hex == INSECURE_DEV_KEY {
            tracing::warn!(
                "CROSSCHECK_ENCRYPTION_KEY is the insecure development default; \
                 do not run production with this key"
            );
        }

        let encryption_key = hex::decode(&key_hex).map_err(|e| ConfigError::Invalid {
            key: "CROSSCHECK_ENCRYPTION_KEY",
            reason: format!("not valid hex: {e}"),
        })?;
        if encryption_key.len() != 32 {
            return Err(ConfigError::Invalid {
                key: "CROSSCHECK_ENCRYPTION_KEY",
                reason: format!("expected 32 bytes, got {}", encryption_key.len()),
            });
        }

        let webhook_timeout = match env::var("CROSSCHECK_WEBHOOK_TIMEOUT_SECS") {
            Ok(raw) => Duration::from_secs(raw.parse().map_err(|e| ConfigError::Invalid {
                key: "CROSSCHECK_WEBHOOK_TIMEOUT_SECS",
                reason: format!("not a number: {e}"),
            })?),
            Err(_) => Duration::from_secs(crosscheck_webhooks::DEFAULT_TIMEOUT_SECS),
        };

        let email = EmailConfig {
            enabled: env::var("CROSSCHECK_EMAIL_ENABLED")
                .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
                .unwrap_or(false),
            from_email: env::var("CROSSCHECK_EMAIL_FROM").ok(),
            from_name: env::var("CROSSCHECK_EMAIL_FROM_NAME").ok(),
            dashboard_url: env::var("CROSSCHECK_DASHBOARD_URL")
                .unwrap_or_else(|_| "http://localhost:3000".to_string()),
        };

        if email.enabled && email.from_email.is_none() {
            return Err(ConfigError::Invalid {
                key: "CROSSCHECK_EMAIL_FROM",
                reason: "required when CROSSCHECK_EMAIL_ENABLED is set".to_string(),
            });
        }

        Ok(Self {
            encryption_key,
            webhook_timeout,
            email,
        })
    }
}

/// Initialize JSON logging with an env-filter directive.
///
/// Embedders call this once at startup; tests use their own subscriber.
pub fn init_logging(default_filter: &str) {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_filter.to_string()));

    let fmt_layer = fmt::layer()
        .json()
        .with_target(true)
        .flatten_event(true);

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(filter)
        .init();
}
