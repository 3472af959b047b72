//! crosscheck job orchestration
//!
//! The component that drives one reconciliation run from trigger to
//! terminal state:
//!
//! - [`executor::JobExecutor`] — the state machine and attempt loop, with
//!   `run_job` / `retry_job` / `send_test_webhook` entry points for the
//!   scheduling and API layers
//! - [`retry::RetryPolicy`] — exponential backoff between attempts
//! - [`email::EmailNotifier`] — the email notification channel
//! - [`config::RuntimeConfig`] — fail-fast environment configuration

pub mod config;
pub mod email;
pub mod executor;
pub mod retry;

pub use config::{ConfigError, RuntimeConfig};
pub use email::{EmailConfig, EmailNotifier, LogMailer, Mailer};
pub use executor::{JobError, JobExecutor, JobRequest};
pub use retry::RetryPolicy;
