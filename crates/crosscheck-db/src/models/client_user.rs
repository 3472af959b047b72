//! Client user mapping: who gets notified about a client's job outcomes.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Membership state of a user on a client.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "varchar", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ClientUserStatus {
    Active,
    Inactive,
}

impl ClientUserStatus {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Active => "active",
            Self::Inactive => "inactive",
        }
    }
}

impl fmt::Display for ClientUserStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// A user mapped to a client organization.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct ClientUser {
    pub id: Uuid,
    pub client_id: Uuid,
    /// Notification address; users without one are skipped by the email
    /// channel.
    pub email: Option<String>,
    pub status: ClientUserStatus,
    pub created_at: DateTime<Utc>,
}

impl ClientUser {
    /// Whether the email channel should consider this user.
    #[must_use]
    pub fn is_notifiable(&self) -> bool {
        self.status == ClientUserStatus::Active && self.email.is_some()
    }
}
