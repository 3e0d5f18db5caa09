use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored account. The username is the key of the owning map, so it is
/// not repeated here.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct UserRecord {
    /// Fresh for every created account, so a username that is deleted and
    /// created again names a different account.
    #[serde(default = "Uuid::new_v4")]
    pub account_id: Uuid,

    /// Argon2id PHC string
    pub password_hash: String,

    pub is_admin: bool,

    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    #[must_use]
    pub fn new(password_hash: String, is_admin: bool) -> Self {
        Self {
            account_id: Uuid::new_v4(),
            password_hash,
            is_admin,
            created_at: Utc::now(),
        }
    }
}

/// User data handed out of the credential store (without the password hash)
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct UserSummary {
    pub username: String,
    pub account_id: Uuid,
    pub is_admin: bool,
    pub created_at: DateTime<Utc>,
}

impl UserSummary {
    #[must_use]
    pub fn from_record(username: &str, record: &UserRecord) -> Self {
        Self {
            username: username.to_string(),
            account_id: record.account_id,
            is_admin: record.is_admin,
            created_at: record.created_at,
        }
    }

    #[must_use]
    pub const fn role(&self) -> &'static str {
        if self.is_admin { "admin" } else { "user" }
    }

    #[must_use]
    pub fn account_ref(&self) -> AccountRef {
        AccountRef {
            username: self.username.clone(),
            account_id: self.account_id,
        }
    }
}

/// One specific account: its name plus the id that is never reused.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountRef {
    pub username: String,
    pub account_id: Uuid,
}
