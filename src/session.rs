//! Per-browser session state and its transitions.
//!
//! `SessionState` is a plain value; the HTTP layer loads it from the
//! session store at the start of a request and writes it back after a
//! transition (see `api::session::SessionGate`).

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{AccountRef, UserSummary};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewMode {
    #[default]
    Normal,
    Admin,
}

/// Where a session sits in the login lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionPhase {
    Anonymous,
    Authenticated { is_admin: bool },
    AdminView,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionState {
    pub logged_in: bool,

    /// Only meaningful while `logged_in` is true.
    pub username: Option<String>,

    /// The account logged in as. A session without one is anonymous.
    #[serde(default)]
    pub account_id: Option<Uuid>,

    /// Copied from the user record at login.
    pub is_admin: bool,

    pub view_mode: ViewMode,
}

impl SessionState {
    #[must_use]
    pub fn authenticated(user: &UserSummary) -> Self {
        Self {
            logged_in: true,
            username: Some(user.username.clone()),
            account_id: Some(user.account_id),
            is_admin: user.is_admin,
            view_mode: ViewMode::Normal,
        }
    }

    #[must_use]
    pub fn username(&self) -> Option<&str> {
        if self.logged_in && self.account_id.is_some() {
            self.username.as_deref()
        } else {
            None
        }
    }

    #[must_use]
    pub fn account(&self) -> Option<AccountRef> {
        Some(AccountRef {
            username: self.username()?.to_string(),
            account_id: self.account_id?,
        })
    }

    /// Whether `current`, the record now stored under this session's
    /// username, is still the account and role that logged in.
    #[must_use]
    pub fn matches(&self, current: &UserSummary) -> bool {
        self.username() == Some(current.username.as_str())
            && self.account_id == Some(current.account_id)
            && self.is_admin == current.is_admin
    }

    #[must_use]
    pub fn phase(&self) -> SessionPhase {
        match (self.username(), self.is_admin, self.view_mode) {
            (None, _, _) => SessionPhase::Anonymous,
            (Some(_), true, ViewMode::Admin) => SessionPhase::AdminView,
            (Some(_), is_admin, _) => SessionPhase::Authenticated { is_admin },
        }
    }

    /// Switches an admin into the directory view. Anyone else is left
    /// exactly as they were. Returns whether the session is now in the
    /// admin view.
    pub fn open_directory(&mut self) -> bool {
        if matches!(
            self.phase(),
            SessionPhase::Authenticated { is_admin: true } | SessionPhase::AdminView
        ) {
            self.view_mode = ViewMode::Admin;
            true
        } else {
            false
        }
    }

    pub fn return_to_main(&mut self) {
        if self.logged_in {
            self.view_mode = ViewMode::Normal;
        }
    }

    /// Resets every field.
    pub fn clear(&mut self) {
        *self = Self::default();
    }
}
