//! Request extractor that hands each handler the caller's session.

use axum::{extract::FromRequestParts, http::request::Parts};
use tower_sessions::Session;

use super::ApiError;
use crate::constants::session::STATE_KEY;
use crate::models::{AccountRef, UserSummary};
use crate::session::{SessionPhase, SessionState};

/// The caller's session state plus the store handle needed to change it.
/// A request without a session cookie starts out anonymous.
pub struct SessionGate {
    session: Session,
    state: SessionState,
}

impl<S> FromRequestParts<S> for SessionGate
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let session = Session::from_request_parts(parts, state)
            .await
            .map_err(|(_, msg)| ApiError::internal(format!("Session layer missing: {msg}")))?;

        let state = session
            .get::<SessionState>(STATE_KEY)
            .await
            .map_err(|e| ApiError::internal(format!("Session error: {e}")))?
            .unwrap_or_default();

        Ok(Self { session, state })
    }
}

impl SessionGate {
    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Username of the logged-in caller.
    pub fn require_user(&self) -> Result<&str, ApiError> {
        self.state.username().ok_or_else(ApiError::unauthorized)
    }

    /// The logged-in caller's account.
    pub fn require_account(&self) -> Result<AccountRef, ApiError> {
        self.state.account().ok_or_else(ApiError::unauthorized)
    }

    /// Username of an admin caller that has opened the user directory.
    pub fn require_admin_view(&self) -> Result<&str, ApiError> {
        match self.state.phase() {
            SessionPhase::Anonymous => Err(ApiError::unauthorized()),
            SessionPhase::AdminView => self.require_user(),
            SessionPhase::Authenticated { is_admin: true } => Err(ApiError::forbidden(
                "Open user management before managing accounts",
            )),
            SessionPhase::Authenticated { is_admin: false } => {
                Err(ApiError::forbidden("Administrator access required"))
            }
        }
    }

    /// Replaces whatever identity the session had with `user`. The session
    /// id is rotated so a pre-login cookie cannot ride along.
    pub async fn establish(&mut self, user: &UserSummary) -> Result<(), ApiError> {
        self.session
            .cycle_id()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to rotate session: {e}")))?;

        self.state = SessionState::authenticated(user);
        self.save().await
    }

    /// Clears every field and discards the server-side session.
    pub async fn clear(&mut self) -> Result<(), ApiError> {
        self.state.clear();
        self.session
            .flush()
            .await
            .map_err(|e| ApiError::internal(format!("Failed to end session: {e}")))
    }

    /// Admin-only switch into the directory view. Returns false, leaving the
    /// session untouched, for anyone else.
    pub async fn open_directory(&mut self) -> Result<bool, ApiError> {
        if !self.state.open_directory() {
            return Ok(false);
        }
        self.save().await?;
        Ok(true)
    }

    pub async fn return_to_main(&mut self) -> Result<(), ApiError> {
        self.state.return_to_main();
        self.save().await
    }

    async fn save(&self) -> Result<(), ApiError> {
        self.session
            .insert(STATE_KEY, &self.state)
            .await
            .map_err(|e| ApiError::internal(format!("Failed to save session: {e}")))
    }
}
