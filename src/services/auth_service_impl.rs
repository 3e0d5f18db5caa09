//! Credential-store implementation of the `AuthService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::credentials::CredentialStore;
use crate::models::UserSummary;
use crate::services::auth_service::{AuthError, AuthService};

pub struct CredentialAuthService {
    store: Arc<CredentialStore>,
}

impl CredentialAuthService {
    #[must_use]
    pub const fn new(store: Arc<CredentialStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl AuthService for CredentialAuthService {
    async fn login(&self, username: &str, password: &str) -> Result<UserSummary, AuthError> {
        if username.is_empty() {
            return Err(AuthError::Validation("Username is required".to_string()));
        }
        if password.is_empty() {
            return Err(AuthError::Validation("Password is required".to_string()));
        }

        if !self.store.verify(username, password).await? {
            info!(username, "Rejected login attempt");
            metrics::counter!("auth_login_failures_total").increment(1);
            return Err(AuthError::InvalidCredentials);
        }

        // The record can vanish between verify and get if an admin deletes
        // it concurrently; that is reported like any other failed login.
        let user = self
            .store
            .get(username)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        info!(username, is_admin = user.is_admin, "User logged in");
        Ok(user)
    }

    async fn account(&self, username: &str) -> Result<Option<UserSummary>, AuthError> {
        Ok(self.store.get(username).await?)
    }
}
