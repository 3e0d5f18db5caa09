//! Username/password records for the service.
//!
//! The in-memory map is authoritative for the running process. Every
//! mutation is mirrored to the credential file on a best-effort basis: a
//! failed write is logged and reported as [`Durability::InMemoryOnly`], it
//! never undoes the mutation.

mod file;
pub mod password;

pub use file::{CredentialFile, PersistError};

use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::{Mutex, MutexGuard};
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::{Config, SecurityConfig};
use crate::models::{UserRecord, UserSummary};

#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("User '{0}' already exists")]
    DuplicateUser(String),

    #[error("You cannot delete your own account")]
    SelfDeletion,

    #[error("User '{0}' not found")]
    NotFound(String),

    #[error("Password hashing failed: {0}")]
    Hashing(String),
}

/// Whether a mutation also reached the credential file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Durability {
    Persisted,
    InMemoryOnly { reason: String },
}

impl Durability {
    #[must_use]
    pub const fn is_persisted(&self) -> bool {
        matches!(self, Self::Persisted)
    }
}

/// Outcome of a successful delete. The caller owns purging whatever else
/// belongs to `username`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub username: String,
    pub account_id: Uuid,
    pub durability: Durability,
}

/// Account used to seed an empty store.
#[derive(Clone)]
pub struct BootstrapAdmin {
    pub username: String,
    pub password: String,
}

impl std::fmt::Debug for BootstrapAdmin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BootstrapAdmin")
            .field("username", &self.username)
            .finish_non_exhaustive()
    }
}

#[derive(Default)]
struct Inner {
    records: BTreeMap<String, UserRecord>,
    loaded: bool,
}

pub struct CredentialStore {
    inner: Mutex<Inner>,
    file: Option<CredentialFile>,
    security: SecurityConfig,
    bootstrap: BootstrapAdmin,
}

impl CredentialStore {
    #[must_use]
    pub fn new(
        file: Option<CredentialFile>,
        security: SecurityConfig,
        bootstrap: BootstrapAdmin,
    ) -> Self {
        Self {
            inner: Mutex::new(Inner::default()),
            file,
            security,
            bootstrap,
        }
    }

    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        let credentials = &config.credentials;
        Self::new(
            credentials.path.as_ref().map(CredentialFile::new),
            config.security.clone(),
            BootstrapAdmin {
                username: credentials.default_admin_username.clone(),
                password: credentials.admin_password().to_string(),
            },
        )
    }

    /// Loads the credential file, or seeds the bootstrap admin when there is
    /// nothing to load. Later calls return the already loaded records.
    pub async fn initialize(&self) -> Result<BTreeMap<String, UserRecord>, CredentialError> {
        let inner = self.loaded().await?;
        Ok(inner.records.clone())
    }

    /// True iff the user exists and the password matches. Unknown users and
    /// wrong passwords are indistinguishable to the caller.
    pub async fn verify(&self, username: &str, password: &str) -> Result<bool, CredentialError> {
        let password_hash = {
            let inner = self.loaded().await?;
            match inner.records.get(username) {
                Some(record) => record.password_hash.clone(),
                None => return Ok(false),
            }
        };

        match password::verify_password_blocking(password, &password_hash).await {
            Ok(valid) => Ok(valid),
            Err(e) => {
                warn!(username, error = %e, "Stored password hash could not be checked");
                Ok(false)
            }
        }
    }

    pub async fn get(&self, username: &str) -> Result<Option<UserSummary>, CredentialError> {
        let inner = self.loaded().await?;
        Ok(inner
            .records
            .get(username)
            .map(|record| UserSummary::from_record(username, record)))
    }

    pub async fn list(&self) -> Result<Vec<UserSummary>, CredentialError> {
        let inner = self.loaded().await?;
        Ok(inner
            .records
            .iter()
            .map(|(username, record)| UserSummary::from_record(username, record))
            .collect())
    }

    pub async fn create(
        &self,
        username: &str,
        password: &str,
        is_admin: bool,
    ) -> Result<Durability, CredentialError> {
        if self.loaded().await?.records.contains_key(username) {
            return Err(CredentialError::DuplicateUser(username.to_string()));
        }

        // Hashing is slow; other requests keep using the store meanwhile.
        let password_hash = password::hash_password_blocking(password, &self.security)
            .await
            .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        let mut inner = self.loaded().await?;
        if inner.records.contains_key(username) {
            return Err(CredentialError::DuplicateUser(username.to_string()));
        }

        inner
            .records
            .insert(username.to_string(), UserRecord::new(password_hash, is_admin));
        info!(username, is_admin, "User created");

        Ok(self.persist(&inner.records).await)
    }

    pub async fn delete(
        &self,
        username: &str,
        requesting_username: &str,
    ) -> Result<Deletion, CredentialError> {
        if username == requesting_username {
            return Err(CredentialError::SelfDeletion);
        }

        let mut inner = self.loaded().await?;

        let Some(removed) = inner.records.remove(username) else {
            return Err(CredentialError::NotFound(username.to_string()));
        };
        info!(username, deleted_by = requesting_username, "User deleted");

        let durability = self.persist(&inner.records).await;
        Ok(Deletion {
            username: username.to_string(),
            account_id: removed.account_id,
            durability,
        })
    }

    /// Locks the store, loading it first if this is the first access.
    async fn loaded(&self) -> Result<MutexGuard<'_, Inner>, CredentialError> {
        let mut inner = self.inner.lock().await;
        if inner.loaded {
            return Ok(inner);
        }

        let existing = match &self.file {
            Some(file) => match file.load().await {
                Ok(Some(records)) => Some(Ok(records)),
                Ok(None) => None,
                Err(e) => Some(Err(e)),
            },
            None => None,
        };

        match existing {
            Some(Ok(records)) => {
                info!(users = records.len(), "Loaded credential file");
                inner.records = records;
            }
            Some(Err(e)) => {
                // The unreadable file is left alone so an operator can repair it.
                warn!(error = %e, "Credential file unreadable, starting with bootstrap admin in memory");
                inner.records = self.bootstrap_records().await?;
            }
            None => {
                inner.records = self.bootstrap_records().await?;
                if let Durability::InMemoryOnly { reason } = self.persist(&inner.records).await
                    && self.file.is_some()
                {
                    warn!(reason = %reason, "Bootstrap admin kept in memory only");
                }
            }
        }

        inner.loaded = true;
        Ok(inner)
    }

    async fn bootstrap_records(&self) -> Result<BTreeMap<String, UserRecord>, CredentialError> {
        if self.bootstrap.password == crate::config::FALLBACK_ADMIN_PASSWORD {
            warn!(
                username = %self.bootstrap.username,
                "Seeding default admin with the fallback password; set {} to override",
                crate::config::ADMIN_PASSWORD_ENV
            );
        } else {
            info!(username = %self.bootstrap.username, "Seeding default admin account");
        }

        let password_hash =
            password::hash_password_blocking(&self.bootstrap.password, &self.security)
                .await
                .map_err(|e| CredentialError::Hashing(e.to_string()))?;

        let mut records = BTreeMap::new();
        records.insert(
            self.bootstrap.username.clone(),
            UserRecord::new(password_hash, true),
        );
        Ok(records)
    }

    async fn persist(&self, records: &BTreeMap<String, UserRecord>) -> Durability {
        let Some(file) = &self.file else {
            return Durability::InMemoryOnly {
                reason: "no credential file configured".to_string(),
            };
        };

        match file.save(records).await {
            Ok(()) => Durability::Persisted,
            Err(e) => {
                warn!(error = %e, "Failed to persist credential file; keeping in-memory state");
                metrics::counter!("credential_persist_failures_total").increment(1);
                Durability::InMemoryOnly {
                    reason: e.to_string(),
                }
            }
        }
    }
}
