//! Credential-store implementation of the `UserDirectoryService` trait.

use async_trait::async_trait;
use std::sync::Arc;
use tracing::info;

use crate::credentials::CredentialStore;
use crate::history::GenerationHistory;
use crate::models::UserSummary;
use crate::services::directory_service::{
    CreatedUser, DeletedUser, DirectoryError, NewUser, UserDirectoryService,
};

const MAX_USERNAME_CHARS: usize = 64;

pub struct CredentialDirectoryService {
    store: Arc<CredentialStore>,
    history: Arc<GenerationHistory>,
}

impl CredentialDirectoryService {
    #[must_use]
    pub const fn new(store: Arc<CredentialStore>, history: Arc<GenerationHistory>) -> Self {
        Self { store, history }
    }
}

#[async_trait]
impl UserDirectoryService for CredentialDirectoryService {
    async fn list_users(&self) -> Result<Vec<UserSummary>, DirectoryError> {
        Ok(self.store.list().await?)
    }

    async fn create_user(&self, new_user: NewUser) -> Result<CreatedUser, DirectoryError> {
        validate_username(&new_user.username)?;
        if new_user.password.is_empty() {
            return Err(DirectoryError::Validation(
                "Password is required".to_string(),
            ));
        }

        let durability = self
            .store
            .create(&new_user.username, &new_user.password, new_user.is_admin)
            .await?;

        let user = self
            .store
            .get(&new_user.username)
            .await?
            .ok_or_else(|| {
                crate::credentials::CredentialError::NotFound(new_user.username.clone())
            })?;

        Ok(CreatedUser {
            user,
            persisted: durability.is_persisted(),
        })
    }

    async fn delete_user(
        &self,
        username: &str,
        requesting_username: &str,
    ) -> Result<DeletedUser, DirectoryError> {
        let deletion = self.store.delete(username, requesting_username).await?;
        let purged = self.history.purge(deletion.account_id).await;

        info!(
            username = %deletion.username,
            purged_generations = purged,
            "Purged generation history for deleted user"
        );

        Ok(DeletedUser {
            username: deletion.username,
            purged_generations: purged,
            persisted: deletion.durability.is_persisted(),
        })
    }
}

fn validate_username(username: &str) -> Result<(), DirectoryError> {
    if username.trim().is_empty() {
        return Err(DirectoryError::Validation(
            "Username is required".to_string(),
        ));
    }

    if username.trim() != username {
        return Err(DirectoryError::Validation(
            "Username cannot start or end with whitespace".to_string(),
        ));
    }

    if username.chars().count() > MAX_USERNAME_CHARS {
        return Err(DirectoryError::Validation(format!(
            "Username must be {MAX_USERNAME_CHARS} characters or less"
        )));
    }

    if username.chars().any(char::is_control) {
        return Err(DirectoryError::Validation(
            "Username cannot contain control characters".to_string(),
        ));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::SecurityConfig;
    use crate::credentials::{BootstrapAdmin, CredentialError};
    use crate::models::{GenerationKind, GenerationRecord};

    type Fixture = (
        Arc<CredentialStore>,
        Arc<GenerationHistory>,
        CredentialDirectoryService,
    );

    fn directory() -> Fixture {
        let store = Arc::new(CredentialStore::new(
            None,
            SecurityConfig {
                argon2_memory_cost_kib: 256,
                argon2_time_cost: 1,
                argon2_parallelism: 1,
            },
            BootstrapAdmin {
                username: "admin".to_string(),
                password: "admin-pw".to_string(),
            },
        ));
        let history = Arc::new(GenerationHistory::new(100));
        (
            store.clone(),
            history.clone(),
            CredentialDirectoryService::new(store, history),
        )
    }

    fn new_user(name: &str) -> NewUser {
        NewUser {
            username: name.to_string(),
            password: "pw".to_string(),
            is_admin: false,
        }
    }

    #[tokio::test]
    async fn test_delete_purges_history() {
        let (_, history, directory) = directory();
        let carol = directory
            .create_user(new_user("carol"))
            .await
            .unwrap()
            .user
            .account_id;

        for i in 0..3 {
            history
                .append(
                    carol,
                    GenerationRecord::text_to_speech(&format!("take {i}"), "Rachel", "Turbo", vec![]),
                )
                .await;
        }

        let deleted = directory.delete_user("carol", "admin").await.unwrap();
        assert_eq!(deleted.purged_generations, 3);
        assert!(
            history
                .recent(carol, GenerationKind::TextToSpeech, 5)
                .await
                .is_empty()
        );

        let again = directory.create_user(new_user("carol")).await.unwrap();
        assert_ne!(again.user.account_id, carol);
        assert!(
            history
                .append(
                    again.user.account_id,
                    GenerationRecord::text_to_speech("fresh", "Rachel", "Turbo", vec![]),
                )
                .await
                .is_some()
        );
    }

    #[tokio::test]
    async fn test_failed_delete_keeps_history() {
        let (store, history, directory) = directory();
        let admin = store.get("admin").await.unwrap().unwrap().account_id;
        history
            .append(
                admin,
                GenerationRecord::text_to_speech("mine", "Rachel", "Turbo", vec![]),
            )
            .await;

        let err = directory.delete_user("admin", "admin").await.unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::Credential(CredentialError::SelfDeletion)
        ));
        assert_eq!(
            history
                .recent(admin, GenerationKind::TextToSpeech, 5)
                .await
                .len(),
            1
        );
    }

    #[tokio::test]
    async fn test_create_reports_summary() {
        let (_, _, directory) = directory();
        let created = directory
            .create_user(NewUser {
                username: "eve".to_string(),
                password: "pw".to_string(),
                is_admin: true,
            })
            .await
            .unwrap();

        assert_eq!(created.user.username, "eve");
        assert!(created.user.is_admin);
        // No credential file configured in this store.
        assert!(!created.persisted);
        assert_eq!(directory.list_users().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_create() {
        let (_, _, directory) = directory();
        let err = directory.create_user(new_user("admin")).await.unwrap_err();
        assert!(matches!(
            err,
            DirectoryError::Credential(CredentialError::DuplicateUser(_))
        ));
    }

    #[test]
    fn test_validate_username() {
        assert!(validate_username("bob").is_ok());
        assert!(validate_username("Bob Smith").is_ok());
        assert!(validate_username("").is_err());
        assert!(validate_username("   ").is_err());
        assert!(validate_username(" bob").is_err());
        assert!(validate_username(&"x".repeat(65)).is_err());
        assert!(validate_username("bo\nb").is_err());
    }
}
