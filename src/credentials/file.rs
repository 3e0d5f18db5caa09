use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::models::UserRecord;

#[derive(Debug, Error)]
pub enum PersistError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed credential file {path}: {source}")]
    Format {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },
}

/// JSON file mapping usernames to their records.
#[derive(Debug, Clone)]
pub struct CredentialFile {
    path: PathBuf,
}

impl CredentialFile {
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the file. `Ok(None)` means it does not exist yet.
    pub async fn load(&self) -> Result<Option<BTreeMap<String, UserRecord>>, PersistError> {
        let content = match tokio::fs::read(&self.path).await {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(source) => {
                return Err(PersistError::Io {
                    path: self.path.clone(),
                    source,
                });
            }
        };

        let records = serde_json::from_slice(&content).map_err(|source| PersistError::Format {
            path: self.path.clone(),
            source,
        })?;

        Ok(Some(records))
    }

    /// Replaces the file contents through a sibling temp file and a rename so
    /// readers never observe a half-written file.
    pub async fn save(&self, records: &BTreeMap<String, UserRecord>) -> Result<(), PersistError> {
        let io_err = |source| PersistError::Io {
            path: self.path.clone(),
            source,
        };

        if let Some(parent) = self.path.parent()
            && !parent.as_os_str().is_empty()
        {
            tokio::fs::create_dir_all(parent).await.map_err(io_err)?;
        }

        let content = serde_json::to_vec_pretty(records).map_err(|source| PersistError::Format {
            path: self.path.clone(),
            source,
        })?;

        let tmp_path = self.path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, content)
            .await
            .map_err(io_err)?;
        tokio::fs::rename(&tmp_path, &self.path)
            .await
            .map_err(io_err)?;

        debug!(path = %self.path.display(), users = records.len(), "Credential file written");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(is_admin: bool) -> UserRecord {
        UserRecord::new(
            "$argon2id$v=19$m=256,t=1,p=1$c2FsdA$aGFzaA".to_string(),
            is_admin,
        )
    }

    #[tokio::test]
    async fn test_missing_file_loads_as_none() {
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialFile::new(dir.path().join("users.json"));
        assert!(file.load().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let file = CredentialFile::new(dir.path().join("nested").join("users.json"));

        let mut records = BTreeMap::new();
        records.insert("admin".to_string(), record(true));
        records.insert("bob".to_string(), record(false));
        file.save(&records).await.unwrap();

        let loaded = file.load().await.unwrap().unwrap();
        assert_eq!(loaded, records);
        assert!(!dir.path().join("nested").join("users.json.tmp").exists());
    }

    #[tokio::test]
    async fn test_records_without_account_id_get_one() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(
            &path,
            br#"{"admin":{"password_hash":"x","is_admin":true,"created_at":"2026-01-01T00:00:00Z"}}"#,
        )
        .unwrap();

        let loaded = CredentialFile::new(&path).load().await.unwrap().unwrap();
        assert!(!loaded["admin"].account_id.is_nil());
    }

    #[tokio::test]
    async fn test_malformed_file_is_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("users.json");
        std::fs::write(&path, b"{ not json").unwrap();

        let err = CredentialFile::new(&path).load().await.unwrap_err();
        assert!(matches!(err, PersistError::Format { .. }));
    }
}
