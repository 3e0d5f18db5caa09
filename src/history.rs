//! Per-account log of generation results, kept only for the life of the process.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::models::{GenerationKind, GenerationRecord};

#[derive(Default)]
struct Inner {
    by_account: HashMap<Uuid, Vec<Arc<GenerationRecord>>>,
    /// Accounts whose history was purged. Account ids are never reused, so
    /// anything still arriving for them belongs to a deleted account.
    retired: HashSet<Uuid>,
}

/// Records are keyed by account id rather than username, so a user created
/// under a deleted user's name starts with an empty history.
pub struct GenerationHistory {
    inner: RwLock<Inner>,
    retain: usize,
}

impl GenerationHistory {
    /// `retain` is the number of records kept per account. Older ones are
    /// dropped on append.
    #[must_use]
    pub fn new(retain: usize) -> Self {
        Self {
            inner: RwLock::new(Inner::default()),
            retain: retain.max(1),
        }
    }

    /// Adds a record to the end of the account's sequence. Returns `None`,
    /// storing nothing, when the account has already been purged.
    pub async fn append(
        &self,
        owner: Uuid,
        record: GenerationRecord,
    ) -> Option<Arc<GenerationRecord>> {
        let record = Arc::new(record);
        let mut inner = self.inner.write().await;
        if inner.retired.contains(&owner) {
            tracing::info!(account_id = %owner, "Dropping generation of a deleted account");
            return None;
        }

        let records = inner.by_account.entry(owner).or_default();
        records.push(record.clone());
        if records.len() > self.retain {
            let excess = records.len() - self.retain;
            records.drain(..excess);
        }
        drop(inner);

        metrics::counter!("generation_history_appends_total", "kind" => record.kind.to_string())
            .increment(1);
        Some(record)
    }

    /// The last `limit` records of `kind`, most recent first.
    pub async fn recent(
        &self,
        owner: Uuid,
        kind: GenerationKind,
        limit: usize,
    ) -> Vec<Arc<GenerationRecord>> {
        let inner = self.inner.read().await;
        let Some(records) = inner.by_account.get(&owner) else {
            return Vec::new();
        };

        records
            .iter()
            .rev()
            .filter(|r| r.kind == kind)
            .take(limit)
            .cloned()
            .collect()
    }

    /// Looks up one of the account's own records.
    pub async fn find(&self, owner: Uuid, id: Uuid) -> Option<Arc<GenerationRecord>> {
        self.inner
            .read()
            .await
            .by_account
            .get(&owner)
            .and_then(|records| records.iter().find(|r| r.id == id).cloned())
    }

    /// Drops every record owned by `owner` and refuses later appends for it.
    /// Returns how many were removed.
    pub async fn purge(&self, owner: Uuid) -> usize {
        let mut inner = self.inner.write().await;
        inner.retired.insert(owner);
        inner
            .by_account
            .remove(&owner)
            .map_or(0, |records| records.len())
    }
}
