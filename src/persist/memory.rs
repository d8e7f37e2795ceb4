//! In-memory `ContextRepository` — tests and degraded-mode fallback.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::SessionContext;

use super::traits::ContextRepository;

/// Process-local repository with no durability.
#[derive(Default)]
pub struct MemoryRepository {
    contexts: RwLock<HashMap<Uuid, SessionContext>>,
    archived: RwLock<HashSet<Uuid>>,
}

impl MemoryRepository {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored (non-archived) contexts.
    pub async fn len(&self) -> usize {
        let archived = self.archived.read().await;
        self.contexts
            .read()
            .await
            .keys()
            .filter(|id| !archived.contains(id))
            .count()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

#[async_trait]
impl ContextRepository for MemoryRepository {
    async fn load_context(&self, session_id: Uuid) -> Result<Option<SessionContext>, StoreError> {
        if self.archived.read().await.contains(&session_id) {
            return Ok(None);
        }
        Ok(self.contexts.read().await.get(&session_id).cloned())
    }

    async fn save_context(&self, context: &SessionContext) -> Result<(), StoreError> {
        self.contexts
            .write()
            .await
            .insert(context.session_id, context.clone());
        Ok(())
    }

    async fn archive_context(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.archived.write().await.insert(session_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn save_then_load_roundtrips() {
        let repo = MemoryRepository::new();
        let ctx = SessionContext::new(Uuid::new_v4());
        repo.save_context(&ctx).await.unwrap();

        let loaded = repo.load_context(ctx.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, ctx.session_id);
    }

    #[tokio::test]
    async fn unknown_session_loads_as_none() {
        let repo = MemoryRepository::new();
        assert!(repo.load_context(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn archived_sessions_stop_loading() {
        let repo = MemoryRepository::new();
        let ctx = SessionContext::new(Uuid::new_v4());
        repo.save_context(&ctx).await.unwrap();
        repo.archive_context(ctx.session_id).await.unwrap();

        assert!(repo.load_context(ctx.session_id).await.unwrap().is_none());
        assert!(repo.is_empty().await);
    }
}
