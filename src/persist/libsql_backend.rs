//! libSQL backend — local-file `ContextRepository` implementation.
//!
//! Stores each session context as a JSON snapshot keyed by session id.
//! Supports local file and in-memory databases; migrations run on open.

use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use libsql::{params, Connection, Database as LibSqlDatabase};
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::SessionContext;

use super::traits::ContextRepository;

/// libSQL-backed session context repository.
///
/// Holds a single connection reused for all operations —
/// `libsql::Connection` is `Send + Sync` and safe for concurrent async use.
pub struct LibSqlRepository {
    #[allow(dead_code)]
    db: Arc<LibSqlDatabase>,
    conn: Connection,
}

impl LibSqlRepository {
    /// Open (or create) a local database file and run migrations.
    pub async fn new_local(path: &Path) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Open(format!("Failed to create store directory: {e}")))?;
        }

        let db = libsql::Builder::new_local(path)
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to open libSQL database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let repo = Self {
            db: Arc::new(db),
            conn,
        };
        repo.init_schema().await?;
        info!(path = %path.display(), "Session store opened");
        Ok(repo)
    }

    /// Create an in-memory database (for tests).
    pub async fn new_memory() -> Result<Self, StoreError> {
        let db = libsql::Builder::new_local(":memory:")
            .build()
            .await
            .map_err(|e| StoreError::Open(format!("Failed to create in-memory database: {e}")))?;
        let conn = db
            .connect()
            .map_err(|e| StoreError::Open(format!("Failed to create connection: {e}")))?;

        let repo = Self {
            db: Arc::new(db),
            conn,
        };
        repo.init_schema().await?;
        Ok(repo)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        self.conn
            .execute_batch(
                "CREATE TABLE IF NOT EXISTS session_contexts (
                    session_id TEXT PRIMARY KEY,
                    state TEXT NOT NULL,
                    context TEXT NOT NULL,
                    archived INTEGER NOT NULL DEFAULT 0,
                    created_at TEXT NOT NULL,
                    updated_at TEXT NOT NULL
                );
                CREATE INDEX IF NOT EXISTS idx_session_contexts_archived
                    ON session_contexts(archived);",
            )
            .await
            .map_err(|e| StoreError::Open(format!("Schema init failed: {e}")))?;
        Ok(())
    }
}

#[async_trait]
impl ContextRepository for LibSqlRepository {
    async fn load_context(&self, session_id: Uuid) -> Result<Option<SessionContext>, StoreError> {
        let mut rows = self
            .conn
            .query(
                "SELECT context FROM session_contexts WHERE session_id = ?1 AND archived = 0",
                params![session_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("load_context: {e}")))?;

        match rows.next().await {
            Ok(Some(row)) => {
                let raw: String = row
                    .get(0)
                    .map_err(|e| StoreError::Query(format!("load_context row: {e}")))?;
                let context: SessionContext = serde_json::from_str(&raw)
                    .map_err(|e| StoreError::Serialization(format!("load_context: {e}")))?;
                Ok(Some(context))
            }
            Ok(None) => Ok(None),
            Err(e) => Err(StoreError::Query(format!("load_context: {e}"))),
        }
    }

    async fn save_context(&self, context: &SessionContext) -> Result<(), StoreError> {
        let raw = serde_json::to_string(context)
            .map_err(|e| StoreError::Serialization(format!("save_context: {e}")))?;
        self.conn
            .execute(
                "INSERT INTO session_contexts (session_id, state, context, archived, created_at, updated_at)
                 VALUES (?1, ?2, ?3, 0, ?4, ?5)
                 ON CONFLICT(session_id) DO UPDATE SET
                     state = excluded.state,
                     context = excluded.context,
                     updated_at = excluded.updated_at",
                params![
                    context.session_id.to_string(),
                    context.current_state.to_string(),
                    raw,
                    context.created_at.to_rfc3339(),
                    Utc::now().to_rfc3339(),
                ],
            )
            .await
            .map_err(|e| StoreError::Query(format!("save_context: {e}")))?;

        debug!(session_id = %context.session_id, state = %context.current_state, "Context saved");
        Ok(())
    }

    async fn archive_context(&self, session_id: Uuid) -> Result<(), StoreError> {
        self.conn
            .execute(
                "UPDATE session_contexts SET archived = 1, updated_at = ?1 WHERE session_id = ?2",
                params![Utc::now().to_rfc3339(), session_id.to_string()],
            )
            .await
            .map_err(|e| StoreError::Query(format!("archive_context: {e}")))?;

        debug!(session_id = %session_id, "Context archived");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::types::{Annotation, Entity, EntityKind, Intent};
    use crate::dialogue::ConversationState;

    fn populated_context() -> SessionContext {
        let mut ctx = SessionContext::new(Uuid::new_v4());
        ctx.merge_annotation(
            Annotation {
                intent: Intent::new("budget_shared", 0.8),
                entities: vec![Entity::new(EntityKind::Money, "$2000", (0, 5), 0.9)],
                ..Annotation::fallback()
            },
            0.4,
        );
        ctx.path.push(ConversationState::NeedsAssessment);
        ctx.current_state = ConversationState::NeedsAssessment;
        ctx
    }

    #[tokio::test]
    async fn save_then_load_roundtrips_full_context() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let ctx = populated_context();
        repo.save_context(&ctx).await.unwrap();

        let loaded = repo.load_context(ctx.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.session_id, ctx.session_id);
        assert_eq!(loaded.current_state, ConversationState::NeedsAssessment);
        assert_eq!(loaded.path, ctx.path);
        assert_eq!(loaded.preferences.budget.as_deref(), Some("$2000"));
        assert!(loaded.last_annotation.is_some());
    }

    #[tokio::test]
    async fn save_is_an_upsert() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let mut ctx = populated_context();
        repo.save_context(&ctx).await.unwrap();

        ctx.current_state = ConversationState::DestinationSelection;
        ctx.path.push(ConversationState::DestinationSelection);
        repo.save_context(&ctx).await.unwrap();

        let loaded = repo.load_context(ctx.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.current_state, ConversationState::DestinationSelection);
        assert_eq!(loaded.path.len(), 3);
    }

    #[tokio::test]
    async fn unknown_session_loads_as_none() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        assert!(repo.load_context(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn archived_contexts_stop_loading() {
        let repo = LibSqlRepository::new_memory().await.unwrap();
        let ctx = populated_context();
        repo.save_context(&ctx).await.unwrap();
        repo.archive_context(ctx.session_id).await.unwrap();

        assert!(repo.load_context(ctx.session_id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn contexts_survive_reopen() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sessions.db");
        let ctx = populated_context();

        {
            let repo = LibSqlRepository::new_local(&path).await.unwrap();
            repo.save_context(&ctx).await.unwrap();
        }

        let repo = LibSqlRepository::new_local(&path).await.unwrap();
        let loaded = repo.load_context(ctx.session_id).await.unwrap().unwrap();
        assert_eq!(loaded.preferences.budget.as_deref(), Some("$2000"));
    }
}
