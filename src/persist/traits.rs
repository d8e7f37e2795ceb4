//! Backend-agnostic persistence contract for session contexts.

use async_trait::async_trait;
use uuid::Uuid;

use crate::error::StoreError;
use crate::session::SessionContext;

/// External session persistence.
///
/// The engine treats this as best-effort: failures are retried with
/// bounded backoff and then degraded to a soft warning — a broken backend
/// never blocks a conversation.
#[async_trait]
pub trait ContextRepository: Send + Sync {
    /// Load a session context. `Ok(None)` means the session is unseen,
    /// which callers treat as "create new", never as an error.
    async fn load_context(&self, session_id: Uuid) -> Result<Option<SessionContext>, StoreError>;

    /// Persist a session context snapshot (upsert).
    async fn save_context(&self, context: &SessionContext) -> Result<(), StoreError>;

    /// Mark a session archived. Archived contexts are no longer returned
    /// by `load_context`.
    async fn archive_context(&self, session_id: Uuid) -> Result<(), StoreError>;
}
