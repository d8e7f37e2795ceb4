//! Context store — owns the live `SessionContext` registry.
//!
//! One entry per session id, created lazily on first touch. Each context
//! sits behind its own async mutex so mutations for a given session are
//! serialized, while different sessions proceed fully in parallel.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info};
use uuid::Uuid;

use crate::annotate::types::Annotation;

use super::context::SessionContext;

/// Handle to one session's serialized context.
pub type SessionHandle = Arc<Mutex<SessionContext>>;

/// In-memory registry of live session contexts.
#[derive(Default)]
pub struct ContextStore {
    sessions: RwLock<HashMap<Uuid, SessionHandle>>,
}

impl ContextStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a session's handle, if it is live.
    pub async fn get(&self, session_id: Uuid) -> Option<SessionHandle> {
        self.sessions.read().await.get(&session_id).cloned()
    }

    /// Get or lazily create a session.
    pub async fn get_or_create(&self, session_id: Uuid) -> SessionHandle {
        if let Some(handle) = self.get(session_id).await {
            return handle;
        }
        let mut sessions = self.sessions.write().await;
        // Double-check under the write lock — another turn may have won.
        sessions
            .entry(session_id)
            .or_insert_with(|| {
                debug!(session_id = %session_id, "Creating new session context");
                Arc::new(Mutex::new(SessionContext::new(session_id)))
            })
            .clone()
    }

    /// Register a context loaded from the persistence backend.
    ///
    /// If the session is already live, the live entry wins.
    pub async fn adopt(&self, context: SessionContext) -> SessionHandle {
        let mut sessions = self.sessions.write().await;
        sessions
            .entry(context.session_id)
            .or_insert_with(|| Arc::new(Mutex::new(context)))
            .clone()
    }

    /// Whether a session is currently live.
    pub async fn contains(&self, session_id: Uuid) -> bool {
        self.sessions.read().await.contains_key(&session_id)
    }

    /// Merge an annotation into a session's context, creating the session
    /// if needed. Serialized per session by the context mutex.
    pub async fn merge(&self, session_id: Uuid, annotation: Annotation, ema_rate: f32) {
        let handle = self.get_or_create(session_id).await;
        let mut ctx = handle.lock().await;
        ctx.merge_annotation(annotation, ema_rate);
    }

    /// Reset a session's state machine. Returns false for unknown sessions.
    pub async fn reset(&self, session_id: Uuid) -> bool {
        match self.get(session_id).await {
            Some(handle) => {
                handle.lock().await.reset();
                info!(session_id = %session_id, "Session reset");
                true
            }
            None => false,
        }
    }

    /// Remove a session from the live registry, returning a snapshot of
    /// its final context. In-flight turns for the session observe the
    /// removal and discard their work.
    pub async fn archive(&self, session_id: Uuid) -> Option<SessionContext> {
        let handle = self.sessions.write().await.remove(&session_id)?;
        let snapshot = handle.lock().await.clone();
        info!(session_id = %session_id, turns = snapshot.metrics.turn_count, "Session archived");
        Some(snapshot)
    }

    /// Ids of all live sessions.
    pub async fn session_ids(&self) -> Vec<Uuid> {
        self.sessions.read().await.keys().copied().collect()
    }

    pub async fn len(&self) -> usize {
        self.sessions.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.sessions.read().await.is_empty()
    }
}
