//! Dialogue engine — orchestrates one turn end to end.
//!
//! Flow per turn: annotate → merge into the session context → advance the
//! state machine → select a tone → append to history → persist. Turns for
//! one session are serialized by the session's context mutex; sessions are
//! processed in parallel across the pool.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{info, warn};
use uuid::Uuid;

use crate::annotate::types::{Annotation, Utterance};
use crate::annotate::AnnotatorPipeline;
use crate::config::EngineConfig;
use crate::dialogue::{ConversationState, DialogueStateMachine, Transition};
use crate::error::EngineError;
use crate::history::{AggregateMetrics, HistoryEntry, SessionHistory, SessionSummary};
use crate::persist::ContextRepository;
use crate::session::store::SessionHandle;
use crate::session::{ContextStore, SessionContext};
use crate::tone::select_tone;

/// Broadcast capacity for the live turn feed.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// Soft warnings attached to an otherwise successful turn.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "warning", rename_all = "snake_case")]
pub enum TurnWarning {
    /// The persistence backend stayed down through all retries; the turn
    /// proceeded against the in-memory context only.
    StoreUnavailable { detail: String },
}

/// Result of processing one turn.
#[derive(Debug, Clone, Serialize)]
pub struct TurnOutcome {
    pub session_id: Uuid,
    pub annotation: Annotation,
    pub previous_state: ConversationState,
    pub new_state: ConversationState,
    /// `None` when the turn produced no state change.
    pub transition: Option<Transition>,
    /// Selected personality profile name.
    pub tone: String,
    pub history_entry: HistoryEntry,
    pub warnings: Vec<TurnWarning>,
}

/// Live feed events for connected clients.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnEvent {
    Turn {
        session_id: Uuid,
        state: ConversationState,
        intent: String,
        tone: String,
        timestamp: chrono::DateTime<Utc>,
    },
    SessionReset {
        session_id: Uuid,
    },
    SessionArchived {
        session_id: Uuid,
    },
}

/// The conversational dialogue core.
pub struct DialogueEngine {
    pipeline: AnnotatorPipeline,
    store: ContextStore,
    history: SessionHistory,
    repo: Arc<dyn ContextRepository>,
    config: EngineConfig,
    events: broadcast::Sender<TurnEvent>,
}

impl DialogueEngine {
    pub fn new(
        pipeline: AnnotatorPipeline,
        repo: Arc<dyn ContextRepository>,
        config: EngineConfig,
    ) -> Self {
        let (events, _rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            pipeline,
            store: ContextStore::new(),
            history: SessionHistory::new(),
            repo,
            config,
            events,
        }
    }

    /// Subscribe to the live turn feed.
    pub fn subscribe(&self) -> broadcast::Receiver<TurnEvent> {
        self.events.subscribe()
    }

    /// Process one inbound turn.
    ///
    /// `explicit_action` takes precedence over the detected intent as the
    /// transition trigger, and unlike intents it gets no `continue`
    /// fallback — an undeclared action is a no-op result.
    pub async fn process_turn(
        &self,
        session_id: Uuid,
        text: &str,
        explicit_action: Option<&str>,
    ) -> Result<TurnOutcome, EngineError> {
        let trimmed = text.trim();
        if trimmed.is_empty() {
            return Err(EngineError::EmptyUtterance { session_id });
        }

        let mut warnings = Vec::new();
        let handle = self.session_handle(session_id, &mut warnings).await;

        // Holding the context mutex for the whole turn serializes turns
        // within the session.
        let mut ctx = handle.lock().await;

        let utterance = Utterance::new(session_id, trimmed);
        let bias = ctx.preferences.entity_bias();
        let annotation = self.pipeline.annotate(&utterance, &bias).await;

        // The session may have been archived while annotators ran; the
        // in-flight work is discarded rather than merged.
        if !self.store.contains(session_id).await {
            info!(session_id = %session_id, "Turn discarded — session cancelled mid-flight");
            return Err(EngineError::SessionCancelled { session_id });
        }

        let ema_rate = self.config.personality.adaptation_speed.ema_rate();
        ctx.merge_annotation(annotation.clone(), ema_rate);

        let previous_state = ctx.current_state;
        let machine_outcome = match explicit_action {
            Some(action) => DialogueStateMachine::apply_action(&mut ctx, action),
            None => DialogueStateMachine::apply_intent(&mut ctx, &annotation.intent.name),
        };
        let transition = machine_outcome.transition().cloned();

        let tone = select_tone(
            ctx.current_state,
            &annotation.sentiment,
            &self.config.personality,
            ctx.last_tone.as_deref(),
        );
        ctx.record_tone(tone.name);
        ctx.metrics.turn_count += 1;
        ctx.metrics.last_turn_at = Some(utterance.timestamp);

        let entry = HistoryEntry {
            utterance,
            annotation: annotation.clone(),
            transition: transition.clone(),
            tone: tone.name.to_string(),
            recorded_at: Utc::now(),
        };
        self.history.append(entry.clone(), ctx.current_state).await;

        let new_state = ctx.current_state;
        let snapshot = ctx.clone();
        drop(ctx);

        if let Some(warning) = self.save_with_retry(&snapshot).await {
            warnings.push(warning);
        }

        info!(
            session_id = %session_id,
            intent = %annotation.intent.name,
            from = %previous_state,
            to = %new_state,
            moved = machine_outcome.transition().is_some(),
            tone = tone.name,
            "Turn processed"
        );

        // Ok if no feed clients are listening.
        let _ = self.events.send(TurnEvent::Turn {
            session_id,
            state: new_state,
            intent: annotation.intent.name.clone(),
            tone: tone.name.to_string(),
            timestamp: Utc::now(),
        });

        Ok(TurnOutcome {
            session_id,
            annotation,
            previous_state,
            new_state,
            transition,
            tone: tone.name.to_string(),
            history_entry: entry,
            warnings,
        })
    }

    /// Reset a session's state machine to the initial state.
    ///
    /// The append-only history is untouched. Returns false for sessions
    /// that are not live.
    pub async fn reset_session(&self, session_id: Uuid) -> bool {
        if !self.store.reset(session_id).await {
            return false;
        }
        if let Some(handle) = self.store.get(session_id).await {
            let snapshot = handle.lock().await.clone();
            if let Some(TurnWarning::StoreUnavailable { detail }) =
                self.save_with_retry(&snapshot).await
            {
                warn!(session_id = %session_id, detail = %detail, "Reset not persisted");
            }
        }
        let _ = self.events.send(TurnEvent::SessionReset { session_id });
        true
    }

    /// Archive a session: drop it from the live registry and mark it
    /// archived in the backend. Its history stays searchable.
    pub async fn archive_session(&self, session_id: Uuid) -> bool {
        let Some(snapshot) = self.store.archive(session_id).await else {
            return false;
        };
        if let Some(TurnWarning::StoreUnavailable { detail }) =
            self.save_with_retry(&snapshot).await
        {
            warn!(session_id = %session_id, detail = %detail, "Final context not persisted");
        }
        if let Err(e) = self.repo.archive_context(session_id).await {
            warn!(session_id = %session_id, error = %e, "Archive flag not persisted");
        }
        let _ = self.events.send(TurnEvent::SessionArchived { session_id });
        true
    }

    /// Snapshot of a live session's context.
    pub async fn session_context(&self, session_id: Uuid) -> Option<SessionContext> {
        let handle = self.store.get(session_id).await?;
        let ctx = handle.lock().await;
        Some(ctx.clone())
    }

    // ── Query surface ───────────────────────────────────────────────

    pub async fn get_history(&self, session_id: Uuid) -> Vec<HistoryEntry> {
        self.history.entries(session_id).await
    }

    pub async fn search_sessions(&self, query: &str) -> Vec<SessionSummary> {
        self.history.search(query).await
    }

    pub async fn session_summaries(&self) -> Vec<SessionSummary> {
        self.history.summaries().await
    }

    pub async fn analytics(&self) -> AggregateMetrics {
        self.history.analytics(self.config.top_intents).await
    }

    // ── Internals ───────────────────────────────────────────────────

    /// Get the live handle for a session, loading through the persistence
    /// backend for sessions seen in an earlier run. Unknown ids create a
    /// fresh context — never an error.
    async fn session_handle(
        &self,
        session_id: Uuid,
        warnings: &mut Vec<TurnWarning>,
    ) -> SessionHandle {
        if let Some(handle) = self.store.get(session_id).await {
            return handle;
        }
        match self.load_with_retry(session_id).await {
            Ok(Some(context)) => {
                info!(session_id = %session_id, state = %context.current_state, "Context restored from store");
                self.store.adopt(context).await
            }
            Ok(None) => self.store.get_or_create(session_id).await,
            Err(warning) => {
                warnings.push(warning);
                self.store.get_or_create(session_id).await
            }
        }
    }

    async fn load_with_retry(
        &self,
        session_id: Uuid,
    ) -> Result<Option<SessionContext>, TurnWarning> {
        let mut attempt = 0u32;
        loop {
            match self.repo.load_context(session_id).await {
                Ok(context) => return Ok(context),
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.store_max_retries {
                        warn!(
                            session_id = %session_id,
                            attempts = attempt,
                            error = %e,
                            "Context load failed — proceeding with in-memory context"
                        );
                        return Err(TurnWarning::StoreUnavailable {
                            detail: e.to_string(),
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(session_id = %session_id, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Context load failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    async fn save_with_retry(&self, context: &SessionContext) -> Option<TurnWarning> {
        let mut attempt = 0u32;
        loop {
            match self.repo.save_context(context).await {
                Ok(()) => return None,
                Err(e) => {
                    attempt += 1;
                    if attempt > self.config.store_max_retries {
                        warn!(
                            session_id = %context.session_id,
                            attempts = attempt,
                            error = %e,
                            "Context save failed — turn proceeds in-memory only"
                        );
                        return Some(TurnWarning::StoreUnavailable {
                            detail: e.to_string(),
                        });
                    }
                    let delay = self.backoff_delay(attempt);
                    warn!(session_id = %context.session_id, attempt, delay_ms = delay.as_millis() as u64, error = %e, "Context save failed, retrying");
                    tokio::time::sleep(delay).await;
                }
            }
        }
    }

    /// Exponential backoff with jitter, capped.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base = self.config.store_retry_base;
        let exp = base.saturating_mul(1u32 << (attempt - 1).min(16));
        let jitter_ms = rand::thread_rng().gen_range(0..=base.as_millis().max(1) as u64);
        (exp + Duration::from_millis(jitter_ms)).min(self.config.store_retry_cap)
    }
}
