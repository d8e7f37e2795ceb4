//! Session history and analytics.
//!
//! Append-only per-session log of turns. Aggregates are derived lazily on
//! request — nothing here is precomputed or cached, the log itself is the
//! source of truth. Search is a read-only, case-insensitive substring match
//! over session titles and topics.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::annotate::types::{Annotation, Utterance};
use crate::dialogue::{ConversationState, Transition};

/// One turn's record: the utterance, its annotation, and the transition it
/// caused (if any). Immutable once appended.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryEntry {
    pub utterance: Utterance,
    pub annotation: Annotation,
    /// `None` when the turn produced no state change.
    pub transition: Option<Transition>,
    /// Name of the personality profile selected for the response.
    pub tone: String,
    pub recorded_at: DateTime<Utc>,
}

/// Presentation-facing session digest.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionSummary {
    pub session_id: Uuid,
    pub title: String,
    pub topics: Vec<String>,
    pub turn_count: usize,
    pub started_at: DateTime<Utc>,
    pub last_turn_at: DateTime<Utc>,
    pub completed: bool,
}

/// Aggregates derived from the whole log.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AggregateMetrics {
    pub total_sessions: usize,
    pub total_messages: usize,
    pub average_session_duration_secs: f64,
    /// Top intents by frequency, most common first.
    pub most_common_intents: Vec<IntentCount>,
    /// Sessions that reached a terminal state ÷ total sessions.
    pub completion_rate: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IntentCount {
    pub name: String,
    pub count: u64,
}

/// Internal per-session log record.
#[derive(Debug, Clone)]
struct SessionRecord {
    session_id: Uuid,
    title: String,
    topics: Vec<String>,
    entries: Vec<HistoryEntry>,
    started_at: DateTime<Utc>,
    last_turn_at: DateTime<Utc>,
    reached_terminal: bool,
}

impl SessionRecord {
    fn summary(&self) -> SessionSummary {
        SessionSummary {
            session_id: self.session_id,
            title: self.title.clone(),
            topics: self.topics.clone(),
            turn_count: self.entries.len(),
            started_at: self.started_at,
            last_turn_at: self.last_turn_at,
            completed: self.reached_terminal,
        }
    }

    fn matches(&self, needle: &str) -> bool {
        self.title.to_lowercase().contains(needle)
            || self.topics.iter().any(|t| t.to_lowercase().contains(needle))
    }
}

/// The append-only session log.
#[derive(Default)]
pub struct SessionHistory {
    sessions: RwLock<HashMap<Uuid, SessionRecord>>,
}

/// Maximum title length derived from the first utterance.
const TITLE_MAX_CHARS: usize = 60;

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a turn to its session's log.
    ///
    /// `state_after` is the conversation state once the turn settled; the
    /// session is marked completed when it is terminal. Topics accumulate
    /// from the turn's entity values. Archiving a session does not touch
    /// its log — the record stays searchable.
    pub async fn append(&self, entry: HistoryEntry, state_after: ConversationState) {
        let mut sessions = self.sessions.write().await;
        let record = sessions
            .entry(entry.utterance.session_id)
            .or_insert_with(|| SessionRecord {
                session_id: entry.utterance.session_id,
                title: derive_title(&entry.utterance.text),
                topics: Vec::new(),
                entries: Vec::new(),
                started_at: entry.recorded_at,
                last_turn_at: entry.recorded_at,
                reached_terminal: false,
            });

        for entity in &entry.annotation.entities {
            let topic = entity.value.to_lowercase();
            if !record.topics.contains(&topic) {
                record.topics.push(topic);
            }
        }

        record.last_turn_at = entry.recorded_at;
        record.reached_terminal |= state_after.is_terminal();
        record.entries.push(entry);
    }

    /// All entries for a session, oldest first. Unknown sessions yield an
    /// empty list.
    pub async fn entries(&self, session_id: Uuid) -> Vec<HistoryEntry> {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|r| r.entries.clone())
            .unwrap_or_default()
    }

    /// Number of turns logged for a session.
    pub async fn turn_count(&self, session_id: Uuid) -> usize {
        self.sessions
            .read()
            .await
            .get(&session_id)
            .map(|r| r.entries.len())
            .unwrap_or(0)
    }

    /// Summaries of every logged session, most recently active first.
    pub async fn summaries(&self) -> Vec<SessionSummary> {
        let sessions = self.sessions.read().await;
        let mut summaries: Vec<SessionSummary> = sessions.values().map(|r| r.summary()).collect();
        summaries.sort_by(|a, b| b.last_turn_at.cmp(&a.last_turn_at));
        summaries
    }

    /// Case-insensitive substring search over titles and topics.
    pub async fn search(&self, query: &str) -> Vec<SessionSummary> {
        let needle = query.trim().to_lowercase();
        let sessions = self.sessions.read().await;
        let mut matches: Vec<SessionSummary> = sessions
            .values()
            .filter(|r| r.matches(&needle))
            .map(|r| r.summary())
            .collect();
        matches.sort_by(|a, b| b.last_turn_at.cmp(&a.last_turn_at));
        matches
    }

    /// Derive the aggregate metrics from the log.
    pub async fn analytics(&self, top_intents: usize) -> AggregateMetrics {
        let sessions = self.sessions.read().await;

        let total_sessions = sessions.len();
        let total_messages: usize = sessions.values().map(|r| r.entries.len()).sum();

        let mut duration_sum = 0.0;
        let mut completed = 0usize;
        let mut intent_counts: HashMap<&str, u64> = HashMap::new();
        for record in sessions.values() {
            duration_sum += record
                .last_turn_at
                .signed_duration_since(record.started_at)
                .num_milliseconds()
                .max(0) as f64
                / 1000.0;
            if record.reached_terminal {
                completed += 1;
            }
            for entry in &record.entries {
                *intent_counts
                    .entry(entry.annotation.intent.name.as_str())
                    .or_default() += 1;
            }
        }

        let mut most_common: Vec<IntentCount> = intent_counts
            .into_iter()
            .map(|(name, count)| IntentCount {
                name: name.to_string(),
                count,
            })
            .collect();
        // Deterministic order: frequency desc, then name.
        most_common.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.name.cmp(&b.name)));
        most_common.truncate(top_intents);

        AggregateMetrics {
            total_sessions,
            total_messages,
            average_session_duration_secs: if total_sessions == 0 {
                0.0
            } else {
                duration_sum / total_sessions as f64
            },
            most_common_intents: most_common,
            completion_rate: if total_sessions == 0 {
                0.0
            } else {
                completed as f64 / total_sessions as f64
            },
        }
    }
}

/// First utterance, truncated on a char boundary.
fn derive_title(text: &str) -> String {
    if text.chars().count() <= TITLE_MAX_CHARS {
        return text.to_string();
    }
    let truncated: String = text.chars().take(TITLE_MAX_CHARS).collect();
    format!("{}…", truncated.trim_end())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotate::types::{Entity, EntityKind, Intent};
    use crate::dialogue::triggers;

    fn entry(session_id: Uuid, text: &str, intent: &str, entities: Vec<Entity>) -> HistoryEntry {
        HistoryEntry {
            utterance: Utterance::new(session_id, text),
            annotation: Annotation {
                intent: Intent::new(intent, 0.8),
                entities,
                ..Annotation::fallback()
            },
            transition: None,
            tone: "warm_enthusiast".to_string(),
            recorded_at: Utc::now(),
        }
    }

    fn paris_entity() -> Entity {
        Entity::new(EntityKind::Destination, "Paris", (0, 5), 0.8)
    }

    #[tokio::test]
    async fn entries_accumulate_per_session() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();

        history
            .append(entry(id, "hello", "unknown", vec![]), ConversationState::Greeting)
            .await;
        history
            .append(
                entry(id, "plan a trip", triggers::PLAN_TRIP, vec![]),
                ConversationState::NeedsAssessment,
            )
            .await;

        assert_eq!(history.turn_count(id).await, 2);
        let entries = history.entries(id).await;
        assert_eq!(entries[0].utterance.text, "hello");
        assert_eq!(entries[1].utterance.text, "plan a trip");
    }

    #[tokio::test]
    async fn unknown_session_has_empty_history() {
        let history = SessionHistory::new();
        assert!(history.entries(Uuid::new_v4()).await.is_empty());
        assert_eq!(history.turn_count(Uuid::new_v4()).await, 0);
    }

    #[tokio::test]
    async fn title_comes_from_first_utterance() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();
        history
            .append(
                entry(id, "I want to plan a trip to Paris", triggers::PLAN_TRIP, vec![]),
                ConversationState::NeedsAssessment,
            )
            .await;
        history
            .append(entry(id, "second turn", "unknown", vec![]), ConversationState::NeedsAssessment)
            .await;

        let summaries = history.summaries().await;
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].title, "I want to plan a trip to Paris");
    }

    #[tokio::test]
    async fn long_titles_are_truncated() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();
        let long = "a ".repeat(100);
        history
            .append(entry(id, &long, "unknown", vec![]), ConversationState::Greeting)
            .await;
        let summaries = history.summaries().await;
        assert!(summaries[0].title.chars().count() <= TITLE_MAX_CHARS + 1);
    }

    #[tokio::test]
    async fn search_matches_topics_case_insensitively() {
        let history = SessionHistory::new();
        let paris_session = Uuid::new_v4();
        let other_session = Uuid::new_v4();

        history
            .append(
                entry(paris_session, "trip to Paris please", triggers::PLAN_TRIP, vec![paris_entity()]),
                ConversationState::NeedsAssessment,
            )
            .await;
        history
            .append(
                entry(other_session, "beach holiday ideas", triggers::PLAN_TRIP, vec![]),
                ConversationState::NeedsAssessment,
            )
            .await;

        let results = history.search("PARIS").await;
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].session_id, paris_session);
    }

    #[tokio::test]
    async fn search_on_empty_corpus_returns_empty() {
        let history = SessionHistory::new();
        assert!(history.search("paris").await.is_empty());
    }

    #[tokio::test]
    async fn search_without_matches_returns_empty() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();
        history
            .append(entry(id, "ski trip", triggers::PLAN_TRIP, vec![]), ConversationState::NeedsAssessment)
            .await;
        assert!(history.search("scuba").await.is_empty());
    }

    #[tokio::test]
    async fn analytics_on_empty_corpus_is_all_zero() {
        let history = SessionHistory::new();
        let metrics = history.analytics(5).await;
        assert_eq!(metrics.total_sessions, 0);
        assert_eq!(metrics.total_messages, 0);
        assert_eq!(metrics.completion_rate, 0.0);
        assert_eq!(metrics.average_session_duration_secs, 0.0);
        assert!(metrics.most_common_intents.is_empty());
    }

    #[tokio::test]
    async fn analytics_counts_messages_and_intents() {
        let history = SessionHistory::new();
        let a = Uuid::new_v4();
        let b = Uuid::new_v4();

        for _ in 0..3 {
            history
                .append(entry(a, "plan", triggers::PLAN_TRIP, vec![]), ConversationState::NeedsAssessment)
                .await;
        }
        history
            .append(entry(b, "help", triggers::ASK_SUPPORT, vec![]), ConversationState::Support)
            .await;

        let metrics = history.analytics(5).await;
        assert_eq!(metrics.total_sessions, 2);
        assert_eq!(metrics.total_messages, 4);
        assert_eq!(
            metrics.most_common_intents[0],
            IntentCount {
                name: triggers::PLAN_TRIP.to_string(),
                count: 3
            }
        );
        // Session b reached Support, a terminal state.
        assert_eq!(metrics.completion_rate, 0.5);
    }

    #[tokio::test]
    async fn analytics_top_k_is_bounded() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();
        for intent in ["a", "b", "c", "d"] {
            history
                .append(entry(id, "x", intent, vec![]), ConversationState::Greeting)
                .await;
        }
        let metrics = history.analytics(2).await;
        assert_eq!(metrics.most_common_intents.len(), 2);
    }

    #[tokio::test]
    async fn completion_sticks_once_reached() {
        let history = SessionHistory::new();
        let id = Uuid::new_v4();
        history
            .append(entry(id, "book it", triggers::BOOKING_COMPLETED, vec![]), ConversationState::Confirmation)
            .await;
        // A later turn in a non-terminal state (after reset) must not
        // un-complete the session.
        history
            .append(entry(id, "hello again", "unknown", vec![]), ConversationState::Greeting)
            .await;

        let metrics = history.analytics(5).await;
        assert_eq!(metrics.completion_rate, 1.0);
    }
}
