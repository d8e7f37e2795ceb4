//! Per-session conversation context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::annotate::types::{Annotation, Entity, EntityBias, EntityKind};
use crate::dialogue::state::ConversationState;

/// Known preference slots, shallow-overwritten from extracted entities.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TripPreferences {
    pub destination: Option<String>,
    pub budget: Option<String>,
    pub dates: Option<String>,
    pub duration: Option<String>,
    pub dietary: Option<String>,
    pub accessibility: Option<String>,
}

impl TripPreferences {
    /// Overwrite slots present in the extracted entities.
    ///
    /// Returns the names of the slots that were written.
    pub fn apply_entities(&mut self, entities: &[Entity]) -> Vec<&'static str> {
        let mut updated = Vec::new();
        for entity in entities {
            let (slot, name) = match entity.kind {
                EntityKind::Destination => (&mut self.destination, "destination"),
                EntityKind::Money => (&mut self.budget, "budget"),
                EntityKind::Date => (&mut self.dates, "dates"),
                EntityKind::Duration => (&mut self.duration, "duration"),
                EntityKind::Dietary => (&mut self.dietary, "dietary"),
                EntityKind::Accessibility => (&mut self.accessibility, "accessibility"),
            };
            *slot = Some(entity.value.clone());
            if !updated.contains(&name) {
                updated.push(name);
            }
        }
        updated
    }

    /// Read-only disambiguation snapshot for the entity extractor.
    pub fn entity_bias(&self) -> EntityBias {
        EntityBias {
            prior_destination: self.destination.clone(),
        }
    }

    /// Filled slot values, for session topic summaries.
    pub fn filled_values(&self) -> Vec<&str> {
        [
            &self.destination,
            &self.budget,
            &self.dates,
            &self.duration,
            &self.dietary,
            &self.accessibility,
        ]
        .into_iter()
        .flatten()
        .map(String::as_str)
        .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.filled_values().is_empty()
    }
}

/// Running per-session counters and signals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionMetrics {
    /// Turns processed (every turn counts, transition or not).
    pub turn_count: u64,
    /// Transitions executed.
    pub total_transitions: u64,
    /// Turns whose trigger matched nothing.
    pub no_transition_count: u64,
    /// Times the selected personality profile changed.
    pub personality_switches: u64,
    /// EMA of sentiment strength — how invested the user reads, either way.
    pub engagement: f32,
    /// EMA of normalized sentiment score in `[0, 1]`.
    pub satisfaction: f32,
    pub last_turn_at: Option<DateTime<Utc>>,
}

impl Default for SessionMetrics {
    fn default() -> Self {
        Self {
            turn_count: 0,
            total_transitions: 0,
            no_transition_count: 0,
            personality_switches: 0,
            engagement: 0.5,
            satisfaction: 0.5,
            last_turn_at: None,
        }
    }
}

impl SessionMetrics {
    /// Fold one sentiment reading into the running signals.
    ///
    /// `rate` comes from the configured adaptation speed.
    pub fn record_sentiment(&mut self, score: f32, rate: f32) {
        let rate = rate.clamp(0.0, 1.0);
        let normalized = (score.clamp(-1.0, 1.0) + 1.0) / 2.0;
        self.satisfaction = self.satisfaction * (1.0 - rate) + normalized * rate;
        self.engagement = self.engagement * (1.0 - rate) + score.abs() * rate;
    }
}

/// The live mutable state of one session.
///
/// Mutated only by the dialogue state machine and the context store; one
/// instance per session id, created lazily on the first turn.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionContext {
    pub session_id: Uuid,
    pub current_state: ConversationState,
    /// States visited, in order. `path[0]` is always the initial state.
    pub path: Vec<ConversationState>,
    pub preferences: TripPreferences,
    pub last_annotation: Option<Annotation>,
    /// Name of the most recently selected personality profile.
    pub last_tone: Option<String>,
    pub metrics: SessionMetrics,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SessionContext {
    /// Fresh context in the initial state.
    pub fn new(session_id: Uuid) -> Self {
        let now = Utc::now();
        Self {
            session_id,
            current_state: ConversationState::initial(),
            path: vec![ConversationState::initial()],
            preferences: TripPreferences::default(),
            last_annotation: None,
            last_tone: None,
            metrics: SessionMetrics::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Merge an annotation into the context.
    ///
    /// Overwrites preference slots from entities, stores the annotation,
    /// and folds the sentiment into the running metrics. Returns the
    /// preference slots that were updated.
    pub fn merge_annotation(&mut self, annotation: Annotation, ema_rate: f32) -> Vec<&'static str> {
        let updated = self.preferences.apply_entities(&annotation.entities);
        self.metrics
            .record_sentiment(annotation.sentiment.score, ema_rate);
        self.last_annotation = Some(annotation);
        self.updated_at = Utc::now();
        updated
    }

    /// Record the tone chosen for this turn. Returns true when it differs
    /// from the previous turn's tone (and counts the switch).
    pub fn record_tone(&mut self, profile_name: &str) -> bool {
        let switched = self
            .last_tone
            .as_deref()
            .is_some_and(|last| last != profile_name);
        if switched {
            self.metrics.personality_switches += 1;
        }
        self.last_tone = Some(profile_name.to_string());
        switched
    }

    /// Re-initialize the state machine: back to the initial state with a
    /// single-element path. Preferences survive a reset; the conversation
    /// starts over, the traveler does not.
    pub fn reset(&mut self) {
        self.current_state = ConversationState::initial();
        self.path = vec![ConversationState::initial()];
        self.last_annotation = None;
        self.updated_at = Utc::now();
    }

    /// Whether the session has reached a terminal state.
    pub fn is_complete(&self) -> bool {
        self.current_state.is_terminal()
    }
}
