//! Shared types for the annotator pipeline.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::AnnotatorError;

// ── Utterance ───────────────────────────────────────────────────────

/// A single inbound user utterance. Immutable once created.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Utterance {
    /// Session this utterance belongs to.
    pub session_id: Uuid,
    /// Raw text as typed by the user.
    pub text: String,
    /// When the utterance was received.
    pub timestamp: DateTime<Utc>,
}

impl Utterance {
    /// Create a new utterance stamped with the current time.
    pub fn new(session_id: Uuid, text: impl Into<String>) -> Self {
        Self {
            session_id,
            text: text.into(),
            timestamp: Utc::now(),
        }
    }
}

// ── Intent ──────────────────────────────────────────────────────────

/// A detected intent with its confidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Intent {
    /// Lowercase snake_case intent name (doubles as the transition trigger).
    pub name: String,
    /// Classifier confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Intent {
    pub fn new(name: impl Into<String>, confidence: f32) -> Self {
        Self {
            name: name.into(),
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The defined fallback when no classifier produced a usable intent.
    pub fn unknown() -> Self {
        Self {
            name: "unknown".to_string(),
            confidence: 0.0,
        }
    }

    pub fn is_unknown(&self) -> bool {
        self.name == "unknown"
    }
}

// ── Entities ────────────────────────────────────────────────────────

/// Category of an extracted entity, mapped 1:1 onto preference slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Destination,
    Money,
    Date,
    Duration,
    Dietary,
    Accessibility,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Destination => "destination",
            Self::Money => "money",
            Self::Date => "date",
            Self::Duration => "duration",
            Self::Dietary => "dietary",
            Self::Accessibility => "accessibility",
        }
    }
}

/// A span of the utterance recognized as an entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Entity {
    pub kind: EntityKind,
    /// Extracted surface value (e.g. "$2000", "Paris").
    pub value: String,
    /// Byte offsets into the utterance text.
    pub span: (usize, usize),
    /// Extractor confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Entity {
    pub fn new(
        kind: EntityKind,
        value: impl Into<String>,
        span: (usize, usize),
        confidence: f32,
    ) -> Self {
        Self {
            kind,
            value: value.into(),
            span,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }
}

// ── Sentiment ───────────────────────────────────────────────────────

/// Coarse sentiment direction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Polarity {
    Positive,
    #[default]
    Neutral,
    Negative,
}

/// Dominant emotion reading for tone selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Emotion {
    Joy,
    Anticipation,
    Frustration,
    Anxiety,
    #[default]
    Neutral,
}

/// Sentiment reading for one utterance.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Sentiment {
    pub polarity: Polarity,
    /// Signed strength in `[-1, 1]`.
    pub score: f32,
    pub emotion: Emotion,
    /// Scorer confidence in `[0, 1]`.
    pub confidence: f32,
}

impl Sentiment {
    pub fn new(polarity: Polarity, score: f32, emotion: Emotion, confidence: f32) -> Self {
        Self {
            polarity,
            score: score.clamp(-1.0, 1.0),
            emotion,
            confidence: confidence.clamp(0.0, 1.0),
        }
    }

    /// The defined fallback when the scorer failed or timed out.
    pub fn neutral() -> Self {
        Self {
            polarity: Polarity::Neutral,
            score: 0.0,
            emotion: Emotion::Neutral,
            confidence: 0.0,
        }
    }
}

impl Default for Sentiment {
    fn default() -> Self {
        Self::neutral()
    }
}

// ── Language ────────────────────────────────────────────────────────

/// Detected utterance language.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Language {
    English,
    Spanish,
    French,
    German,
    #[default]
    Unknown,
}

impl Language {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::English => "english",
            Self::Spanish => "spanish",
            Self::French => "french",
            Self::German => "german",
            Self::Unknown => "unknown",
        }
    }
}

// ── Annotation ──────────────────────────────────────────────────────

/// Merged annotation record for one utterance.
///
/// Every field is always present: a failed sub-annotator contributes the
/// documented default for its slice rather than an absent value.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Annotation {
    pub intent: Intent,
    pub entities: Vec<Entity>,
    pub sentiment: Sentiment,
    pub language: Language,
}

impl Annotation {
    /// Fully defaulted annotation — what a turn gets if every annotator fails.
    pub fn fallback() -> Self {
        Self {
            intent: Intent::unknown(),
            entities: Vec::new(),
            sentiment: Sentiment::neutral(),
            language: Language::Unknown,
        }
    }
}

// ── Disambiguation bias ─────────────────────────────────────────────

/// Read-only snapshot of session preferences offered to the entity
/// extractor so references like "there" resolve against prior turns.
#[derive(Debug, Clone, Default)]
pub struct EntityBias {
    /// Destination the session has already settled on, if any.
    pub prior_destination: Option<String>,
}

// ── Annotator contracts ─────────────────────────────────────────────
//
// The external-model seam. Production plugs real classifiers in behind
// these traits; the built-in heuristics and test fakes implement the same
// contracts. Sub-annotators must not depend on each other's output — the
// pipeline runs them concurrently.

#[async_trait]
pub trait IntentClassifier: Send + Sync {
    /// Annotator name for logging.
    fn name(&self) -> &str {
        "intent"
    }

    /// Return candidate intents for the text. The pipeline picks the
    /// highest-confidence candidate; ties go to the earliest.
    async fn classify(&self, text: &str) -> Result<Vec<Intent>, AnnotatorError>;
}

#[async_trait]
pub trait EntityExtractor: Send + Sync {
    fn name(&self) -> &str {
        "entities"
    }

    /// Extract entities from the text. `bias` carries prior session
    /// preferences for disambiguation and must be treated as read-only.
    async fn extract(&self, text: &str, bias: &EntityBias) -> Result<Vec<Entity>, AnnotatorError>;
}

#[async_trait]
pub trait SentimentScorer: Send + Sync {
    fn name(&self) -> &str {
        "sentiment"
    }

    async fn score(&self, text: &str) -> Result<Sentiment, AnnotatorError>;
}

#[async_trait]
pub trait LanguageDetector: Send + Sync {
    fn name(&self) -> &str {
        "language"
    }

    async fn detect(&self, text: &str) -> Result<Language, AnnotatorError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn intent_confidence_is_clamped() {
        assert_eq!(Intent::new("plan_trip", 1.7).confidence, 1.0);
        assert_eq!(Intent::new("plan_trip", -0.2).confidence, 0.0);
    }

    #[test]
    fn unknown_intent_has_zero_confidence() {
        let intent = Intent::unknown();
        assert_eq!(intent.name, "unknown");
        assert_eq!(intent.confidence, 0.0);
        assert!(intent.is_unknown());
    }

    #[test]
    fn sentiment_score_is_clamped() {
        let s = Sentiment::new(Polarity::Positive, 3.0, Emotion::Joy, 0.9);
        assert_eq!(s.score, 1.0);
    }

    #[test]
    fn fallback_annotation_has_all_fields_defined() {
        let annotation = Annotation::fallback();
        assert!(annotation.intent.is_unknown());
        assert!(annotation.entities.is_empty());
        assert_eq!(annotation.sentiment.polarity, Polarity::Neutral);
        assert_eq!(annotation.language, Language::Unknown);
    }

    #[test]
    fn entity_kind_serializes_to_snake_case() {
        let json = serde_json::to_string(&EntityKind::Accessibility).unwrap();
        assert_eq!(json, "\"accessibility\"");
    }

    #[test]
    fn annotation_serde_roundtrip() {
        let annotation = Annotation {
            intent: Intent::new("budget_shared", 0.8),
            entities: vec![Entity::new(EntityKind::Money, "$2000", (13, 18), 0.9)],
            sentiment: Sentiment::new(Polarity::Positive, 0.4, Emotion::Anticipation, 0.6),
            language: Language::English,
        };
        let json = serde_json::to_string(&annotation).unwrap();
        let parsed: Annotation = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed.intent.name, "budget_shared");
        assert_eq!(parsed.entities[0].kind, EntityKind::Money);
        assert_eq!(parsed.language, Language::English);
    }
}
