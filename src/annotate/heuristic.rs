//! Built-in heuristic annotators.
//!
//! Deterministic regex/lexicon implementations of the annotator contracts.
//! They are the default wiring for local runs and tests; production swaps
//! in real models behind the same traits without touching the pipeline.

use async_trait::async_trait;
use regex::Regex;

use crate::dialogue::triggers;
use crate::error::AnnotatorError;

use super::types::{
    Emotion, Entity, EntityBias, EntityExtractor, EntityKind, Intent, IntentClassifier, Language,
    LanguageDetector, Polarity, Sentiment, SentimentScorer,
};

// ── Intent classification ───────────────────────────────────────────

/// A single intent pattern with a fixed confidence weight.
#[derive(Debug, Clone)]
struct IntentRule {
    name: &'static str,
    regex: Regex,
    confidence: f32,
}

/// Keyword/pattern intent classifier.
///
/// Returns every matching rule as a candidate; the pipeline resolves
/// conflicts by confidence, ties by declaration order.
pub struct KeywordIntentClassifier {
    rules: Vec<IntentRule>,
}

impl KeywordIntentClassifier {
    /// Classifier with the default travel-planning intent patterns.
    pub fn new() -> Self {
        let rules = vec![
            IntentRule {
                name: triggers::PLAN_TRIP,
                regex: Regex::new(
                    r"(?i)\b(plan|book|organi[sz]e|arrange)\b.*\b(trip|vacation|holiday|getaway|travel)\b|\bi want to (go|travel)\b",
                )
                .unwrap(),
                confidence: 0.85,
            },
            IntentRule {
                name: triggers::BUDGET_SHARED,
                regex: Regex::new(r"(?i)\bbudget\b|[$€£]\s?\d|\b\d[\d,]*\s?(dollars|euros|usd|eur)\b")
                    .unwrap(),
                confidence: 0.8,
            },
            IntentRule {
                name: triggers::DESTINATION_CHOSEN,
                regex: Regex::new(
                    r"(?i)\b(let'?s (go|do)|i('| ha)ve decided on|decided on|settled on|i'?ll (take|go with)|we'?ll go to)\b",
                )
                .unwrap(),
                confidence: 0.8,
            },
            IntentRule {
                name: triggers::PREFERENCES_SHARED,
                regex: Regex::new(
                    r"(?i)\b(vegetarian|vegan|gluten[- ]free|halal|kosher|wheelchair|accessible|step[- ]free|prefer|allergic)\b",
                )
                .unwrap(),
                confidence: 0.7,
            },
            IntentRule {
                name: triggers::ITINERARY_APPROVED,
                regex: Regex::new(
                    r"(?i)\b(looks (good|great|perfect)|sounds (good|great|perfect)|i (love|like) (that|this) (plan|itinerary)|approve)\b",
                )
                .unwrap(),
                confidence: 0.75,
            },
            IntentRule {
                name: triggers::BOOKING_COMPLETED,
                regex: Regex::new(
                    r"(?i)\b(book it|book everything|confirm (the )?booking|complete (the )?booking|pay now|checkout)\b",
                )
                .unwrap(),
                confidence: 0.85,
            },
            IntentRule {
                name: triggers::ASK_SUPPORT,
                regex: Regex::new(
                    r"(?i)\b(help|support|problem|issue|something('s| is) wrong|not working|speak to (an? )?(agent|human))\b",
                )
                .unwrap(),
                confidence: 0.75,
            },
            IntentRule {
                name: triggers::GREETING,
                regex: Regex::new(r"(?i)^\s*(hi|hello|hey|good (morning|afternoon|evening))\b")
                    .unwrap(),
                confidence: 0.6,
            },
        ];
        Self { rules }
    }
}

impl Default for KeywordIntentClassifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IntentClassifier for KeywordIntentClassifier {
    fn name(&self) -> &str {
        "keyword-intent"
    }

    async fn classify(&self, text: &str) -> Result<Vec<Intent>, AnnotatorError> {
        let candidates = self
            .rules
            .iter()
            .filter(|rule| rule.regex.is_match(text))
            .map(|rule| Intent::new(rule.name, rule.confidence))
            .collect();
        Ok(candidates)
    }
}

// ── Entity extraction ───────────────────────────────────────────────

/// Regex pattern extractor for the known preference slots.
pub struct PatternEntityExtractor {
    money: Regex,
    duration: Regex,
    date: Regex,
    dietary: Regex,
    accessibility: Regex,
    destination: Regex,
    back_reference: Regex,
}

impl PatternEntityExtractor {
    pub fn new() -> Self {
        Self {
            money: Regex::new(r"[$€£]\s?\d[\d,]*(\.\d+)?|\b\d[\d,]*\s?(?i:dollars|euros|usd|eur)\b")
                .unwrap(),
            duration: Regex::new(r"(?i)\b\d+\s?(days?|nights?|weeks?)\b").unwrap(),
            date: Regex::new(
                r"(?i)\b\d{4}-\d{2}-\d{2}\b|\b(january|february|march|april|may|june|july|august|september|october|november|december)\s+\d{1,2}\b|\b(next|this)\s+(week|weekend|month|summer|winter|spring|fall|autumn)\b",
            )
            .unwrap(),
            dietary: Regex::new(r"(?i)\b(vegetarian|vegan|gluten[- ]free|halal|kosher|dairy[- ]free)\b")
                .unwrap(),
            accessibility: Regex::new(r"(?i)\b(wheelchair( accessible)?|step[- ]free|mobility aid|accessible room)\b")
                .unwrap(),
            // Capitalized place name after a travel preposition.
            destination: Regex::new(r"(?:to|in|visit(?:ing)?)\s+([A-Z][a-z]+(?:\s[A-Z][a-z]+)?)")
                .unwrap(),
            back_reference: Regex::new(r"(?i)\b(there|that (place|city|destination))\b").unwrap(),
        }
    }

    fn push_matches(regex: &Regex, kind: EntityKind, confidence: f32, text: &str, out: &mut Vec<Entity>) {
        for m in regex.find_iter(text) {
            out.push(Entity::new(kind, m.as_str(), (m.start(), m.end()), confidence));
        }
    }
}

impl Default for PatternEntityExtractor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl EntityExtractor for PatternEntityExtractor {
    fn name(&self) -> &str {
        "pattern-entities"
    }

    async fn extract(&self, text: &str, bias: &EntityBias) -> Result<Vec<Entity>, AnnotatorError> {
        let mut entities = Vec::new();

        Self::push_matches(&self.money, EntityKind::Money, 0.9, text, &mut entities);
        Self::push_matches(&self.duration, EntityKind::Duration, 0.85, text, &mut entities);
        Self::push_matches(&self.date, EntityKind::Date, 0.75, text, &mut entities);
        Self::push_matches(&self.dietary, EntityKind::Dietary, 0.85, text, &mut entities);
        Self::push_matches(
            &self.accessibility,
            EntityKind::Accessibility,
            0.85,
            text,
            &mut entities,
        );

        for caps in self.destination.captures_iter(text) {
            if let Some(m) = caps.get(1) {
                entities.push(Entity::new(
                    EntityKind::Destination,
                    m.as_str(),
                    (m.start(), m.end()),
                    0.7,
                ));
            }
        }

        // "there" / "that place" resolves to the session's prior destination,
        // at reduced confidence since it is inferred rather than stated.
        if entities.iter().all(|e| e.kind != EntityKind::Destination) {
            if let (Some(m), Some(prior)) =
                (self.back_reference.find(text), bias.prior_destination.as_deref())
            {
                entities.push(Entity::new(
                    EntityKind::Destination,
                    prior,
                    (m.start(), m.end()),
                    0.5,
                ));
            }
        }

        Ok(entities)
    }
}

// ── Sentiment scoring ───────────────────────────────────────────────

const POSITIVE_WORDS: &[&str] = &[
    "great", "good", "love", "amazing", "wonderful", "perfect", "excited", "awesome",
    "fantastic", "beautiful", "thanks", "thank",
];

const NEGATIVE_WORDS: &[&str] = &[
    "bad", "hate", "awful", "terrible", "horrible", "disappointed", "annoyed", "frustrated",
    "frustrating", "worried", "nervous", "wrong", "problem", "cancel",
];

const JOY_WORDS: &[&str] = &["love", "amazing", "wonderful", "excited", "awesome", "fantastic"];
const FRUSTRATION_WORDS: &[&str] = &["annoyed", "frustrated", "frustrating", "terrible", "awful"];
const ANXIETY_WORDS: &[&str] = &["worried", "nervous", "anxious", "scared", "unsure"];

/// Word-list sentiment scorer.
pub struct LexiconSentimentScorer;

impl LexiconSentimentScorer {
    pub fn new() -> Self {
        Self
    }

    fn count_hits(words: &[&str], lowered: &str) -> u32 {
        words
            .iter()
            .filter(|w| lowered.split(|c: char| !c.is_alphanumeric()).any(|t| t == **w))
            .count() as u32
    }
}

impl Default for LexiconSentimentScorer {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl SentimentScorer for LexiconSentimentScorer {
    fn name(&self) -> &str {
        "lexicon-sentiment"
    }

    async fn score(&self, text: &str) -> Result<Sentiment, AnnotatorError> {
        let lowered = text.to_lowercase();
        let positive = Self::count_hits(POSITIVE_WORDS, &lowered);
        let negative = Self::count_hits(NEGATIVE_WORDS, &lowered);
        let total = positive + negative;

        if total == 0 {
            return Ok(Sentiment::neutral());
        }

        let score = (positive as f32 - negative as f32) / total as f32;
        let polarity = if score > 0.0 {
            Polarity::Positive
        } else if score < 0.0 {
            Polarity::Negative
        } else {
            Polarity::Neutral
        };

        let emotion = if Self::count_hits(FRUSTRATION_WORDS, &lowered) > 0 {
            Emotion::Frustration
        } else if Self::count_hits(ANXIETY_WORDS, &lowered) > 0 {
            Emotion::Anxiety
        } else if Self::count_hits(JOY_WORDS, &lowered) > 0 {
            Emotion::Joy
        } else if polarity == Polarity::Positive {
            Emotion::Anticipation
        } else {
            Emotion::Neutral
        };

        let confidence = (total as f32 / 3.0).min(1.0);
        Ok(Sentiment::new(polarity, score, emotion, confidence))
    }
}

// ── Language detection ──────────────────────────────────────────────

const ENGLISH_STOPWORDS: &[&str] = &["the", "and", "is", "to", "for", "with", "want", "my"];
const SPANISH_STOPWORDS: &[&str] = &["el", "la", "los", "las", "quiero", "para", "con", "una"];
const FRENCH_STOPWORDS: &[&str] = &["le", "la", "les", "je", "veux", "pour", "avec", "une"];
const GERMAN_STOPWORDS: &[&str] = &["der", "die", "das", "ich", "und", "mit", "für", "eine"];

/// Stopword-frequency language detector.
pub struct StopwordLanguageDetector;

impl StopwordLanguageDetector {
    pub fn new() -> Self {
        Self
    }
}

impl Default for StopwordLanguageDetector {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LanguageDetector for StopwordLanguageDetector {
    fn name(&self) -> &str {
        "stopword-language"
    }

    async fn detect(&self, text: &str) -> Result<Language, AnnotatorError> {
        let lowered = text.to_lowercase();
        let tokens: Vec<&str> = lowered
            .split(|c: char| !c.is_alphabetic())
            .filter(|t| !t.is_empty())
            .collect();

        let hits = |words: &[&str]| tokens.iter().filter(|t| words.contains(t)).count();

        let scored = [
            (Language::English, hits(ENGLISH_STOPWORDS)),
            (Language::Spanish, hits(SPANISH_STOPWORDS)),
            (Language::French, hits(FRENCH_STOPWORDS)),
            (Language::German, hits(GERMAN_STOPWORDS)),
        ];

        let best = scored.iter().max_by_key(|(_, count)| *count).copied();
        match best {
            Some((language, count)) if count > 0 => Ok(language),
            _ => Ok(Language::Unknown),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn classifies_plan_trip() {
        let classifier = KeywordIntentClassifier::new();
        let candidates = classifier
            .classify("I want to plan a trip to Paris")
            .await
            .unwrap();
        assert!(candidates.iter().any(|i| i.name == triggers::PLAN_TRIP));
    }

    #[tokio::test]
    async fn classifies_budget_shared() {
        let classifier = KeywordIntentClassifier::new();
        let candidates = classifier
            .classify("My budget is $2000 for 7 days")
            .await
            .unwrap();
        assert!(candidates.iter().any(|i| i.name == triggers::BUDGET_SHARED));
    }

    #[tokio::test]
    async fn unmatched_text_yields_no_candidates() {
        let classifier = KeywordIntentClassifier::new();
        let candidates = classifier.classify("the weather is mild").await.unwrap();
        assert!(candidates.is_empty());
    }

    #[tokio::test]
    async fn extracts_money_and_duration() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor
            .extract("My budget is $2000 for 7 days", &EntityBias::default())
            .await
            .unwrap();

        let money = entities.iter().find(|e| e.kind == EntityKind::Money).unwrap();
        assert_eq!(money.value, "$2000");
        let duration = entities
            .iter()
            .find(|e| e.kind == EntityKind::Duration)
            .unwrap();
        assert_eq!(duration.value, "7 days");
    }

    #[tokio::test]
    async fn extracts_destination_after_preposition() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor
            .extract("I want to plan a trip to Paris", &EntityBias::default())
            .await
            .unwrap();
        let destination = entities
            .iter()
            .find(|e| e.kind == EntityKind::Destination)
            .unwrap();
        assert_eq!(destination.value, "Paris");
    }

    #[tokio::test]
    async fn resolves_there_against_prior_destination() {
        let extractor = PatternEntityExtractor::new();
        let bias = EntityBias {
            prior_destination: Some("Lisbon".to_string()),
        };
        let entities = extractor
            .extract("what can we do there in the evening?", &bias)
            .await
            .unwrap();
        let destination = entities
            .iter()
            .find(|e| e.kind == EntityKind::Destination)
            .unwrap();
        assert_eq!(destination.value, "Lisbon");
        assert!(destination.confidence < 0.7);
    }

    #[tokio::test]
    async fn there_without_prior_destination_extracts_nothing() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor
            .extract("what can we do there?", &EntityBias::default())
            .await
            .unwrap();
        assert!(entities.iter().all(|e| e.kind != EntityKind::Destination));
    }

    #[tokio::test]
    async fn extracts_dietary_preference() {
        let extractor = PatternEntityExtractor::new();
        let entities = extractor
            .extract("I am vegetarian and need gluten-free options", &EntityBias::default())
            .await
            .unwrap();
        assert_eq!(
            entities.iter().filter(|e| e.kind == EntityKind::Dietary).count(),
            2
        );
    }

    #[tokio::test]
    async fn scores_positive_sentiment() {
        let scorer = LexiconSentimentScorer::new();
        let sentiment = scorer
            .score("This itinerary looks amazing, I love it!")
            .await
            .unwrap();
        assert_eq!(sentiment.polarity, Polarity::Positive);
        assert!(sentiment.score > 0.0);
        assert_eq!(sentiment.emotion, Emotion::Joy);
    }

    #[tokio::test]
    async fn scores_negative_sentiment() {
        let scorer = LexiconSentimentScorer::new();
        let sentiment = scorer
            .score("This is terrible, I'm really frustrated")
            .await
            .unwrap();
        assert_eq!(sentiment.polarity, Polarity::Negative);
        assert_eq!(sentiment.emotion, Emotion::Frustration);
    }

    #[tokio::test]
    async fn neutral_text_scores_neutral_with_zero_confidence() {
        let scorer = LexiconSentimentScorer::new();
        let sentiment = scorer.score("we arrive on tuesday").await.unwrap();
        assert_eq!(sentiment.polarity, Polarity::Neutral);
        assert_eq!(sentiment.confidence, 0.0);
    }

    #[tokio::test]
    async fn detects_english() {
        let detector = StopwordLanguageDetector::new();
        let language = detector
            .detect("I want to plan the trip for my family")
            .await
            .unwrap();
        assert_eq!(language, Language::English);
    }

    #[tokio::test]
    async fn detects_spanish() {
        let detector = StopwordLanguageDetector::new();
        let language = detector
            .detect("quiero una semana para la playa")
            .await
            .unwrap();
        assert_eq!(language, Language::Spanish);
    }

    #[tokio::test]
    async fn unrecognized_text_is_unknown() {
        let detector = StopwordLanguageDetector::new();
        let language = detector.detect("xyzzy plugh").await.unwrap();
        assert_eq!(language, Language::Unknown);
    }
}
