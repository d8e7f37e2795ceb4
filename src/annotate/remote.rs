//! Remote annotator client.
//!
//! Calls an external model service over HTTP for every annotator contract.
//! The service endpoint layout is `{base_url}/v1/{intent,entities,sentiment,language}`,
//! each accepting `{"text": ...}` and returning the matching slice. The core
//! stays agnostic to what model sits behind the endpoints.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;

use crate::error::AnnotatorError;

use super::types::{
    Emotion, Entity, EntityBias, EntityExtractor, EntityKind, Intent, IntentClassifier, Language,
    LanguageDetector, Polarity, Sentiment, SentimentScorer,
};

/// Configuration for the remote annotator service.
#[derive(Debug, Clone)]
pub struct RemoteAnnotatorConfig {
    /// Service base URL, e.g. `https://annotators.internal`.
    pub base_url: String,
    /// Bearer token for the service.
    pub api_key: SecretString,
    /// Per-request timeout (independent of the pipeline join timeout).
    pub request_timeout: Duration,
}

/// HTTP-backed implementation of all four annotator contracts.
pub struct RemoteAnnotator {
    client: reqwest::Client,
    config: RemoteAnnotatorConfig,
}

impl RemoteAnnotator {
    /// Build a client for the configured service.
    pub fn new(config: RemoteAnnotatorConfig) -> Result<Self, AnnotatorError> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| AnnotatorError::Http(format!("failed to build HTTP client: {e}")))?;
        Ok(Self { client, config })
    }

    async fn post_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        body: serde_json::Value,
    ) -> Result<T, AnnotatorError> {
        let url = format!("{}/v1/{}", self.config.base_url.trim_end_matches('/'), path);
        let response = self
            .client
            .post(&url)
            .bearer_auth(self.config.api_key.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| AnnotatorError::Http(format!("{path}: {e}")))?;

        if !response.status().is_success() {
            return Err(AnnotatorError::Http(format!(
                "{path}: service returned {}",
                response.status()
            )));
        }

        response.json::<T>().await.map_err(|e| AnnotatorError::InvalidResponse {
            name: path.to_string(),
            reason: e.to_string(),
        })
    }
}

// ── Wire DTOs ───────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct IntentDto {
    name: String,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    #[serde(default)]
    intents: Vec<IntentDto>,
}

#[derive(Debug, Deserialize)]
struct EntityDto {
    #[serde(rename = "type")]
    kind: String,
    value: String,
    #[serde(default)]
    span: (usize, usize),
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct EntityResponse {
    #[serde(default)]
    entities: Vec<EntityDto>,
}

#[derive(Debug, Deserialize)]
struct SentimentResponse {
    polarity: String,
    score: f32,
    #[serde(default)]
    emotion: Option<String>,
    confidence: f32,
}

#[derive(Debug, Deserialize)]
struct LanguageResponse {
    language: String,
}

fn parse_entity_kind(s: &str) -> Option<EntityKind> {
    match s {
        "destination" => Some(EntityKind::Destination),
        "money" => Some(EntityKind::Money),
        "date" => Some(EntityKind::Date),
        "duration" => Some(EntityKind::Duration),
        "dietary" => Some(EntityKind::Dietary),
        "accessibility" => Some(EntityKind::Accessibility),
        _ => None,
    }
}

fn parse_polarity(s: &str) -> Polarity {
    match s {
        "positive" => Polarity::Positive,
        "negative" => Polarity::Negative,
        _ => Polarity::Neutral,
    }
}

fn parse_emotion(s: Option<&str>) -> Emotion {
    match s {
        Some("joy") => Emotion::Joy,
        Some("anticipation") => Emotion::Anticipation,
        Some("frustration") => Emotion::Frustration,
        Some("anxiety") => Emotion::Anxiety,
        _ => Emotion::Neutral,
    }
}

fn parse_language(s: &str) -> Language {
    match s {
        "english" | "en" => Language::English,
        "spanish" | "es" => Language::Spanish,
        "french" | "fr" => Language::French,
        "german" | "de" => Language::German,
        _ => Language::Unknown,
    }
}

// ── Contract implementations ────────────────────────────────────────

#[async_trait]
impl IntentClassifier for RemoteAnnotator {
    fn name(&self) -> &str {
        "remote-intent"
    }

    async fn classify(&self, text: &str) -> Result<Vec<Intent>, AnnotatorError> {
        let response: IntentResponse = self
            .post_json("intent", serde_json::json!({ "text": text }))
            .await?;
        Ok(response
            .intents
            .into_iter()
            .map(|i| Intent::new(i.name, i.confidence))
            .collect())
    }
}

#[async_trait]
impl EntityExtractor for RemoteAnnotator {
    fn name(&self) -> &str {
        "remote-entities"
    }

    async fn extract(&self, text: &str, bias: &EntityBias) -> Result<Vec<Entity>, AnnotatorError> {
        let body = serde_json::json!({
            "text": text,
            "prior_destination": bias.prior_destination,
        });
        let response: EntityResponse = self.post_json("entities", body).await?;
        // Entity types the core doesn't know are dropped rather than failing
        // the slice.
        Ok(response
            .entities
            .into_iter()
            .filter_map(|e| {
                parse_entity_kind(&e.kind)
                    .map(|kind| Entity::new(kind, e.value, e.span, e.confidence))
            })
            .collect())
    }
}

#[async_trait]
impl SentimentScorer for RemoteAnnotator {
    fn name(&self) -> &str {
        "remote-sentiment"
    }

    async fn score(&self, text: &str) -> Result<Sentiment, AnnotatorError> {
        let response: SentimentResponse = self
            .post_json("sentiment", serde_json::json!({ "text": text }))
            .await?;
        Ok(Sentiment::new(
            parse_polarity(&response.polarity),
            response.score,
            parse_emotion(response.emotion.as_deref()),
            response.confidence,
        ))
    }
}

#[async_trait]
impl LanguageDetector for RemoteAnnotator {
    fn name(&self) -> &str {
        "remote-language"
    }

    async fn detect(&self, text: &str) -> Result<Language, AnnotatorError> {
        let response: LanguageResponse = self
            .post_json("language", serde_json::json!({ "text": text }))
            .await?;
        Ok(parse_language(&response.language))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_intent_response() {
        let raw = r#"{"intents": [{"name": "plan_trip", "confidence": 0.92}]}"#;
        let response: IntentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(response.intents.len(), 1);
        assert_eq!(response.intents[0].name, "plan_trip");
    }

    #[test]
    fn parses_entity_response_and_drops_unknown_kinds() {
        let raw = r#"{"entities": [
            {"type": "money", "value": "$2000", "span": [13, 18], "confidence": 0.95},
            {"type": "starship", "value": "?", "span": [0, 1], "confidence": 0.4}
        ]}"#;
        let response: EntityResponse = serde_json::from_str(raw).unwrap();
        let parsed: Vec<_> = response
            .entities
            .into_iter()
            .filter_map(|e| parse_entity_kind(&e.kind).map(|k| (k, e.value)))
            .collect();
        assert_eq!(parsed, vec![(EntityKind::Money, "$2000".to_string())]);
    }

    #[test]
    fn parses_sentiment_response_without_emotion() {
        let raw = r#"{"polarity": "negative", "score": -0.6, "confidence": 0.8}"#;
        let response: SentimentResponse = serde_json::from_str(raw).unwrap();
        assert_eq!(parse_polarity(&response.polarity), Polarity::Negative);
        assert_eq!(parse_emotion(response.emotion.as_deref()), Emotion::Neutral);
    }

    #[test]
    fn parses_language_codes_and_names() {
        assert_eq!(parse_language("en"), Language::English);
        assert_eq!(parse_language("french"), Language::French);
        assert_eq!(parse_language("klingon"), Language::Unknown);
    }
}
