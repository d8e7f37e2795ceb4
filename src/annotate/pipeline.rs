//! Annotator pipeline — fan-out to independent sub-annotators, merge into
//! one annotation record.
//!
//! The four annotators run concurrently under a shared per-annotator
//! timeout. A slice that errors or times out contributes its defined
//! default; the pipeline itself never fails a turn. Conflicting intent
//! candidates are resolved by confidence, ties by declaration order.

use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::warn;

use super::heuristic::{
    KeywordIntentClassifier, LexiconSentimentScorer, PatternEntityExtractor,
    StopwordLanguageDetector,
};
use super::types::{
    Annotation, Entity, EntityBias, EntityExtractor, Intent, IntentClassifier, Language,
    LanguageDetector, Sentiment, SentimentScorer, Utterance,
};

/// The annotator pipeline.
///
/// Holds one implementation per contract; production and tests inject
/// their own via [`AnnotatorPipeline::new`].
pub struct AnnotatorPipeline {
    intent: Arc<dyn IntentClassifier>,
    entities: Arc<dyn EntityExtractor>,
    sentiment: Arc<dyn SentimentScorer>,
    language: Arc<dyn LanguageDetector>,
    timeout: Duration,
}

impl AnnotatorPipeline {
    /// Pipeline with injected annotators.
    pub fn new(
        intent: Arc<dyn IntentClassifier>,
        entities: Arc<dyn EntityExtractor>,
        sentiment: Arc<dyn SentimentScorer>,
        language: Arc<dyn LanguageDetector>,
        timeout: Duration,
    ) -> Self {
        Self {
            intent,
            entities,
            sentiment,
            language,
            timeout,
        }
    }

    /// Pipeline wired with the built-in heuristic annotators.
    pub fn heuristic(timeout: Duration) -> Self {
        Self::new(
            Arc::new(KeywordIntentClassifier::new()),
            Arc::new(PatternEntityExtractor::new()),
            Arc::new(LexiconSentimentScorer::new()),
            Arc::new(StopwordLanguageDetector::new()),
            timeout,
        )
    }

    /// Annotate one utterance.
    ///
    /// `bias` is a read-only preference snapshot used only for entity
    /// disambiguation. All four sub-annotators run concurrently; the join
    /// completes once each has returned, failed, or timed out.
    pub async fn annotate(&self, utterance: &Utterance, bias: &EntityBias) -> Annotation {
        let text = utterance.text.as_str();

        let (intents, entities, sentiment, language) = futures::join!(
            timeout(self.timeout, self.intent.classify(text)),
            timeout(self.timeout, self.entities.extract(text, bias)),
            timeout(self.timeout, self.sentiment.score(text)),
            timeout(self.timeout, self.language.detect(text)),
        );

        let intent = match intents {
            Ok(Ok(candidates)) => merge_intents(candidates),
            Ok(Err(e)) => {
                warn!(annotator = self.intent.name(), error = %e, "Intent classifier failed, using default");
                Intent::unknown()
            }
            Err(_) => {
                warn!(annotator = self.intent.name(), timeout = ?self.timeout, "Intent classifier timed out, using default");
                Intent::unknown()
            }
        };

        let entities = match entities {
            Ok(Ok(entities)) => sanitize_entities(entities),
            Ok(Err(e)) => {
                warn!(annotator = self.entities.name(), error = %e, "Entity extractor failed, using default");
                Vec::new()
            }
            Err(_) => {
                warn!(annotator = self.entities.name(), timeout = ?self.timeout, "Entity extractor timed out, using default");
                Vec::new()
            }
        };

        let sentiment = match sentiment {
            Ok(Ok(sentiment)) => sentiment,
            Ok(Err(e)) => {
                warn!(annotator = self.sentiment.name(), error = %e, "Sentiment scorer failed, using default");
                Sentiment::neutral()
            }
            Err(_) => {
                warn!(annotator = self.sentiment.name(), timeout = ?self.timeout, "Sentiment scorer timed out, using default");
                Sentiment::neutral()
            }
        };

        let language = match language {
            Ok(Ok(language)) => language,
            Ok(Err(e)) => {
                warn!(annotator = self.language.name(), error = %e, "Language detector failed, using default");
                Language::Unknown
            }
            Err(_) => {
                warn!(annotator = self.language.name(), timeout = ?self.timeout, "Language detector timed out, using default");
                Language::Unknown
            }
        };

        Annotation {
            intent,
            entities,
            sentiment,
            language,
        }
    }
}

/// Resolve competing intent candidates.
///
/// Highest confidence wins; on a tie the earliest-declared candidate is
/// kept (`max_by` returns the last maximum, so strict comparison keeps the
/// first among equals).
fn merge_intents(candidates: Vec<Intent>) -> Intent {
    let mut best: Option<Intent> = None;
    for candidate in candidates {
        match &best {
            Some(current) if candidate.confidence <= current.confidence => {}
            _ => best = Some(candidate),
        }
    }
    best.unwrap_or_else(Intent::unknown)
}

/// Clamp entity confidences into range.
fn sanitize_entities(entities: Vec<Entity>) -> Vec<Entity> {
    entities
        .into_iter()
        .map(|mut e| {
            e.confidence = e.confidence.clamp(0.0, 1.0);
            e
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    use async_trait::async_trait;
    use uuid::Uuid;

    use crate::annotate::types::{EntityKind, Polarity};
    use crate::error::AnnotatorError;

    struct FixedIntent(Vec<Intent>);

    #[async_trait]
    impl IntentClassifier for FixedIntent {
        async fn classify(&self, _text: &str) -> Result<Vec<Intent>, AnnotatorError> {
            Ok(self.0.clone())
        }
    }

    struct FailingIntent;

    #[async_trait]
    impl IntentClassifier for FailingIntent {
        async fn classify(&self, _text: &str) -> Result<Vec<Intent>, AnnotatorError> {
            Err(AnnotatorError::Failed {
                name: "intent".into(),
                reason: "model offline".into(),
            })
        }
    }

    struct SlowIntent;

    #[async_trait]
    impl IntentClassifier for SlowIntent {
        async fn classify(&self, _text: &str) -> Result<Vec<Intent>, AnnotatorError> {
            tokio::time::sleep(Duration::from_secs(30)).await;
            Ok(vec![Intent::new("too_late", 1.0)])
        }
    }

    fn pipeline_with_intent(intent: Arc<dyn IntentClassifier>) -> AnnotatorPipeline {
        AnnotatorPipeline::new(
            intent,
            Arc::new(super::super::heuristic::PatternEntityExtractor::new()),
            Arc::new(super::super::heuristic::LexiconSentimentScorer::new()),
            Arc::new(super::super::heuristic::StopwordLanguageDetector::new()),
            Duration::from_millis(100),
        )
    }

    fn utterance(text: &str) -> Utterance {
        Utterance::new(Uuid::new_v4(), text)
    }

    #[test]
    fn merge_picks_highest_confidence() {
        let merged = merge_intents(vec![
            Intent::new("plan_trip", 0.6),
            Intent::new("budget_shared", 0.9),
        ]);
        assert_eq!(merged.name, "budget_shared");
    }

    #[test]
    fn merge_ties_break_by_declaration_order() {
        let merged = merge_intents(vec![
            Intent::new("plan_trip", 0.8),
            Intent::new("ask_support", 0.8),
        ]);
        assert_eq!(merged.name, "plan_trip");
    }

    #[test]
    fn merge_empty_is_unknown() {
        assert!(merge_intents(vec![]).is_unknown());
    }

    #[tokio::test]
    async fn heuristic_pipeline_annotates_plan_trip() {
        let pipeline = AnnotatorPipeline::heuristic(Duration::from_millis(200));
        let annotation = pipeline
            .annotate(&utterance("I want to plan a trip to Paris"), &EntityBias::default())
            .await;

        assert_eq!(annotation.intent.name, "plan_trip");
        assert!(annotation
            .entities
            .iter()
            .any(|e| e.kind == EntityKind::Destination && e.value == "Paris"));
        assert_eq!(annotation.language, crate::annotate::types::Language::English);
    }

    #[tokio::test]
    async fn failing_annotator_falls_back_to_default() {
        let pipeline = pipeline_with_intent(Arc::new(FailingIntent));
        let annotation = pipeline
            .annotate(&utterance("I love this plan"), &EntityBias::default())
            .await;

        // Intent slice defaulted; the other slices still produced values.
        assert!(annotation.intent.is_unknown());
        assert_eq!(annotation.intent.confidence, 0.0);
        assert_eq!(annotation.sentiment.polarity, Polarity::Positive);
    }

    #[tokio::test]
    async fn timed_out_annotator_does_not_block_the_join() {
        let pipeline = pipeline_with_intent(Arc::new(SlowIntent));
        let start = std::time::Instant::now();
        let annotation = pipeline
            .annotate(&utterance("hello there"), &EntityBias::default())
            .await;

        assert!(annotation.intent.is_unknown());
        assert!(start.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn conflict_resolution_prefers_configured_candidates() {
        let pipeline = pipeline_with_intent(Arc::new(FixedIntent(vec![
            Intent::new("ask_support", 0.4),
            Intent::new("plan_trip", 0.95),
        ])));
        let annotation = pipeline
            .annotate(&utterance("anything"), &EntityBias::default())
            .await;
        assert_eq!(annotation.intent.name, "plan_trip");
    }
}
