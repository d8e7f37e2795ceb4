//! Configuration types.

use std::time::Duration;

use crate::tone::{AdaptationSpeed, TonePreference};

/// Dialogue engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Per-annotator timeout for the fan-out/fan-in join.
    pub annotator_timeout: Duration,
    /// Maximum retries for a failed context save/load.
    pub store_max_retries: u32,
    /// Base delay for store retry backoff (doubled per attempt, plus jitter).
    pub store_retry_base: Duration,
    /// Ceiling on a single store retry delay.
    pub store_retry_cap: Duration,
    /// How many intents `most_common_intents` reports.
    pub top_intents: usize,
    /// Personality/tone selection settings.
    pub personality: PersonalityConfig,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            annotator_timeout: Duration::from_millis(800),
            store_max_retries: 3,
            store_retry_base: Duration::from_millis(50),
            store_retry_cap: Duration::from_secs(2),
            top_intents: 5,
            personality: PersonalityConfig::default(),
        }
    }
}

/// Settings for the personality adapter.
///
/// Threaded through each `select_tone` call — the adapter itself keeps no
/// state, and there is no ambient "mode" anywhere.
#[derive(Debug, Clone, Default)]
pub struct PersonalityConfig {
    /// How the profile is chosen: automatic, caller-pinned, or state-aware.
    pub preference: TonePreference,
    /// Whether the conversation state may influence the chosen profile.
    pub context_aware: bool,
    /// How quickly tone and engagement tracking react to new sentiment.
    pub adaptation_speed: AdaptationSpeed,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn engine_config_defaults_are_bounded() {
        let config = EngineConfig::default();
        assert!(config.annotator_timeout < Duration::from_secs(5));
        assert!(config.store_max_retries >= 1);
        assert!(config.store_retry_base < config.store_retry_cap);
        assert!(config.top_intents > 0);
    }

    #[test]
    fn personality_config_default_is_auto() {
        let config = PersonalityConfig::default();
        assert_eq!(config.preference, TonePreference::Auto);
        assert!(!config.context_aware);
    }
}
