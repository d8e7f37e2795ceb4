//! Personality adapter — maps conversation state + sentiment to a response
//! tone profile.
//!
//! Pure selection: everything the adapter needs arrives as arguments, and
//! nothing here remembers anything between calls. The external response
//! generator consumes the chosen profile.

use serde::{Deserialize, Serialize};

use crate::annotate::types::{Polarity, Sentiment};
use crate::config::PersonalityConfig;
use crate::dialogue::ConversationState;

/// How the profile is chosen.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TonePreference {
    /// Sentiment-driven selection.
    #[default]
    Auto,
    /// Caller pins a profile; it sticks until explicitly switched.
    Manual,
    /// Sentiment-driven, with the conversation state weighing in too.
    Context,
}

impl TonePreference {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Auto => "auto",
            Self::Manual => "manual",
            Self::Context => "context",
        }
    }

    /// Parse a configuration string; unknown values fall back to auto.
    pub fn parse(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("manual") => Self::Manual,
            s if s.eq_ignore_ascii_case("context") => Self::Context,
            _ => Self::Auto,
        }
    }
}

/// How quickly tone switching and sentiment tracking react.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdaptationSpeed {
    Slow,
    #[default]
    Medium,
    Fast,
}

impl AdaptationSpeed {
    /// EMA rate for the session's sentiment-derived metrics.
    pub fn ema_rate(&self) -> f32 {
        match self {
            Self::Slow => 0.2,
            Self::Medium => 0.4,
            Self::Fast => 0.7,
        }
    }

    /// Minimum sentiment confidence required before abandoning the
    /// previously selected profile.
    fn switch_threshold(&self) -> f32 {
        match self {
            Self::Slow => 0.6,
            Self::Medium => 0.3,
            Self::Fast => 0.0,
        }
    }

    pub fn parse(s: &str) -> Self {
        match s.trim() {
            s if s.eq_ignore_ascii_case("slow") => Self::Slow,
            s if s.eq_ignore_ascii_case("fast") => Self::Fast,
            _ => Self::Medium,
        }
    }
}

/// A response tone profile for the external generator.
#[derive(Debug, Serialize)]
pub struct PersonalityProfile {
    pub name: &'static str,
    /// Sample phrasings the generator can imitate.
    pub tone_examples: &'static [&'static str],
    /// Relative weight when nothing else discriminates.
    pub selection_weight: f32,
}

pub static WARM_ENTHUSIAST: PersonalityProfile = PersonalityProfile {
    name: "warm_enthusiast",
    tone_examples: &[
        "Oh, that's a fantastic choice — you're going to love it there!",
        "I can already picture this trip. Let's make it happen!",
    ],
    selection_weight: 0.35,
};

pub static CALM_CONCIERGE: PersonalityProfile = PersonalityProfile {
    name: "calm_concierge",
    tone_examples: &[
        "I understand — let's take this one step at a time.",
        "No problem at all. Here's what we can do about that.",
    ],
    selection_weight: 0.2,
};

pub static PATIENT_GUIDE: PersonalityProfile = PersonalityProfile {
    name: "patient_guide",
    tone_examples: &[
        "Good question. Let me walk you through the options.",
        "Whenever you're ready — there's no rush on any of this.",
    ],
    selection_weight: 0.3,
};

pub static EFFICIENT_PLANNER: PersonalityProfile = PersonalityProfile {
    name: "efficient_planner",
    tone_examples: &[
        "Here's the summary: three bookings, all refundable until Friday.",
        "Done. Next up is the hotel — two options fit your budget.",
    ],
    selection_weight: 0.15,
};

/// All built-in profiles, in declaration order.
pub fn builtin_profiles() -> &'static [&'static PersonalityProfile] {
    static PROFILES: &[&PersonalityProfile] = &[
        &WARM_ENTHUSIAST,
        &CALM_CONCIERGE,
        &PATIENT_GUIDE,
        &EFFICIENT_PLANNER,
    ];
    PROFILES
}

/// Look up a built-in profile by name.
pub fn profile_by_name(name: &str) -> Option<&'static PersonalityProfile> {
    builtin_profiles().iter().copied().find(|p| p.name == name)
}

/// The weight-based default when nothing else discriminates.
fn default_profile() -> &'static PersonalityProfile {
    builtin_profiles()
        .iter()
        .copied()
        .max_by(|a, b| {
            a.selection_weight
                .partial_cmp(&b.selection_weight)
                .unwrap_or(std::cmp::Ordering::Equal)
        })
        .expect("builtin profiles are non-empty")
}

/// Select the response tone for one turn.
///
/// `last` is the profile chosen on the previous turn, if any. In manual
/// mode it is returned unchanged until the caller switches it explicitly;
/// otherwise negative sentiment pulls toward the calmer profile and
/// positive sentiment toward the enthusiastic one, with the conversation
/// state weighing in when `context_aware` is set. Slow adaptation keeps
/// the previous profile unless the sentiment reading is confident.
pub fn select_tone(
    state: ConversationState,
    sentiment: &Sentiment,
    config: &PersonalityConfig,
    last: Option<&str>,
) -> &'static PersonalityProfile {
    let last_profile = last.and_then(profile_by_name);

    if config.preference == TonePreference::Manual {
        return last_profile.unwrap_or_else(default_profile);
    }

    let candidate = pick_candidate(state, sentiment, config);

    // Sticky selection: a weak reading is not enough to switch away from
    // the established tone at slow/medium adaptation speeds.
    if let Some(previous) = last_profile {
        if candidate.name != previous.name
            && sentiment.confidence < config.adaptation_speed.switch_threshold()
        {
            return previous;
        }
    }

    candidate
}

fn pick_candidate(
    state: ConversationState,
    sentiment: &Sentiment,
    config: &PersonalityConfig,
) -> &'static PersonalityProfile {
    // A frustrated or negative traveler always gets the calmer register.
    if sentiment.polarity == Polarity::Negative || sentiment.score <= -0.25 {
        return &CALM_CONCIERGE;
    }

    let state_aware = config.context_aware || config.preference == TonePreference::Context;
    if state_aware {
        match state {
            ConversationState::Support => return &PATIENT_GUIDE,
            ConversationState::BookingAssistance | ConversationState::Confirmation => {
                return &EFFICIENT_PLANNER;
            }
            _ => {}
        }
    }

    if sentiment.polarity == Polarity::Positive && sentiment.score >= 0.25 {
        return &WARM_ENTHUSIAST;
    }

    default_profile()
}
