//! Guarded transition execution over a session context.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::session::context::SessionContext;

use super::state::{triggers, ConversationState};

/// An executed state transition. Immutable history record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transition {
    pub from: ConversationState,
    pub to: ConversationState,
    /// The trigger that caused the move (intent name or explicit action).
    pub trigger: String,
    pub timestamp: DateTime<Utc>,
}

/// Result of applying a trigger to a session.
///
/// Staying put is a normal outcome — unrecognized input and undeclared
/// explicit actions produce `Stayed`, never an error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum TransitionOutcome {
    Moved { transition: Transition },
    Stayed { trigger: String },
}

impl TransitionOutcome {
    /// Short label for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Moved { .. } => "moved",
            Self::Stayed { .. } => "stayed",
        }
    }

    /// The transition, if one occurred.
    pub fn transition(&self) -> Option<&Transition> {
        match self {
            Self::Moved { transition } => Some(transition),
            Self::Stayed { .. } => None,
        }
    }
}

/// The dialogue state machine.
///
/// Stateless — all session state lives in the `SessionContext` it mutates.
pub struct DialogueStateMachine;

impl DialogueStateMachine {
    /// Apply a detected intent as the trigger.
    ///
    /// Falls back to the generic `continue` trigger when the intent has no
    /// declared transition from the current state.
    pub fn apply_intent(ctx: &mut SessionContext, intent_name: &str) -> TransitionOutcome {
        if ctx.current_state.next_for(intent_name).is_some() {
            Self::step(ctx, intent_name)
        } else {
            Self::step(ctx, triggers::CONTINUE)
        }
    }

    /// Apply an explicit user action as the trigger.
    ///
    /// No fallback: an action not declared from the current state is a
    /// no-op result, not an error.
    pub fn apply_action(ctx: &mut SessionContext, action: &str) -> TransitionOutcome {
        Self::step(ctx, action)
    }

    fn step(ctx: &mut SessionContext, trigger: &str) -> TransitionOutcome {
        match ctx.current_state.next_for(trigger) {
            Some(next) => {
                let transition = Transition {
                    from: ctx.current_state,
                    to: next,
                    trigger: trigger.to_string(),
                    timestamp: Utc::now(),
                };
                ctx.path.push(next);
                ctx.current_state = next;
                ctx.metrics.total_transitions += 1;
                debug!(
                    session_id = %ctx.session_id,
                    from = %transition.from,
                    to = %transition.to,
                    trigger = trigger,
                    "State transition"
                );
                TransitionOutcome::Moved { transition }
            }
            None => {
                ctx.metrics.no_transition_count += 1;
                debug!(
                    session_id = %ctx.session_id,
                    state = %ctx.current_state,
                    trigger = trigger,
                    "no_transition"
                );
                TransitionOutcome::Stayed {
                    trigger: trigger.to_string(),
                }
            }
        }
    }
}
