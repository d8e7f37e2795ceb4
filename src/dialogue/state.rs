//! Conversation states and their transition tables.
//!
//! A closed enumeration: every state carries its own trigger table, so an
//! invalid state or transition cannot be represented at all.

use serde::{Deserialize, Serialize};

/// Named transition triggers.
///
/// Triggers share a namespace with detected intent names; explicit user
/// actions use the same constants.
pub mod triggers {
    /// Generic fallback trigger tried when no detected intent matches.
    pub const CONTINUE: &str = "continue";
    pub const GREETING: &str = "greeting";
    pub const PLAN_TRIP: &str = "plan_trip";
    pub const BUDGET_SHARED: &str = "budget_shared";
    pub const PREFERENCES_SHARED: &str = "preferences_shared";
    pub const DESTINATION_CHOSEN: &str = "destination_chosen";
    pub const ITINERARY_APPROVED: &str = "itinerary_approved";
    pub const BOOKING_COMPLETED: &str = "booking_completed";
    pub const ASK_SUPPORT: &str = "ask_support";
}

/// The conversation state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConversationState {
    /// Opening small talk; nothing about the trip is known yet.
    #[default]
    Greeting,
    /// Gathering what kind of trip the user wants.
    NeedsAssessment,
    /// Narrowing down where to go.
    DestinationSelection,
    /// Building the day-by-day plan.
    ItineraryPlanning,
    /// Walking through bookings for the agreed plan.
    BookingAssistance,
    /// Everything booked; terminal.
    Confirmation,
    /// Escalated to human support; terminal.
    Support,
}

impl ConversationState {
    /// The declared initial state for every session.
    pub fn initial() -> Self {
        Self::Greeting
    }

    /// Human-readable description.
    pub fn description(&self) -> &'static str {
        match self {
            Self::Greeting => "Welcoming the traveler and opening the conversation",
            Self::NeedsAssessment => "Understanding what kind of trip the traveler wants",
            Self::DestinationSelection => "Choosing a destination together",
            Self::ItineraryPlanning => "Shaping the itinerary for the chosen destination",
            Self::BookingAssistance => "Assisting with bookings for the agreed itinerary",
            Self::Confirmation => "Trip confirmed and booked",
            Self::Support => "Handed over to human support",
        }
    }

    /// This state's trigger table: `(trigger, next_state)` pairs.
    ///
    /// Terminal states declare an empty table — the only way forward from
    /// them is an explicit session reset.
    pub fn transitions(&self) -> &'static [(&'static str, ConversationState)] {
        use triggers::*;
        use ConversationState::*;
        match self {
            Greeting => &[
                (PLAN_TRIP, NeedsAssessment),
                (ASK_SUPPORT, Support),
                (CONTINUE, NeedsAssessment),
            ],
            NeedsAssessment => &[
                (BUDGET_SHARED, DestinationSelection),
                (PREFERENCES_SHARED, DestinationSelection),
                (DESTINATION_CHOSEN, DestinationSelection),
                (ASK_SUPPORT, Support),
            ],
            DestinationSelection => &[
                (DESTINATION_CHOSEN, ItineraryPlanning),
                (ASK_SUPPORT, Support),
            ],
            ItineraryPlanning => &[
                (ITINERARY_APPROVED, BookingAssistance),
                (DESTINATION_CHOSEN, DestinationSelection),
                (ASK_SUPPORT, Support),
            ],
            BookingAssistance => &[
                (BOOKING_COMPLETED, Confirmation),
                (ASK_SUPPORT, Support),
            ],
            Confirmation => &[],
            Support => &[],
        }
    }

    /// Look up the next state for a trigger, if declared.
    pub fn next_for(&self, trigger: &str) -> Option<ConversationState> {
        self.transitions()
            .iter()
            .find(|(t, _)| *t == trigger)
            .map(|(_, next)| *next)
    }

    /// All states reachable from this one.
    pub fn reachable(&self) -> Vec<ConversationState> {
        let mut states: Vec<ConversationState> =
            self.transitions().iter().map(|(_, next)| *next).collect();
        states.dedup();
        states
    }

    /// Terminal states offer no forward moves besides reset.
    pub fn is_terminal(&self) -> bool {
        self.transitions().is_empty()
    }

    /// Every state, in flow order.
    pub fn all() -> &'static [ConversationState] {
        use ConversationState::*;
        &[
            Greeting,
            NeedsAssessment,
            DestinationSelection,
            ItineraryPlanning,
            BookingAssistance,
            Confirmation,
            Support,
        ]
    }
}

impl std::fmt::Display for ConversationState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::Greeting => "greeting",
            Self::NeedsAssessment => "needs_assessment",
            Self::DestinationSelection => "destination_selection",
            Self::ItineraryPlanning => "itinerary_planning",
            Self::BookingAssistance => "booking_assistance",
            Self::Confirmation => "confirmation",
            Self::Support => "support",
        };
        write!(f, "{s}")
    }
}
