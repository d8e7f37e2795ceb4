//! Error types for Trip Assist.

use std::time::Duration;

use uuid::Uuid;

/// Top-level error type for the dialogue core.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("Annotator error: {0}")]
    Annotator(#[from] AnnotatorError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Engine error: {0}")]
    Engine(#[from] EngineError),
}

/// Configuration-related errors.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid configuration value for {key}: {message}")]
    InvalidValue { key: String, message: String },

    #[error("Failed to parse configuration: {0}")]
    ParseError(String),
}

/// Sub-annotator failures.
///
/// These are always recovered inside the annotator pipeline — a failed or
/// timed-out annotator contributes its defined default value and the turn
/// proceeds. They never escape `process_turn`.
#[derive(Debug, thiserror::Error)]
pub enum AnnotatorError {
    #[error("Annotator {name} failed: {reason}")]
    Failed { name: String, reason: String },

    #[error("Annotator {name} timed out after {timeout:?}")]
    Timeout { name: String, timeout: Duration },

    #[error("Annotator {name} returned an invalid response: {reason}")]
    InvalidResponse { name: String, reason: String },

    #[error("Annotator service request failed: {0}")]
    Http(String),
}

/// Persistence backend errors.
///
/// Save/load failures are retried with bounded backoff; after retries
/// exhaust, the turn proceeds against the in-memory context and the failure
/// is surfaced as a soft warning on the turn outcome, never a hard error.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open store: {0}")]
    Open(String),

    #[error("Query failed: {0}")]
    Query(String),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Store unavailable after {attempts} attempts: {reason}")]
    Unavailable { attempts: u32, reason: String },
}

/// Turn-level errors surfaced from the engine.
///
/// Deliberately small: unknown sessions are created, unmatched triggers are
/// no-op outcomes, and annotator/store failures degrade gracefully.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    #[error("Empty utterance for session {session_id}")]
    EmptyUtterance { session_id: Uuid },

    #[error("Session {session_id} was cancelled while the turn was in flight")]
    SessionCancelled { session_id: Uuid },
}

/// Result type alias for the dialogue core.
pub type Result<T> = std::result::Result<T, Error>;
