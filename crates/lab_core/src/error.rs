//! Error types for the turn engine.

use thiserror::Error;

/// Result type alias using [`GameError`].
pub type Result<T> = std::result::Result<T, GameError>;

/// Top-level error type for all turn-engine errors.
///
/// Validation-level failures (unaffordable actions, clamped adjustments,
/// stuck-turn recovery) are **not** errors: they are reported as ordinary
/// result data so a turn never aborts partway. `GameError` is reserved for
/// programmer and configuration mistakes.
#[derive(Debug, Error)]
pub enum GameError {
    /// Ledger mutation referenced an unknown resource attribute.
    #[error("Unknown resource attribute: {0}")]
    InvalidAttribute(String),

    /// An action queue referenced an action ID missing from the scenario.
    #[error("Unknown action: {0}")]
    UnknownAction(String),

    /// A popup response referenced an event that is not awaiting a choice.
    #[error("No pending popup for event: {0}")]
    NoPendingPopup(String),

    /// Data file parsing error.
    #[error("Failed to parse data file '{path}': {message}")]
    DataParseError {
        /// Path or label of the source that failed to parse.
        path: String,
        /// Error message.
        message: String,
    },

    /// Scenario definition failed load-time validation.
    #[error("Validation failed for '{id}': {message}")]
    ValidationError {
        /// ID of the offending definition.
        id: String,
        /// What was wrong with it.
        message: String,
    },

    /// Invalid engine state (wrong phase, mismatched scenario, etc.).
    #[error("Invalid game state: {0}")]
    InvalidState(String),

    /// Save file was written by an incompatible engine version.
    #[error("Save version mismatch: expected {expected}, got {got}")]
    SaveVersionMismatch {
        /// Version this build writes.
        expected: u32,
        /// Version found in the file.
        got: u32,
    },

    /// Replay playback produced a different final state than recorded.
    #[error("Replay diverged: recorded hash {recorded:#018x}, replayed {replayed:#018x}")]
    ReplayDiverged {
        /// Hash stored when the replay was finalized.
        recorded: u64,
        /// Hash produced by playback.
        replayed: u64,
    },
}
