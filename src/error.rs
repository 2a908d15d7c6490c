//! Error types for the banking assistant

use thiserror::Error;

/// Result type alias for assistant operations
pub type Result<T> = std::result::Result<T, AgentError>;

#[derive(Error, Debug)]
pub enum AgentError {

    // =============================
    // Turn-Level Errors
    // =============================

    /// Malformed numeric slot input. Not recovered: the dialog stays on the
    /// same step and the caller decides whether to re-prompt.
    #[error("could not read {input:?} as a whole-number amount")]
    Parse { input: String },

    /// Classifier or account-service failure. Recoverable: the orchestrator
    /// apologizes and leaves the conversation state untouched so the user
    /// can retry. Transport and response-parse failures from the external
    /// services are folded into this variant.
    #[error("lookup failed: {0}")]
    Lookup(String),

    /// State store unreachable. Fatal for the turn: no response implying a
    /// saved state may be sent.
    #[error("state persistence error: {0}")]
    Persistence(String),

    /// The engine was invoked outside its contract (e.g. an idle turn with
    /// no intent label).
    #[error("dialog engine contract violated: {0}")]
    Engine(String),

    // =============================
    // External Library Conversions
    // =============================

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
