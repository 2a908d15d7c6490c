//! Virtual Banking Assistant
//!
//! A single-turn conversational banking agent:
//! - Walks new users through a three-step onboarding flow
//! - Answers balance and upcoming-bill questions via an external account API
//! - Runs slot-filling dialogs for creating bills and starting transfers
//! - Persists one state record per conversation
//!
//! TURN FLOW:
//! LOAD STATE → CLASSIFY (idle turns only) → ENGINE → LOOKUP? → PERSIST → REPLY
//!
//! The core is `engine::DialogEngine`, a pure transition function; the
//! classifier, account service, record sink, and state store are external
//! collaborators behind traits.

pub mod accounts;
pub mod api;
pub mod classifier;
pub mod engine;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod records;
pub mod state;

pub use error::{AgentError, Result};

// Re-export common types
pub use engine::{DialogEngine, Transition, TurnOutput};
pub use models::*;
