//! Iterative SQL exploration agent
//!
//! Explores an unknown SQLite schema with a completion model, one read-only
//! query per turn, until a query answers the task.

use thiserror::Error;

pub mod database;
pub mod failover;
pub mod loop_agent;
pub mod prompt;
pub mod retry;
pub mod sanitizer;
pub mod sql;
pub mod table;
pub mod transcript;
pub mod turn;

pub use database::Database;
pub use failover::{Decision, FailoverPolicy, ModelRoster, Penalties};
pub use loop_agent::{AgentLoop, Proposal};
pub use prompt::PromptBuilder;
pub use retry::RetryPolicy;
pub use sanitizer::{Execution, Sanitizer};
pub use transcript::{Outcome, SessionLog, Transcript};
pub use turn::{Parsed, Turn, TurnState};

/// Agent session failures
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("◆ MODEL CALL FAILED: {0}")]
    Provider(#[from] wtf_provider::ProviderError),

    #[error("◆ DATABASE ERROR: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("◆ I/O ERROR: {0}")]
    Io(#[from] std::io::Error),

    #[error("◆ ENCODING ERROR: {0}")]
    Json(#[from] serde_json::Error),

    #[error("◆ NO ANSWER WITHIN BUDGET")]
    Exhausted,

    #[error("◆ NO ANSWER YET")]
    NoAnswer,
}

pub type Result<T> = std::result::Result<T, AgentError>;
