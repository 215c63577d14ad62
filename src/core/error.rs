use thiserror::Error;

use crate::core::types::{AgentId, Position, RunId};

#[derive(Error, Debug)]
pub enum MazeError {
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Decision unavailable: {0}")]
    DecisionUnavailable(String),

    #[error("Invalid move for agent {agent:?}: {from:?} -> {to:?}")]
    InvalidMove {
        agent: AgentId,
        from: Position,
        to: Position,
    },

    #[error("Persistence unavailable: {0}")]
    Persistence(String),

    #[error("Run not found: {0}")]
    RunNotFound(RunId),

    #[error("Agent not found: {0:?}")]
    AgentNotFound(AgentId),

    #[error("Cannot {action} a run that is {from}")]
    InvalidTransition {
        from: &'static str,
        action: &'static str,
    },

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerdeError(#[from] serde_json::Error),

    #[error("TOML error: {0}")]
    TomlError(#[from] toml::de::Error),
}

impl MazeError {
    /// Configuration errors abort run creation; everything else is recovered
    /// locally by the scheduler or the manager.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            MazeError::Configuration(_) | MazeError::TomlError(_)
        )
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Configuration(msg.into())
    }
}

pub type Result<T> = std::result::Result<T, MazeError>;
