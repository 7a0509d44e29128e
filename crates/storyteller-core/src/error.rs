use crate::relay::StoryStep;
use std::fmt;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, RelayError>;

/// External system a provider error came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Upstream {
    Completion,
    Database,
    AgentServer,
    TokenService,
}

impl fmt::Display for Upstream {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Upstream::Completion => write!(f, "completion provider"),
            Upstream::Database => write!(f, "summary database"),
            Upstream::AgentServer => write!(f, "agent server"),
            Upstream::TokenService => write!(f, "token service"),
        }
    }
}

#[derive(Debug, Error)]
pub enum RelayError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("{service} error: {detail}")]
    Provider { service: Upstream, detail: String },

    #[error("Unexpected agent response: {0}")]
    ResponseShape(String),

    #[error("No summary yet, cannot start a conversation")]
    NoAgentAvailable,

    #[error("Story step '{step}' failed: {source}")]
    Story {
        step: StoryStep,
        #[source]
        source: Box<RelayError>,
    },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(#[from] redb::DatabaseError),

    #[error("Table error: {0}")]
    Table(#[from] redb::TableError),

    #[error("Transaction error: {0}")]
    Transaction(#[from] redb::TransactionError),

    #[error("Commit error: {0}")]
    Commit(#[from] redb::CommitError),

    #[error("Storage operation error: {0}")]
    StorageOperation(#[from] redb::StorageError),

    #[error("Credential error: {0}")]
    Credentials(String),

    #[error("Corrupt summary store: {0}")]
    Corrupt(String),

    #[error("Serialization error: {0}")]
    Serialization(#[from] bincode::Error),
}

impl RelayError {
    pub fn provider(service: Upstream, detail: impl Into<String>) -> Self {
        Self::Provider {
            service,
            detail: detail.into(),
        }
    }

    /// The innermost error, looking through saga step wrappers.
    pub fn root(&self) -> &RelayError {
        match self {
            RelayError::Story { source, .. } => source.root(),
            other => other,
        }
    }

    pub fn is_validation(&self) -> bool {
        matches!(self.root(), RelayError::Validation(_))
    }
}
