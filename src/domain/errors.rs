//! Error types for the workflow domain.

use std::fmt::{Display, Formatter};

/// Errors raised by the engine and the session layer.
///
/// Collaborator failures are not represented here: they are absorbed into
/// the workflow state as a terminal error phase.
#[derive(Debug, Clone, PartialEq)]
pub enum WorkflowError {
    /// `resume` (or another command) was applied in a phase that does not accept it.
    InvalidTransition { message: String },
    /// No session is stored under the given id.
    SessionNotFound { session_id: String },
    /// Optimistic lock failure (concurrent modification detected).
    ConcurrencyConflict { message: String },
    /// Storage/persistence failure.
    StorageFailure { message: String },
}

impl WorkflowError {
    pub fn invalid_transition(message: impl Into<String>) -> Self {
        Self::InvalidTransition {
            message: message.into(),
        }
    }

    pub fn storage(message: impl Into<String>) -> Self {
        Self::StorageFailure {
            message: message.into(),
        }
    }
}

impl Display for WorkflowError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidTransition { message } => write!(f, "invalid transition: {}", message),
            Self::SessionNotFound { session_id } => write!(f, "session not found: {}", session_id),
            Self::ConcurrencyConflict { message } => write!(f, "concurrency conflict: {}", message),
            Self::StorageFailure { message } => write!(f, "storage failure: {}", message),
        }
    }
}

impl std::error::Error for WorkflowError {}
