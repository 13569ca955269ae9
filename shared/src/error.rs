//! Errors raised by the pure workflow rules

use thiserror::Error;

/// Error returned when a workflow rule rejects an operation
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum WorkflowError {
    /// The entity is not in a state that allows the requested action
    #[error("cannot {action} while {entity} is '{from}'")]
    InvalidTransition {
        entity: &'static str,
        from: String,
        action: &'static str,
    },

    /// The acting user's role does not allow the action
    #[error("role '{role}' may not {action}")]
    Forbidden { role: String, action: &'static str },

    /// Input failed a domain validation rule
    #[error("{field}: {message}")]
    Validation { field: &'static str, message: String },
}

impl WorkflowError {
    pub fn validation(field: &'static str, message: impl Into<String>) -> Self {
        WorkflowError::Validation {
            field,
            message: message.into(),
        }
    }
}

pub type WorkflowResult<T> = Result<T, WorkflowError>;
