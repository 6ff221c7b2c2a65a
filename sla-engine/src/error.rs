//! Engine error taxonomy.
//!
//! Every failure is returned as a typed result; nothing is swallowed.
//! [`ErrorKind`] gives callers a flat classification for retry and
//! user-facing decisions.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::completion::ValidationErrors;
use crate::store::StoreError;
use crate::ticket::{FeedbackLink, Priority, TicketId, TransitionError};

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;

/// Missing or invalid SLA policy / desk configuration. Fatal for the
/// affected call and surfaced to operators; never retried.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ConfigurationError {
    /// A priority has no budget configured
    #[error("no SLA budget configured for priority {priority}")]
    MissingBudget { priority: Priority },

    /// A budget is zero or negative
    #[error("SLA budget for {priority} must be positive (got {seconds}s)")]
    NonPositiveBudget { priority: Priority, seconds: i64 },

    /// A budget is longer than any ticket can sensibly run
    #[error("SLA budget for {priority} is out of range (got {seconds}s, at most {max}s)")]
    BudgetOutOfRange {
        priority: Priority,
        seconds: i64,
        max: i64,
    },

    /// Budgets do not shrink as priority rises
    #[error("SLA budget for {higher} must be shorter than for {lower}")]
    BudgetOrder { higher: Priority, lower: Priority },

    /// Warning threshold is malformed
    #[error("invalid warning threshold: {message}")]
    InvalidWarning { message: String },

    /// Feedback settings are malformed
    #[error("invalid feedback settings: {message}")]
    InvalidFeedback { message: String },

    /// Configuration file could not be read
    #[error("failed to read configuration {path}: {message}")]
    Io { path: PathBuf, message: String },

    /// Configuration text could not be parsed
    #[error("failed to parse configuration: {message}")]
    Parse { message: String },
}

impl ConfigurationError {
    /// Create an invalid warning error
    pub fn invalid_warning(message: impl Into<String>) -> Self {
        Self::InvalidWarning {
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}

/// Errors returned by engine operations
#[derive(Error, Debug)]
pub enum EngineError {
    /// SLA policy missing or invalid
    #[error(transparent)]
    Configuration(#[from] ConfigurationError),

    /// The requested status change is not allowed
    #[error(transparent)]
    IllegalTransition(#[from] TransitionError),

    /// Completion preconditions unmet, one entry per field
    #[error(transparent)]
    Validation(#[from] ValidationErrors),

    /// Completion already happened; carries the link minted the first time
    #[error("ticket {ticket_id} is already completed")]
    AlreadyCompleted {
        ticket_id: TicketId,
        feedback: Option<FeedbackLink>,
    },

    /// Lost the per-ticket version race
    #[error("ticket {ticket_id} changed concurrently (expected version {expected}, found {actual})")]
    ConcurrencyConflict {
        ticket_id: TicketId,
        expected: u64,
        actual: u64,
    },

    /// No ticket with this id
    #[error("ticket not found: {ticket_id}")]
    TicketNotFound { ticket_id: TicketId },

    /// A ticket with this id already exists
    #[error("ticket already exists: {ticket_id}")]
    DuplicateTicket { ticket_id: TicketId },

    /// Backing store failure
    #[error("store error: {message}")]
    Store { message: String },
}

impl EngineError {
    /// Flat classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::IllegalTransition(_) => ErrorKind::IllegalTransition,
            Self::Validation(_) => ErrorKind::Validation,
            Self::AlreadyCompleted { .. } => ErrorKind::AlreadyCompleted,
            Self::ConcurrencyConflict { .. } => ErrorKind::ConcurrencyConflict,
            Self::TicketNotFound { .. } => ErrorKind::NotFound,
            Self::DuplicateTicket { .. } => ErrorKind::Duplicate,
            Self::Store { .. } => ErrorKind::Storage,
        }
    }

    /// Check if this error is retryable (transient failure)
    pub fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<StoreError> for EngineError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::NotFound(ticket_id) => Self::TicketNotFound { ticket_id },
            StoreError::Duplicate(ticket_id) => Self::DuplicateTicket { ticket_id },
            StoreError::VersionConflict {
                ticket_id,
                expected,
                actual,
            } => Self::ConcurrencyConflict {
                ticket_id,
                expected,
                actual,
            },
            StoreError::LockPoisoned => Self::Store {
                message: "store lock poisoned".to_string(),
            },
        }
    }
}

/// High-level error kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Configuration,
    IllegalTransition,
    Validation,
    AlreadyCompleted,
    ConcurrencyConflict,
    NotFound,
    Duplicate,
    Storage,
}

impl ErrorKind {
    /// Whether this error is retryable.
    pub fn is_retryable(self) -> bool {
        matches!(self, Self::ConcurrencyConflict)
    }

    /// Whether a caller that retries blindly may treat this as success.
    pub fn is_idempotent_success(self) -> bool {
        matches!(self, Self::AlreadyCompleted)
    }

    /// Suggested action for this error kind.
    pub fn suggested_action(self) -> &'static str {
        match self {
            Self::Configuration => "fix the SLA policy configuration and reload",
            Self::IllegalTransition => "refresh the ticket and offer only the allowed actions",
            Self::Validation => "show the listed fields to the user and resubmit",
            Self::AlreadyCompleted => "treat as success and reuse the existing feedback link",
            Self::ConcurrencyConflict => "re-read the ticket and retry once",
            Self::NotFound => "verify the ticket id",
            Self::Duplicate => "create the ticket under a fresh id",
            Self::Storage => "check store health before retrying",
        }
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Configuration => write!(f, "configuration"),
            Self::IllegalTransition => write!(f, "illegal_transition"),
            Self::Validation => write!(f, "validation"),
            Self::AlreadyCompleted => write!(f, "already_completed"),
            Self::ConcurrencyConflict => write!(f, "concurrency_conflict"),
            Self::NotFound => write!(f, "not_found"),
            Self::Duplicate => write!(f, "duplicate"),
            Self::Storage => write!(f, "storage"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ticket::TicketStatus;

    #[test]
    fn test_only_conflicts_are_retryable() {
        let conflict = EngineError::ConcurrencyConflict {
            ticket_id: "t-1".into(),
            expected: 3,
            actual: 4,
        };
        assert!(conflict.is_retryable());

        let illegal = EngineError::from(TransitionError::Illegal {
            from: TicketStatus::Completed,
            to: TicketStatus::InProgress,
        });
        assert!(!illegal.is_retryable());
        assert_eq!(illegal.kind(), ErrorKind::IllegalTransition);
    }

    #[test]
    fn test_store_error_mapping() {
        let err = EngineError::from(StoreError::VersionConflict {
            ticket_id: "t-9".into(),
            expected: 1,
            actual: 2,
        });
        assert!(matches!(
            err,
            EngineError::ConcurrencyConflict { expected: 1, actual: 2, .. }
        ));

        let err = EngineError::from(StoreError::NotFound("t-404".into()));
        assert_eq!(err.kind(), ErrorKind::NotFound);
        assert_eq!(err.to_string(), "ticket not found: t-404");

        let err = EngineError::from(StoreError::Duplicate("t-1".into()));
        assert_eq!(err.kind(), ErrorKind::Duplicate);
        assert!(!err.is_retryable());
        assert_ne!(err.kind().suggested_action(), ErrorKind::NotFound.suggested_action());
    }

    #[test]
    fn test_already_completed_is_idempotent_success() {
        assert!(ErrorKind::AlreadyCompleted.is_idempotent_success());
        assert!(!ErrorKind::Validation.is_idempotent_success());
    }

    #[test]
    fn test_configuration_message_names_priority() {
        let err = ConfigurationError::MissingBudget {
            priority: Priority::Urgent,
        };
        assert_eq!(err.to_string(), "no SLA budget configured for priority URGENT");
    }

    #[test]
    fn test_kind_display() {
        assert_eq!(ErrorKind::ConcurrencyConflict.to_string(), "concurrency_conflict");
        assert_eq!(ErrorKind::IllegalTransition.to_string(), "illegal_transition");
    }
}
