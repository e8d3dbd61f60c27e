//! Error types for rote operations.
//!
//! This module provides the error hierarchy with structured error codes.
//! The taxonomy distinguishes caller bugs (`Conflict`), benign duplicates
//! (`AlreadyAnswered`), and transient collaborator failures
//! (`Generation`/`Grading`) so callers can apply the right recovery policy.

use thiserror::Error;
use uuid::Uuid;

/// Result type alias for rote operations.
pub type RoteResult<T> = Result<T, RoteError>;

/// Main error type for all rote operations.
#[derive(Error, Debug)]
pub enum RoteError {
    /// A pending task already exists for the learner. Caller error: the
    /// scheduler must check before issuing.
    #[error("Conflict: {message}")]
    Conflict {
        message: String,
        code: ErrorCode,
        learner_id: Option<Uuid>,
    },

    /// Referenced entity does not exist.
    #[error("Not found: {message}")]
    NotFound {
        message: String,
        code: ErrorCode,
        entity_id: Option<Uuid>,
    },

    /// Duplicate answer submission. Benign toward the learner, but the
    /// stored outcome is never changed.
    #[error("Task already answered: {task_id}")]
    AlreadyAnswered { task_id: Uuid, code: ErrorCode },

    /// Question generation failed (external generator). Transient;
    /// recoverable by retrying on the next tick.
    #[error("Generation error: {message}")]
    Generation {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Answer classification failed (external classifier). Transient; the
    /// task remains pending so grading can be retried.
    #[error("Grading error: {message}")]
    Grading {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// Database operation failed.
    #[error("Database error: {message}")]
    Database {
        message: String,
        code: ErrorCode,
        #[source]
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// Parse error.
    #[error("Parse error: {message}")]
    Parse { message: String, code: ErrorCode },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Internal error.
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Error codes for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCode {
    // Task lifecycle (TASK_xxx)
    TaskPendingExists,
    TaskNotFound,
    TaskAlreadyAnswered,

    // Entities (ENT_xxx)
    LearnerNotFound,
    ItemNotFound,
    ProgressNotFound,

    // Generation (GEN_xxx)
    GenCallFailed,
    GenTimeout,
    GenInvalidResponse,

    // Grading (GRD_xxx)
    GrdCallFailed,
    GrdTimeout,
    GrdInvalidResponse,

    // Database (DB_xxx)
    DbConnectionFailed,
    DbOperationFailed,

    // Parse (PARSE_xxx)
    ParseInvalidJson,
    ParseMissingField,

    // Internal
    Internal,
}

impl ErrorCode {
    /// Get the string representation of the error code.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCode::TaskPendingExists => "TASK_001",
            ErrorCode::TaskNotFound => "TASK_002",
            ErrorCode::TaskAlreadyAnswered => "TASK_003",
            ErrorCode::LearnerNotFound => "ENT_001",
            ErrorCode::ItemNotFound => "ENT_002",
            ErrorCode::ProgressNotFound => "ENT_003",
            ErrorCode::GenCallFailed => "GEN_001",
            ErrorCode::GenTimeout => "GEN_002",
            ErrorCode::GenInvalidResponse => "GEN_003",
            ErrorCode::GrdCallFailed => "GRD_001",
            ErrorCode::GrdTimeout => "GRD_002",
            ErrorCode::GrdInvalidResponse => "GRD_003",
            ErrorCode::DbConnectionFailed => "DB_001",
            ErrorCode::DbOperationFailed => "DB_002",
            ErrorCode::ParseInvalidJson => "PARSE_001",
            ErrorCode::ParseMissingField => "PARSE_002",
            ErrorCode::Internal => "INT_001",
        }
    }
}

impl RoteError {
    /// Create a conflict error for an existing pending task.
    pub fn conflict(learner_id: Uuid) -> Self {
        Self::Conflict {
            message: format!("learner '{}' already has a pending task", learner_id),
            code: ErrorCode::TaskPendingExists,
            learner_id: Some(learner_id),
        }
    }

    /// Create a not-found error for a task.
    pub fn task_not_found(task_id: Uuid) -> Self {
        Self::NotFound {
            message: format!("task '{}' not found", task_id),
            code: ErrorCode::TaskNotFound,
            entity_id: Some(task_id),
        }
    }

    /// Create a not-found error for a learner.
    pub fn learner_not_found(learner_id: Uuid) -> Self {
        Self::NotFound {
            message: format!("learner '{}' not found", learner_id),
            code: ErrorCode::LearnerNotFound,
            entity_id: Some(learner_id),
        }
    }

    /// Create a not-found error for an item.
    pub fn item_not_found(item_id: Uuid) -> Self {
        Self::NotFound {
            message: format!("item '{}' not found", item_id),
            code: ErrorCode::ItemNotFound,
            entity_id: Some(item_id),
        }
    }

    /// Create an already-answered error.
    pub fn already_answered(task_id: Uuid) -> Self {
        Self::AlreadyAnswered {
            task_id,
            code: ErrorCode::TaskAlreadyAnswered,
        }
    }

    /// Create a generation error.
    pub fn generation(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            code: ErrorCode::GenCallFailed,
            source: None,
        }
    }

    /// Create a generation timeout error.
    pub fn generation_timeout(message: impl Into<String>) -> Self {
        Self::Generation {
            message: message.into(),
            code: ErrorCode::GenTimeout,
            source: None,
        }
    }

    /// Create a grading error.
    pub fn grading(message: impl Into<String>) -> Self {
        Self::Grading {
            message: message.into(),
            code: ErrorCode::GrdCallFailed,
            source: None,
        }
    }

    /// Create a grading timeout error.
    pub fn grading_timeout(message: impl Into<String>) -> Self {
        Self::Grading {
            message: message.into(),
            code: ErrorCode::GrdTimeout,
            source: None,
        }
    }

    /// Create a parse error.
    pub fn parse(message: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            code: ErrorCode::ParseInvalidJson,
        }
    }

    /// Create a database error.
    pub fn database(message: impl Into<String>) -> Self {
        Self::Database {
            message: message.into(),
            code: ErrorCode::DbOperationFailed,
            source: None,
        }
    }

    /// Create an internal error.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }

    /// Get the error code.
    pub fn code(&self) -> ErrorCode {
        match self {
            Self::Conflict { code, .. } => *code,
            Self::NotFound { code, .. } => *code,
            Self::AlreadyAnswered { code, .. } => *code,
            Self::Generation { code, .. } => *code,
            Self::Grading { code, .. } => *code,
            Self::Database { code, .. } => *code,
            Self::Parse { code, .. } => *code,
            _ => ErrorCode::Internal,
        }
    }

    /// Whether the failure is transient and worth retrying (next tick for
    /// generation, next submission for grading).
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Generation { .. } | Self::Grading { .. })
    }
}

impl From<rusqlite::Error> for RoteError {
    fn from(err: rusqlite::Error) -> Self {
        Self::Database {
            message: err.to_string(),
            code: ErrorCode::DbOperationFailed,
            source: Some(Box::new(err)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_conflict_error() {
        let id = Uuid::new_v4();
        let err = RoteError::conflict(id);
        assert_eq!(err.code(), ErrorCode::TaskPendingExists);
        assert!(err.to_string().contains(&id.to_string()));
        assert!(!err.is_transient());
    }

    #[test]
    fn test_transient_errors() {
        assert!(RoteError::generation("provider down").is_transient());
        assert!(RoteError::grading("provider down").is_transient());
        assert!(!RoteError::already_answered(Uuid::new_v4()).is_transient());
    }

    #[test]
    fn test_error_code_as_str() {
        assert_eq!(ErrorCode::TaskPendingExists.as_str(), "TASK_001");
        assert_eq!(ErrorCode::GenTimeout.as_str(), "GEN_002");
    }
}
