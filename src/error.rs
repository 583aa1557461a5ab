//! Brigade error types

use thiserror::Error;

/// Errors that can occur in the brigade system
#[derive(Debug, Error)]
pub enum BrigadeError {
    /// Invalid team or agent configuration, detected at construction
    #[error("Configuration error: {0}")]
    Config(String),

    /// Query was empty or blank
    #[error("Empty query")]
    EmptyQuery,

    /// Tool binding does not resolve against the registry
    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    /// Referenced member does not exist in the team roster
    #[error("Member not found: {0}")]
    MemberNotFound(String),

    /// Completion service failure
    #[error("Model error: {0}")]
    Model(String),

    /// Embedding service failure
    #[error("Embedding error: {0}")]
    Embedding(String),

    /// Tool invocation failure
    #[error("Tool error: {0}")]
    Tool(String),

    /// Vector store read/write failure
    #[error("Vector store error: {0}")]
    Store(String),

    /// Knowledge ingestion failure, fatal to the ingestion run
    #[error("Ingestion error: {0}")]
    Ingestion(String),

    /// Response failed its declared output schema; retryable
    #[error("Schema validation failed: {0}")]
    SchemaValidation(String),

    /// A member agent failed during a team run
    #[error("Member '{member}' failed: {reason}")]
    MemberFailed { member: String, reason: String },

    /// A member agent exceeded the configured timeout
    #[error("Member '{member}' timed out")]
    MemberTimeout { member: String },

    /// Container runtime or database-level failure, surfaced unmasked
    #[error("Infrastructure error: {0}")]
    Infrastructure(String),

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization error
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl BrigadeError {
    /// Whether the caller may retry the operation that produced this error.
    ///
    /// Only schema-validation failures are retryable; a fresh model response
    /// may satisfy the schema. Configuration and infrastructure errors are
    /// permanent until the deployment changes.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::SchemaValidation(_))
    }
}

pub type Result<T> = std::result::Result<T, BrigadeError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_failures_are_retryable() {
        let err = BrigadeError::SchemaValidation("missing field `date`".into());
        assert!(err.is_retryable());
    }

    #[test]
    fn config_failures_are_not_retryable() {
        let err = BrigadeError::Config("no members".into());
        assert!(!err.is_retryable());
        let err = BrigadeError::Infrastructure("name collision".into());
        assert!(!err.is_retryable());
    }
}
