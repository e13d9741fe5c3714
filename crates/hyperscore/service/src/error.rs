//! Error types for the service facade

use hyperscore_storage::StorageError;
use hyperscore_types::ModelError;
use thiserror::Error;

/// Result type alias for service operations
pub type ServiceResult<T> = Result<T, ServiceError>;

/// Service-level errors
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The named record does not exist
    #[error("{kind} not found: {id}")]
    NotFound { kind: &'static str, id: String },

    /// Request rejected before it reached the engine
    #[error("Validation error: {0}")]
    Validation(#[from] ModelError),

    /// Uniqueness violation
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Store unavailable, timed out or failed
    #[error("Storage error: {0}")]
    Storage(StorageError),

    /// Bundled seed data could not be read
    #[error("Seed data error: {0}")]
    Seed(String),
}

impl ServiceError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound { .. })
    }

    /// Infrastructure failures that may clear on retry
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Storage(e) if e.is_retryable())
    }
}

impl From<StorageError> for ServiceError {
    fn from(err: StorageError) -> Self {
        match err {
            StorageError::Conflict(message) => Self::Conflict(message),
            StorageError::InvalidInput(message) => Self::Validation(ModelError::InvalidValue {
                field: "record",
                message,
            }),
            other => Self::Storage(other),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_storage_error_mapping() {
        let err: ServiceError = StorageError::Conflict("element A1 already exists".into()).into();
        assert!(matches!(err, ServiceError::Conflict(_)));

        let err: ServiceError = StorageError::Timeout {
            operation: "find_rules",
            after: Duration::from_millis(10),
        }
        .into();
        assert!(err.is_retryable());
        assert!(!err.is_not_found());
    }

    #[test]
    fn test_not_found_names_the_id() {
        let err = ServiceError::not_found("scheme", "eco");
        assert!(err.is_not_found());
        assert_eq!(err.to_string(), "scheme not found: eco");
    }
}
