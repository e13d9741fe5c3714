//! Error types for the model layer

/// Validation failures raised before a request reaches the engine
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ModelError {
    #[error("Missing required field: {0}")]
    MissingField(&'static str),

    #[error("Invalid value for '{field}': {message}")]
    InvalidValue {
        field: &'static str,
        message: String,
    },
}

impl ModelError {
    pub(crate) fn non_finite(field: &'static str, value: f64) -> Self {
        Self::InvalidValue {
            field,
            message: format!("{} is not a finite number", value),
        }
    }
}

/// Result type alias for model validation
pub type ModelResult<T> = Result<T, ModelError>;

pub(crate) fn require_text(field: &'static str, value: &str) -> ModelResult<()> {
    if value.trim().is_empty() {
        Err(ModelError::MissingField(field))
    } else {
        Ok(())
    }
}

pub(crate) fn require_finite(field: &'static str, value: f64) -> ModelResult<()> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(ModelError::non_finite(field, value))
    }
}
