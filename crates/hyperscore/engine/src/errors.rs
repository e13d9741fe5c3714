//! Engine error types

use hyperscore_dsl::{DslError, RuntimeError};

/// Failure of a scorer. Never escapes [`crate::CompiledRule::apply`]; it is
/// logged there and the score becomes 0.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScoreError {
    #[error("Scoring body failed to compile: {0}")]
    Compile(#[from] DslError),

    #[error("Scoring body failed: {0}")]
    Invocation(#[from] RuntimeError),

    #[error("Scorer returned a non-finite value: {0}")]
    NonFinite(f64),
}

/// Result type alias for scorer invocations
pub type ScoreResult<T> = Result<T, ScoreError>;
