//! DSL error types

/// Errors raised while compiling a scoring body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DslError {
    #[error("Parse error at line {line}, column {col}: {message}")]
    ParseError {
        line: usize,
        col: usize,
        message: String,
    },

    #[error("Unexpected token at line {line}, column {col}: expected {expected}, found '{found}'")]
    UnexpectedToken {
        expected: String,
        found: String,
        line: usize,
        col: usize,
    },

    #[error("Unexpected end of input at line {line}: expected {expected}")]
    UnexpectedEof { expected: String, line: usize },

    #[error("Indentation error at line {line}: {message}")]
    IndentationError { line: usize, message: String },

    #[error("Unknown function '{name}' at line {line}, column {col}")]
    UnknownFunction { name: String, line: usize, col: usize },

    #[error("Unknown method '{name}' at line {line}, column {col}")]
    UnknownMethod { name: String, line: usize, col: usize },

    #[error("Nesting deeper than {limit} levels at line {line}, column {col}")]
    TooDeeplyNested { limit: usize, line: usize, col: usize },
}

impl DslError {
    /// Source position of the error, when it has a column
    pub fn position(&self) -> (usize, Option<usize>) {
        match self {
            Self::ParseError { line, col, .. }
            | Self::UnexpectedToken { line, col, .. }
            | Self::UnknownFunction { line, col, .. }
            | Self::UnknownMethod { line, col, .. }
            | Self::TooDeeplyNested { line, col, .. } => (*line, Some(*col)),
            Self::UnexpectedEof { line, .. } | Self::IndentationError { line, .. } => {
                (*line, None)
            }
        }
    }
}

/// Result type alias for DSL compilation
pub type DslResult<T> = Result<T, DslError>;

/// Errors raised while running a compiled body
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum RuntimeError {
    #[error("KeyError: {0}")]
    KeyError(String),

    #[error("TypeError: {0}")]
    TypeError(String),

    #[error("ValueError: {0}")]
    ValueError(String),

    #[error("ZeroDivisionError: {0}")]
    ZeroDivision(&'static str),

    #[error("NameError: name '{0}' is not defined")]
    NameError(String),

    #[error("IndexError: {0}")]
    IndexError(String),

    #[error("scoring body finished without returning a value")]
    NoResult,

    #[error("scoring body returned {0}, expected a number")]
    NonNumericResult(String),
}
