//! Formula error types

use calcsmith_core::ErrorKind;
use thiserror::Error;

/// Result type for authoring-time formula operations
pub type FormulaResult<T> = std::result::Result<T, FormulaError>;

/// Result type for evaluation
pub type EvalResult<T> = std::result::Result<T, EvalError>;

/// Errors found while parsing or validating a formula
///
/// Every variant blocks saving the calculator.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum FormulaError {
    /// Formula text does not follow the grammar
    #[error("Syntax error at position {position}: {message}")]
    Syntax { message: String, position: usize },

    /// `{name}` does not resolve to a field or formula
    #[error("Unknown reference '{0}'")]
    UnknownReference(String),

    /// Unknown function
    #[error("Unknown function: {0}")]
    UnknownFunction(String),

    /// Wrong number of arguments
    #[error("Wrong number of arguments for {function}: expected {expected}, got {actual}")]
    ArgumentCount {
        function: String,
        expected: String,
        actual: usize,
    },

    /// Literal argument outside the function's contract
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// Reference cycle, as the path that closes it
    #[error("Circular reference: {}", .0.join(" -> "))]
    CircularReference(Vec<String>),
}

impl FormulaError {
    /// Create a syntax error at a char offset
    pub fn syntax(message: impl Into<String>, position: usize) -> Self {
        FormulaError::Syntax {
            message: message.into(),
            position,
        }
    }

    /// Char offset of the error, when it has one
    pub fn position(&self) -> Option<usize> {
        match self {
            FormulaError::Syntax { position, .. } => Some(*position),
            _ => None,
        }
    }
}

/// Errors raised while evaluating a parsed formula
#[derive(Debug, Error, Clone, PartialEq)]
pub enum EvalError {
    #[error("Division by zero")]
    DivisionByZero,

    #[error("Square root of negative number {0}")]
    NegativeSqrt(f64),

    #[error("Type mismatch: {0}")]
    TypeMismatch(String),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Result is not a finite number")]
    NonFinite,

    /// A referenced node failed or was never computed
    #[error("Dependency '{0}' has no value")]
    Upstream(String),
}

impl EvalError {
    /// Runtime error kind stored on the failing node
    pub fn kind(&self) -> ErrorKind {
        match self {
            EvalError::DivisionByZero => ErrorKind::DivisionByZero,
            EvalError::NegativeSqrt(_) => ErrorKind::NegativeSqrt,
            EvalError::TypeMismatch(_) => ErrorKind::TypeMismatch,
            EvalError::InvalidArgument(_) => ErrorKind::InvalidArgument,
            EvalError::NonFinite => ErrorKind::NonFiniteResult,
            EvalError::Upstream(_) => ErrorKind::UpstreamError,
        }
    }
}
