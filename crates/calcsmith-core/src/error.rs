//! Error types for calcsmith-core

use thiserror::Error;

/// Result type alias using [`Error`]
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while building or inspecting a calculator definition
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// Name does not match `[A-Za-z_][A-Za-z0-9_]*`
    #[error("Invalid name '{0}': names must start with a letter or '_' and contain only letters, digits and '_'")]
    InvalidName(String),

    /// Two fields/formulas share a name
    #[error("Name already defined in this calculator: {0}")]
    DuplicateName(String),

    /// Lookup field is missing its data source or source field
    #[error("Lookup field '{0}' must declare both a data source and a source field")]
    IncompleteLookup(String),

    /// Unknown data source identifier
    #[error("Unknown data source: {0}")]
    UnknownDataSource(String),

    /// Generic error with message
    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Create a new "other" error with a message
    pub fn other<S: Into<String>>(msg: S) -> Self {
        Error::Other(msg.into())
    }
}
