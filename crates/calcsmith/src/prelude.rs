//! Prelude module - common imports for calcsmith users
//!
//! ```rust
//! use calcsmith::prelude::*;
//! ```

pub use crate::{
    // Definition types
    Calculator,
    DataSource,
    DisplayFormat,
    // Execution types
    Engine,
    // Errors
    Error,
    ErrorKind,
    ExecutionError,
    ExecutionOptions,
    ExecutionReport,
    Field,
    FieldKind,
    Formula,
    InputValue,
    InputValues,
    // Lookups
    LookupError,
    LookupProvider,
    NodeResult,
    Result,
    StaticLookup,
    Value,
};
