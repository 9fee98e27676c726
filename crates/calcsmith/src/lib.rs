//! # calcsmith
//!
//! Validate, order and execute user-authored calculators.
//!
//! A calculator is a set of named input fields (typed in, looked up from an
//! external data source, or calculated) plus named formulas over them. This
//! crate ties the pieces together:
//!
//! - [`Engine`] - Plans and executes calculators, caching plans per definition
//! - [`LookupProvider`] - Where `DatabaseLookup` fields get their values
//! - [`api`] - Request/response shapes for hosting the engine in a service
//!
//! Parsing, validation, autocomplete and dependency resolution live in
//! [`calcsmith_formula`] and are re-exported here.
//!
//! ## Example
//!
//! ```rust
//! use calcsmith::prelude::*;
//!
//! let calc = Calculator::new("quote", "Machining quote")
//!     .with_field(Field::manual("hours").required())
//!     // Looks up record "M-1" unless the caller picks another one
//!     .with_field(Field::lookup("rate", DataSource::Mhr, "rate_per_hour").with_default("M-1"))
//!     .with_formula(
//!         Formula::new("cost", "{hours} * {rate}")
//!             .with_format(DisplayFormat::Currency)
//!             .primary(),
//!     );
//!
//! let lookup = StaticLookup::new().with(DataSource::Mhr, "M-1", "rate_per_hour", 85.0);
//! let mut inputs = InputValues::new();
//! inputs.insert("hours".into(), InputValue::Number(12.5));
//!
//! let engine = Engine::default();
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let report = runtime.block_on(engine.execute(&calc, &inputs, &lookup)).unwrap();
//!
//! assert!(report.success);
//! assert_eq!(report.results["cost"].formatted, "$1,062.50");
//! ```

pub mod api;
pub mod execution;
pub mod lookup;
pub mod prelude;

pub use execution::{
    Engine, ExecutionError, ExecutionOptions, ExecutionPlan, ExecutionReport, InputValues,
    NodeError, NodeResult,
};
pub use lookup::{LookupError, LookupProvider, StaticLookup};

// Re-export core types
pub use calcsmith_core::{
    format, Calculator, DataSource, DisplayFormat, Error, ErrorCategory, ErrorKind, Field,
    FieldKind, FormatOptions, Formula, InputValue, Result, Value,
};

// Re-export formula types
pub use calcsmith_formula::{
    annotate_dependencies, parse_formula, registry, resolve, suggest, validate,
    validate_calculator, CalculatorReport, Diagnostic, DiagnosticKind, FormulaError, FormulaExpr,
    Resolution, Suggestion, SuggestionKind, ValidationReport, Warning, WarningKind,
};
