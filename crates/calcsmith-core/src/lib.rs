//! # calcsmith-core
//!
//! Core data structures for calcsmith calculators.
//!
//! This crate provides the types every other calcsmith crate builds on:
//! - [`Calculator`], [`Field`] and [`Formula`] - The user-authored definition
//! - [`Value`] and [`ErrorKind`] - What flows through an execution
//! - [`format`] - Rounding and display rendering of results
//!
//! ## Example
//!
//! ```rust
//! use calcsmith_core::{Calculator, DataSource, Field, Formula};
//!
//! let calc = Calculator::new("quote", "Machining quote")
//!     .with_field(Field::manual("hours").required())
//!     .with_field(Field::lookup("rate", DataSource::Mhr, "rate_per_hour"))
//!     .with_formula(Formula::new("cost", "{hours} * {rate}").primary());
//!
//! assert_eq!(calc.known_names().len(), 3);
//! assert_eq!(calc.primary_result().map(|f| f.name.as_str()), Some("cost"));
//! ```

pub mod error;
pub mod format;
pub mod model;
pub mod value;

pub use error::{Error, Result};
pub use format::FormatOptions;
pub use model::{Calculator, DataSource, DisplayFormat, Field, FieldKind, Formula};
pub use value::{ErrorCategory, ErrorKind, InputValue, Value};
