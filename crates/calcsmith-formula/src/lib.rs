//! # calcsmith-formula
//!
//! Formula language for calcsmith calculators.
//!
//! This crate provides:
//! - Formula parsing (text → AST) and canonical printing (AST → text)
//! - The built-in function library (SUM, AVG, MIN, MAX, ROUND, ABS, SQRT, POW, IF)
//! - Expression and calculator validation, plus editor autocomplete
//! - Dependency resolution with cycle detection and deterministic ordering
//! - Expression evaluation against computed values
//!
//! ## Example
//!
//! ```rust
//! use calcsmith_core::Value;
//! use calcsmith_formula::{evaluate, parse_formula, Environment, EvaluationContext};
//!
//! let ast = parse_formula("SUM({a}, {b})").unwrap();
//!
//! let mut env = Environment::new();
//! env.insert("a".to_string(), Value::Number(2.0));
//! env.insert("b".to_string(), Value::Number(3.0));
//!
//! let result = evaluate(&ast, &EvaluationContext::new(&env)).unwrap();
//! assert_eq!(result, Value::Number(5.0));
//! ```

pub mod ast;
pub mod dependency;
pub mod error;
pub mod evaluator;
pub mod functions;
pub mod parser;
pub mod suggest;
pub mod validator;

pub use ast::{BinaryOperator, FormulaExpr, UnaryOperator};
pub use dependency::{resolve, resolve_with, DependencyGraph, Resolution};
pub use error::{EvalError, EvalResult, FormulaError, FormulaResult};
pub use evaluator::{evaluate, Environment, EvaluationContext};
pub use functions::{registry, FunctionCategory, FunctionDef, FunctionRegistry};
pub use parser::{parse_formula, parse_with_sites, CallSite, ParsedFormula, ReferenceSite};
pub use suggest::{suggest, Suggestion, SuggestionKind};
pub use validator::{
    annotate_dependencies, validate, validate_calculator, CalculatorReport, Diagnostic,
    DiagnosticKind, NodeReport, ValidationReport, Validator, Warning, WarningKind,
};
