//! Value types shared by inputs, lookups and formula results

use std::fmt;

/// A value flowing through a calculator run
///
/// Comparisons produce `Number(1.0)` for true and `Number(0.0)` for false, so
/// every consumer only has to handle these three shapes.
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum Value {
    /// Numeric value
    Number(f64),
    /// Text value
    Text(String),
    /// Failed node; carries the reason so dependants can report it
    Error(ErrorKind),
}

impl Value {
    /// Numeric view of the value
    ///
    /// Text that parses as a finite number (after trimming) is accepted, so
    /// `"12.5"` typed into a form behaves like `12.5`.
    pub fn as_number(&self) -> Option<f64> {
        match self {
            Value::Number(n) => Some(*n),
            Value::Text(s) => s.trim().parse::<f64>().ok().filter(|n| n.is_finite()),
            Value::Error(_) => None,
        }
    }

    /// Text view of the value, if it is text
    pub fn as_text(&self) -> Option<&str> {
        match self {
            Value::Text(s) => Some(s),
            _ => None,
        }
    }

    /// Check if this is an error
    pub fn is_error(&self) -> bool {
        matches!(self, Value::Error(_))
    }

    /// Get the error if this is one
    pub fn error_kind(&self) -> Option<ErrorKind> {
        match self {
            Value::Error(kind) => Some(*kind),
            _ => None,
        }
    }

    /// Name of the variant, for diagnostics
    pub fn type_name(&self) -> &'static str {
        match self {
            Value::Number(_) => "number",
            Value::Text(_) => "text",
            Value::Error(_) => "error",
        }
    }
}

impl fmt::Display for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Value::Number(n) => {
                // No trailing ".0" on whole numbers
                if n.fract() == 0.0 && n.abs() < 1e15 {
                    write!(f, "{}", *n as i64)
                } else {
                    write!(f, "{}", n)
                }
            }
            Value::Text(s) => f.write_str(s),
            Value::Error(kind) => f.write_str(kind.code()),
        }
    }
}

impl From<f64> for Value {
    fn from(n: f64) -> Self {
        Value::Number(n)
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Value::Number(if b { 1.0 } else { 0.0 })
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<String> for Value {
    fn from(s: String) -> Self {
        Value::Text(s)
    }
}

impl From<ErrorKind> for Value {
    fn from(kind: ErrorKind) -> Self {
        Value::Error(kind)
    }
}

impl From<InputValue> for Value {
    fn from(value: InputValue) -> Self {
        match value {
            InputValue::Number(n) => Value::Number(n),
            InputValue::Text(s) => Value::Text(s),
        }
    }
}

/// A caller-supplied value: what a form field or a default can hold
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(untagged))]
pub enum InputValue {
    Number(f64),
    Text(String),
}

impl InputValue {
    /// Render as a record identifier for lookups
    pub fn as_record_id(&self) -> String {
        Value::from(self.clone()).to_string()
    }
}

impl From<f64> for InputValue {
    fn from(n: f64) -> Self {
        InputValue::Number(n)
    }
}

impl From<&str> for InputValue {
    fn from(s: &str) -> Self {
        InputValue::Text(s.to_string())
    }
}

impl From<String> for InputValue {
    fn from(s: String) -> Self {
        InputValue::Text(s)
    }
}

/// Why a node failed at execution time
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ErrorKind {
    /// Division by zero
    DivisionByZero,
    /// SQRT of a negative number
    NegativeSqrt,
    /// Operand of the wrong type (e.g. text compared to a number)
    TypeMismatch,
    /// Function argument outside its contract
    InvalidArgument,
    /// Result is NaN or infinite
    NonFiniteResult,
    /// Required input was not supplied
    MissingInput,
    /// Calculated field has no expression
    MissingExpression,
    /// External lookup failed or found nothing
    LookupFailed,
    /// A dependency of this node failed
    UpstreamError,
}

impl ErrorKind {
    /// Short display code, rendered in place of a value
    pub fn code(&self) -> &'static str {
        match self {
            ErrorKind::DivisionByZero => "#DIV/0!",
            ErrorKind::NegativeSqrt => "#NUM!",
            ErrorKind::TypeMismatch => "#VALUE!",
            ErrorKind::InvalidArgument => "#ARG!",
            ErrorKind::NonFiniteResult => "#NUM!",
            ErrorKind::MissingInput => "#INPUT!",
            ErrorKind::MissingExpression => "#EMPTY!",
            ErrorKind::LookupFailed => "#N/A",
            ErrorKind::UpstreamError => "#DEP!",
        }
    }

    /// Taxonomy bucket the error belongs to
    pub fn category(&self) -> ErrorCategory {
        match self {
            ErrorKind::MissingInput => ErrorCategory::Input,
            ErrorKind::LookupFailed => ErrorCategory::Lookup,
            ErrorKind::DivisionByZero
            | ErrorKind::NegativeSqrt
            | ErrorKind::TypeMismatch
            | ErrorKind::InvalidArgument
            | ErrorKind::NonFiniteResult
            | ErrorKind::MissingExpression
            | ErrorKind::UpstreamError => ErrorCategory::Evaluation,
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

/// Execution-time error categories
///
/// None of these block saving a calculator; they are reported per node next
/// to the results that did compute.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum ErrorCategory {
    /// Required input missing
    Input,
    /// External data source failure
    Lookup,
    /// Arithmetic, type or function failure
    Evaluation,
}
