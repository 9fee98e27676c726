//! Formula evaluator
//!
//! Evaluates formula ASTs against the values computed so far.

use crate::ast::{BinaryOperator, FormulaExpr, UnaryOperator};
use crate::error::{EvalError, EvalResult};
use crate::functions::{registry, Implementation};
use ahash::AHashMap;
use calcsmith_core::Value;
use log::trace;
use std::cmp::Ordering;

/// Values by node name, filled in execution order
pub type Environment = AHashMap<String, Value>;

/// Context for formula evaluation
pub struct EvaluationContext<'a> {
    env: &'a Environment,
}

impl<'a> EvaluationContext<'a> {
    /// Create a new evaluation context
    pub fn new(env: &'a Environment) -> Self {
        Self { env }
    }

    /// Resolve a `{name}` reference
    ///
    /// A name that was never computed, or whose node failed, is an upstream
    /// error for the referencing formula.
    pub fn resolve(&self, name: &str) -> EvalResult<Value> {
        match self.env.get(name) {
            Some(Value::Error(_)) | None => Err(EvalError::Upstream(name.to_string())),
            Some(value) => Ok(value.clone()),
        }
    }
}

/// Numeric coercion shared by operators and functions
///
/// Text that parses as a finite number is accepted; anything else is a type
/// mismatch.
pub fn to_number(value: &Value) -> EvalResult<f64> {
    match value {
        Value::Number(n) => Ok(*n),
        Value::Text(s) => value
            .as_number()
            .ok_or_else(|| EvalError::TypeMismatch(format!("expected a number, got text \"{}\"", s))),
        Value::Error(kind) => Err(EvalError::TypeMismatch(format!(
            "expected a number, got error {}",
            kind
        ))),
    }
}

/// Condition truthiness: any non-zero number is true
pub fn truthy(value: &Value) -> EvalResult<bool> {
    Ok(to_number(value)? != 0.0)
}

fn finite(n: f64) -> EvalResult<Value> {
    if n.is_finite() {
        Ok(Value::Number(n))
    } else {
        Err(EvalError::NonFinite)
    }
}

/// Evaluate a formula expression
pub fn evaluate(expr: &FormulaExpr, ctx: &EvaluationContext) -> EvalResult<Value> {
    match expr {
        // === Literals ===
        FormulaExpr::Number(n) => Ok(Value::Number(*n)),
        FormulaExpr::String(s) => Ok(Value::Text(s.clone())),

        // === References ===
        FormulaExpr::FieldRef(name) => ctx.resolve(name),

        // === Operators ===
        FormulaExpr::BinaryOp { op, left, right } => evaluate_binary_op(*op, left, right, ctx),

        FormulaExpr::UnaryOp { op, operand } => evaluate_unary_op(*op, operand, ctx),

        // === Functions ===
        FormulaExpr::Function { name, args } => evaluate_function(name, args, ctx),
    }
}

/// Evaluate a binary operation
fn evaluate_binary_op(
    op: BinaryOperator,
    left: &FormulaExpr,
    right: &FormulaExpr,
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    // Evaluate operands first
    let left_val = evaluate(left, ctx)?;
    let right_val = evaluate(right, ctx)?;

    match op {
        // Arithmetic operators
        BinaryOperator::Add => finite(to_number(&left_val)? + to_number(&right_val)?),
        BinaryOperator::Subtract => finite(to_number(&left_val)? - to_number(&right_val)?),
        BinaryOperator::Multiply => finite(to_number(&left_val)? * to_number(&right_val)?),
        BinaryOperator::Divide => {
            let l = to_number(&left_val)?;
            let r = to_number(&right_val)?;
            if r == 0.0 {
                return Err(EvalError::DivisionByZero);
            }
            finite(l / r)
        }

        // Comparison operators
        BinaryOperator::Equal => Ok(Value::from(
            compare_values(&left_val, &right_val)? == Ordering::Equal,
        )),
        BinaryOperator::NotEqual => Ok(Value::from(
            compare_values(&left_val, &right_val)? != Ordering::Equal,
        )),
        BinaryOperator::LessThan => Ok(Value::from(
            compare_values(&left_val, &right_val)? == Ordering::Less,
        )),
        BinaryOperator::LessEqual => Ok(Value::from(
            compare_values(&left_val, &right_val)? != Ordering::Greater,
        )),
        BinaryOperator::GreaterThan => Ok(Value::from(
            compare_values(&left_val, &right_val)? == Ordering::Greater,
        )),
        BinaryOperator::GreaterEqual => Ok(Value::from(
            compare_values(&left_val, &right_val)? != Ordering::Less,
        )),
    }
}

/// Compare two values
///
/// Text compares lexically with text; a number compared with text only works
/// when the text is numeric.
fn compare_values(left: &Value, right: &Value) -> EvalResult<Ordering> {
    match (left, right) {
        (Value::Text(l), Value::Text(r)) => Ok(l.cmp(r)),
        _ => {
            let l = to_number(left)?;
            let r = to_number(right)?;
            l.partial_cmp(&r).ok_or(EvalError::NonFinite)
        }
    }
}

/// Evaluate a unary operation
fn evaluate_unary_op(
    op: UnaryOperator,
    operand: &FormulaExpr,
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    let val = evaluate(operand, ctx)?;

    match op {
        UnaryOperator::Negate => Ok(Value::Number(-to_number(&val)?)),
    }
}

/// Evaluate a function call
fn evaluate_function(
    name: &str,
    args: &[FormulaExpr],
    ctx: &EvaluationContext,
) -> EvalResult<Value> {
    let func = registry()
        .get(name)
        .ok_or_else(|| EvalError::InvalidArgument(format!("Unknown function: {}", name)))?;

    // Validation catches this first; never panic on a hand-built AST
    if !func.accepts(args.len()) {
        return Err(EvalError::InvalidArgument(format!(
            "{} takes {} arguments, got {}",
            func.name,
            func.arity(),
            args.len()
        )));
    }

    trace!("calling {} with {} arguments", func.name, args.len());

    let result = match func.implementation {
        Implementation::Lazy(f) => f(args, ctx)?,
        Implementation::Eager(f) => {
            let mut evaluated_args = Vec::with_capacity(args.len());
            for arg in args {
                evaluated_args.push(evaluate(arg, ctx)?);
            }
            f(&evaluated_args)?
        }
    };

    match result {
        Value::Number(n) => finite(n),
        other => Ok(other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use calcsmith_core::ErrorKind;

    fn eval_with(formula: &str, env: &Environment) -> EvalResult<Value> {
        let ast = parse_formula(formula).unwrap();
        evaluate(&ast, &EvaluationContext::new(env))
    }

    fn eval(formula: &str) -> EvalResult<Value> {
        eval_with(formula, &Environment::new())
    }

    fn env(pairs: &[(&str, Value)]) -> Environment {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn test_evaluate_literals() {
        assert_eq!(eval("42"), Ok(Value::Number(42.0)));
        assert_eq!(eval("\"Hello\""), Ok(Value::from("Hello")));
    }

    #[test]
    fn test_evaluate_arithmetic() {
        assert_eq!(eval("1+2"), Ok(Value::Number(3.0)));
        assert_eq!(eval("10-3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("4*5"), Ok(Value::Number(20.0)));
        assert_eq!(eval("20/4"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn test_evaluate_precedence() {
        assert_eq!(eval("1+2*3"), Ok(Value::Number(7.0)));
        assert_eq!(eval("(1+2)*3"), Ok(Value::Number(9.0)));
        assert_eq!(eval("2+3*4-5"), Ok(Value::Number(9.0)));
        assert_eq!(eval("-2*-3"), Ok(Value::Number(6.0)));
        assert_eq!(eval("--5"), Ok(Value::Number(5.0)));
    }

    #[test]
    fn test_evaluate_comparison() {
        assert_eq!(eval("1<2"), Ok(Value::Number(1.0)));
        assert_eq!(eval("1>2"), Ok(Value::Number(0.0)));
        assert_eq!(eval("5==5"), Ok(Value::Number(1.0)));
        assert_eq!(eval("5!=5"), Ok(Value::Number(0.0)));
        assert_eq!(eval("3>=3"), Ok(Value::Number(1.0)));
        assert_eq!(eval("\"abc\" < \"abd\""), Ok(Value::Number(1.0)));
        assert_eq!(eval("\"10\" == 10"), Ok(Value::Number(1.0)));
        assert!(matches!(
            eval("\"steel\" > 1"),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_division_by_zero() {
        let env = env(&[("a", Value::Number(0.0))]);
        assert_eq!(eval_with("1/{a}", &env), Err(EvalError::DivisionByZero));
    }

    #[test]
    fn test_references() {
        let env = env(&[("a", Value::Number(2.0)), ("b", Value::from("3"))]);
        assert_eq!(eval_with("SUM({a}, {b})", &env), Ok(Value::Number(5.0)));
        assert_eq!(eval_with("{a} * {b}", &env), Ok(Value::Number(6.0)));
    }

    #[test]
    fn test_failed_reference_is_upstream_error() {
        let env = env(&[("a", Value::Error(ErrorKind::DivisionByZero))]);
        assert_eq!(
            eval_with("{a} + 1", &env),
            Err(EvalError::Upstream("a".into()))
        );
        assert_eq!(
            eval_with("{missing} + 1", &env),
            Err(EvalError::Upstream("missing".into()))
        );
    }

    #[test]
    fn test_text_in_arithmetic() {
        let env = env(&[("grade", Value::from("steel"))]);
        assert!(matches!(
            eval_with("{grade} * 2", &env),
            Err(EvalError::TypeMismatch(_))
        ));
    }

    #[test]
    fn test_if_skips_untaken_branch() {
        let env = env(&[("a", Value::Number(0.0))]);
        assert_eq!(
            eval_with("IF({a}==0, 0, 10/{a})", &env),
            Ok(Value::Number(0.0))
        );
    }

    #[test]
    fn test_non_finite_result() {
        assert_eq!(eval("1e300 * 1e300"), Err(EvalError::NonFinite));
    }

    #[test]
    fn test_arity_rechecked() {
        let ast = FormulaExpr::Function {
            name: "SQRT".into(),
            args: vec![],
        };
        let env = Environment::new();
        assert!(matches!(
            evaluate(&ast, &EvaluationContext::new(&env)),
            Err(EvalError::InvalidArgument(_))
        ));
    }
}
