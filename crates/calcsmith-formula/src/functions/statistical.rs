//! Statistical functions

use crate::error::{EvalError, EvalResult};
use crate::evaluator::to_number;
use calcsmith_core::Value;

fn numbers(args: &[Value]) -> EvalResult<Vec<f64>> {
    args.iter().map(to_number).collect()
}

/// SUM(value1, ...)
pub fn fn_sum(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(numbers(args)?.iter().sum()))
}

/// AVG(value1, ...)
pub fn fn_avg(args: &[Value]) -> EvalResult<Value> {
    let values = numbers(args)?;
    if values.is_empty() {
        return Err(EvalError::InvalidArgument(
            "AVG needs at least one value".into(),
        ));
    }
    Ok(Value::Number(values.iter().sum::<f64>() / values.len() as f64))
}

/// Arguments of MIN/MAX, all finite
fn extremes_input(args: &[Value], name: &str) -> EvalResult<Vec<f64>> {
    let values = numbers(args)?;
    if values.is_empty() {
        return Err(EvalError::InvalidArgument(format!(
            "{} needs at least one value",
            name
        )));
    }
    if values.iter().any(|n| !n.is_finite()) {
        return Err(EvalError::NonFinite);
    }
    Ok(values)
}

/// MIN(value1, ...)
pub fn fn_min(args: &[Value]) -> EvalResult<Value> {
    let values = extremes_input(args, "MIN")?;
    Ok(Value::Number(values.into_iter().fold(f64::INFINITY, f64::min)))
}

/// MAX(value1, ...)
pub fn fn_max(args: &[Value]) -> EvalResult<Value> {
    let values = extremes_input(args, "MAX")?;
    Ok(Value::Number(values.into_iter().fold(f64::NEG_INFINITY, f64::max)))
}
