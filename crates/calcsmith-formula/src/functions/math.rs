//! Math functions

use crate::error::{EvalError, EvalResult};
use crate::evaluator::to_number;
use calcsmith_core::format::round_half_away;
use calcsmith_core::Value;

fn number_arg(args: &[Value], index: usize, function: &str) -> EvalResult<f64> {
    let value = args.get(index).ok_or_else(|| {
        EvalError::InvalidArgument(format!("{} is missing argument {}", function, index + 1))
    })?;
    to_number(value)
}

/// ROUND(number, places) - half away from zero
pub fn fn_round(args: &[Value]) -> EvalResult<Value> {
    let number = number_arg(args, 0, "ROUND")?;
    let places = number_arg(args, 1, "ROUND")?;

    if places < 0.0 || places.fract() != 0.0 {
        return Err(EvalError::InvalidArgument(format!(
            "ROUND places must be a non-negative integer, got {}",
            places
        )));
    }

    let places = if places > u32::MAX as f64 {
        u32::MAX
    } else {
        places as u32
    };
    Ok(Value::Number(round_half_away(number, places)))
}

/// ABS(number)
pub fn fn_abs(args: &[Value]) -> EvalResult<Value> {
    Ok(Value::Number(number_arg(args, 0, "ABS")?.abs()))
}

/// SQRT(number)
pub fn fn_sqrt(args: &[Value]) -> EvalResult<Value> {
    let n = number_arg(args, 0, "SQRT")?;
    if n < 0.0 {
        return Err(EvalError::NegativeSqrt(n));
    }
    Ok(Value::Number(n.sqrt()))
}

/// POW(base, exponent)
pub fn fn_pow(args: &[Value]) -> EvalResult<Value> {
    let base = number_arg(args, 0, "POW")?;
    let exponent = number_arg(args, 1, "POW")?;
    let result = base.powf(exponent);
    if !result.is_finite() {
        return Err(EvalError::NonFinite);
    }
    Ok(Value::Number(result))
}
