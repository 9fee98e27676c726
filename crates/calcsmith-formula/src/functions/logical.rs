//! Logical functions

use crate::ast::FormulaExpr;
use crate::error::{EvalError, EvalResult};
use crate::evaluator::{evaluate, truthy, EvaluationContext};
use calcsmith_core::Value;

/// IF(condition, when_true, when_false)
///
/// Only the selected branch is evaluated, so `IF({a} == 0, 0, 10 / {a})`
/// never divides by zero.
pub fn fn_if(args: &[FormulaExpr], ctx: &EvaluationContext) -> EvalResult<Value> {
    let [condition, when_true, when_false] = args else {
        return Err(EvalError::InvalidArgument(format!(
            "IF takes exactly 3 arguments, got {}",
            args.len()
        )));
    };

    let condition = evaluate(condition, ctx)?;
    if truthy(&condition)? {
        evaluate(when_true, ctx)
    } else {
        evaluate(when_false, ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_formula;
    use ahash::AHashMap;

    fn call_if(formula: &str, env: &AHashMap<String, Value>) -> EvalResult<Value> {
        match parse_formula(formula).unwrap() {
            FormulaExpr::Function { args, .. } => fn_if(&args, &EvaluationContext::new(env)),
            other => panic!("expected IF call, got {:?}", other),
        }
    }

    #[test]
    fn test_if_short_circuits() {
        let mut env = AHashMap::new();
        env.insert("a".to_string(), Value::Number(0.0));
        assert_eq!(call_if("IF({a} == 0, 0, 10 / {a})", &env), Ok(Value::Number(0.0)));

        env.insert("a".to_string(), Value::Number(4.0));
        assert_eq!(call_if("IF({a} == 0, 0, 10 / {a})", &env), Ok(Value::Number(2.5)));
    }

    #[test]
    fn test_if_numeric_truthiness() {
        let env = AHashMap::new();
        assert_eq!(call_if("IF(2, \"yes\", \"no\")", &env), Ok(Value::from("yes")));
        assert_eq!(call_if("IF(0, \"yes\", \"no\")", &env), Ok(Value::from("no")));
    }

    #[test]
    fn test_if_wrong_arity() {
        let env = AHashMap::new();
        assert!(matches!(
            call_if("IF(1, 2)", &env),
            Err(EvalError::InvalidArgument(_))
        ));
    }
}
