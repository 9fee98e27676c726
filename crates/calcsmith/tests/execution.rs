//! End-to-end tests for calculator execution

use calcsmith::prelude::*;
use calcsmith::{ErrorCategory, NodeError};
use pretty_assertions::assert_eq;
use std::future::Future;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

fn inputs(pairs: &[(&str, InputValue)]) -> InputValues {
    pairs
        .iter()
        .map(|(name, value)| (name.to_string(), value.clone()))
        .collect()
}

fn error_kind(report: &ExecutionReport, name: &str) -> Option<ErrorKind> {
    report.results[name].error.as_ref().map(|e| e.kind)
}

/// Lookup that never answers before the test gives up on it
struct SlowLookup {
    calls: AtomicUsize,
}

impl LookupProvider for SlowLookup {
    fn lookup(
        &self,
        _source: DataSource,
        _record_id: &str,
        _field: &str,
    ) -> impl Future<Output = std::result::Result<Value, LookupError>> + Send {
        self.calls.fetch_add(1, Ordering::SeqCst);
        async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            Ok(Value::Number(1.0))
        }
    }
}

#[tokio::test]
async fn test_sum_of_two_fields() {
    let calc = Calculator::new("sum", "Sum")
        .with_field(Field::manual("a"))
        .with_field(Field::manual("b"))
        .with_formula(Formula::new("sum", "SUM({a}, {b})").primary());

    let report = Engine::default()
        .execute(
            &calc,
            &inputs(&[("a", 2.0.into()), ("b", 3.0.into())]),
            &StaticLookup::new(),
        )
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.order, vec!["a", "b", "sum"]);
    assert_eq!(report.results["sum"].value, Value::Number(5.0));
    assert_eq!(report.results["sum"].formatted, "5.00");
    assert_eq!(report.results["a"].formatted, "2");
    assert_eq!(report.primary_result.as_deref(), Some("sum"));
}

#[tokio::test]
async fn test_if_skips_division_by_zero() {
    let calc = Calculator::new("guard", "Guarded ratio")
        .with_field(Field::manual("a"))
        .with_formula(Formula::new("ratio", "IF({a} > 0, 10 / {a}, 0)"))
        .with_formula(Formula::new("safe", "IF({a} == 0, 0, 10 / {a})"));

    let report = Engine::default()
        .execute(&calc, &inputs(&[("a", 0.0.into())]), &StaticLookup::new())
        .await
        .unwrap();

    assert!(report.success);
    assert_eq!(report.results["ratio"].value, Value::Number(0.0));
    assert_eq!(report.results["safe"].value, Value::Number(0.0));
}

#[tokio::test]
async fn test_failed_node_does_not_stop_others() {
    let calc = Calculator::new("partial", "Partial")
        .with_field(Field::manual("a"))
        .with_field(Field::manual("b"))
        .with_formula(Formula::new("ok", "{b} * 2"))
        .with_formula(Formula::new("bad", "1 / {a}"))
        .with_formula(Formula::new("after", "{bad} + 1"));

    let report = Engine::default()
        .execute(
            &calc,
            &inputs(&[("a", 0.0.into()), ("b", 3.0.into())]),
            &StaticLookup::new(),
        )
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(report.results["ok"].value, Value::Number(6.0));

    let bad = report.results["bad"].error.as_ref().unwrap();
    assert_eq!(bad.kind, ErrorKind::DivisionByZero);
    assert_eq!(bad.category, ErrorCategory::Evaluation);
    assert_eq!(report.results["bad"].value, Value::Error(ErrorKind::DivisionByZero));
    assert_eq!(report.results["bad"].formatted, "#DIV/0!");

    assert_eq!(error_kind(&report, "after"), Some(ErrorKind::UpstreamError));
    let failed: Vec<&str> = report.failed().map(|(name, _)| name).collect();
    assert_eq!(failed, vec!["bad", "after"]);
}

#[tokio::test]
async fn test_cycle_rejected_before_execution() {
    let calc = Calculator::new("cycle", "Cycle")
        .with_formula(Formula::new("A", "{B} + 1"))
        .with_formula(Formula::new("B", "{C} + 1"))
        .with_formula(Formula::new("C", "{A} + 1"));

    let error = Engine::default()
        .execute(&calc, &InputValues::new(), &StaticLookup::new())
        .await
        .unwrap_err();

    assert_eq!(
        error,
        ExecutionError::CircularReference {
            cycles: vec![vec![
                "A".to_string(),
                "B".to_string(),
                "C".to_string(),
                "A".to_string()
            ]],
        }
    );
}

#[tokio::test]
async fn test_invalid_definition_rejected() {
    let calc = Calculator::new("bad", "Bad")
        .with_field(Field::manual("a"))
        .with_formula(Formula::new("x", "FOO({a})"));

    let error = Engine::default()
        .execute(&calc, &InputValues::new(), &StaticLookup::new())
        .await
        .unwrap_err();

    match error {
        ExecutionError::InvalidDefinition(report) => {
            assert_eq!(report.expressions.len(), 1);
            assert!(!report.expressions[0].report.is_valid);
        }
        other => panic!("expected invalid definition, got {:?}", other),
    }
}

#[tokio::test]
async fn test_repeat_runs_are_identical() {
    let calc = Calculator::new("repeat", "Repeat")
        .with_field(Field::manual("qty"))
        .with_field(Field::lookup("rate", DataSource::Lhr, "rate").with_default("L-1"))
        .with_field(Field::calculated("hours", "{qty} / 4"))
        .with_formula(Formula::new("labour", "{hours} * {rate}").with_format(DisplayFormat::Currency))
        .with_formula(Formula::new("per_unit", "{labour} / {qty}").with_decimal_places(3));
    let lookup = StaticLookup::new().with(DataSource::Lhr, "L-1", "rate", 42.5);
    let values = inputs(&[("qty", 7.0.into())]);
    let engine = Engine::default();

    let first = engine.execute(&calc, &values, &lookup).await.unwrap();
    let second = engine.execute(&calc, &values, &lookup).await.unwrap();

    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );
    assert_eq!(first.order, vec!["qty", "rate", "hours", "labour", "per_unit"]);
    assert_eq!(first.results["labour"].formatted, "$74.38");
}

#[tokio::test]
async fn test_missing_lookup_record() {
    let calc = Calculator::new("lookup", "Lookup")
        .with_field(Field::lookup("rate", DataSource::Mhr, "rate").with_default("M-404"))
        .with_field(Field::lookup("setup", DataSource::Mhr, "setup"))
        .with_field(Field::manual("hours"))
        .with_formula(Formula::new("cost", "{hours} * {rate}"))
        .with_formula(Formula::new("hours_x2", "{hours} * 2"));
    let lookup = StaticLookup::new().with(DataSource::Mhr, "M-1", "rate", 85.0);

    let report = Engine::default()
        .execute(&calc, &inputs(&[("hours", 2.0.into())]), &lookup)
        .await
        .unwrap();

    let rate = report.results["rate"].error.as_ref().unwrap();
    assert_eq!(rate.kind, ErrorKind::LookupFailed);
    assert_eq!(rate.category, ErrorCategory::Lookup);
    assert_eq!(rate.message, "No 'rate' for record 'M-404' in mhr");

    // No input and no default: nothing to look up
    assert_eq!(error_kind(&report, "setup"), Some(ErrorKind::MissingInput));
    assert_eq!(error_kind(&report, "cost"), Some(ErrorKind::UpstreamError));
    assert_eq!(report.results["hours_x2"].value, Value::Number(4.0));
}

#[tokio::test]
async fn test_non_finite_lookup_fails() {
    let calc = Calculator::new("lookup", "Lookup")
        .with_field(Field::lookup("low", DataSource::Mhr, "rate").with_default("M-NAN"))
        .with_field(Field::lookup("high", DataSource::Mhr, "rate").with_default("M-INF"))
        .with_field(Field::lookup("ok", DataSource::Mhr, "rate").with_default("M-1"))
        .with_formula(Formula::new("cheapest", "MIN({low}, {ok})"))
        .with_formula(Formula::new("dearest", "MAX({high}, {ok})"));
    let lookup = StaticLookup::new()
        .with(DataSource::Mhr, "M-NAN", "rate", f64::NAN)
        .with(DataSource::Mhr, "M-INF", "rate", f64::INFINITY)
        .with(DataSource::Mhr, "M-1", "rate", 85.0);

    let report = Engine::default()
        .execute(&calc, &InputValues::new(), &lookup)
        .await
        .unwrap();

    assert!(!report.success);
    assert_eq!(error_kind(&report, "low"), Some(ErrorKind::LookupFailed));
    assert_eq!(error_kind(&report, "high"), Some(ErrorKind::LookupFailed));
    assert_eq!(error_kind(&report, "cheapest"), Some(ErrorKind::UpstreamError));
    assert_eq!(error_kind(&report, "dearest"), Some(ErrorKind::UpstreamError));
    assert_eq!(report.results["ok"].value, Value::Number(85.0));
}

#[tokio::test]
async fn test_lookup_record_from_input() {
    let calc = Calculator::new("lookup", "Lookup")
        .with_field(Field::lookup("rate", DataSource::Processes, "cost").with_default("P-1"));
    let lookup = StaticLookup::new()
        .with(DataSource::Processes, "P-1", "cost", 1.0)
        .with(DataSource::Processes, "P-2", "cost", 2.0);

    let report = Engine::default()
        .execute(&calc, &inputs(&[("rate", "P-2".into())]), &lookup)
        .await
        .unwrap();

    assert_eq!(report.results["rate"].value, Value::Number(2.0));
}

#[tokio::test]
async fn test_manual_inputs() {
    let calc = Calculator::new("manual", "Manual")
        .with_field(Field::manual("qty").required())
        .with_field(Field::manual("extra"))
        .with_field(Field::manual("scrap").with_default(5.0))
        .with_field(Field::manual("price"))
        .with_formula(Formula::new("total", "{qty} * 2"))
        .with_formula(Formula::new("rest", "{extra} + {scrap} + {price}"));

    let report = Engine::default()
        .execute(&calc, &inputs(&[("price", "12.5".into())]), &StaticLookup::new())
        .await
        .unwrap();

    let qty = report.results["qty"].error.as_ref().unwrap();
    assert_eq!(qty.kind, ErrorKind::MissingInput);
    assert_eq!(qty.category, ErrorCategory::Input);
    assert_eq!(error_kind(&report, "total"), Some(ErrorKind::UpstreamError));

    assert_eq!(report.results["extra"].value, Value::Number(0.0));
    assert_eq!(report.results["price"].value, Value::Text("12.5".into()));
    assert_eq!(report.results["rest"].value, Value::Number(17.5));
}

#[tokio::test]
async fn test_empty_calculated_field() {
    let calc = Calculator::new("empty", "Empty")
        .with_field(Field::calculated("blank", "  "))
        .with_formula(Formula::new("uses_blank", "{blank} + 1"));

    let report = Engine::default()
        .execute(&calc, &InputValues::new(), &StaticLookup::new())
        .await
        .unwrap();

    assert_eq!(error_kind(&report, "blank"), Some(ErrorKind::MissingExpression));
    assert_eq!(error_kind(&report, "uses_blank"), Some(ErrorKind::UpstreamError));
}

#[tokio::test]
async fn test_execution_order_tie_break() {
    let calc = Calculator::new("order", "Order")
        .with_formula(Formula::new("late", "1").with_order(2))
        .with_formula(Formula::new("early", "2").with_order(1))
        .with_formula(Formula::new("needs_late", "{late} * 2").with_order(0))
        .with_field(Field::manual("f"));

    let report = Engine::default()
        .execute(&calc, &InputValues::new(), &StaticLookup::new())
        .await
        .unwrap();

    // Unrelated nodes follow execution order; a precedent is pulled ahead
    assert_eq!(report.order, vec!["f", "late", "needs_late", "early"]);
}

#[tokio::test]
async fn test_rounded_value_feeds_dependents() {
    let calc = Calculator::new("round", "Rounding")
        .with_formula(Formula::new("third", "1 / 3").with_decimal_places(2))
        .with_formula(Formula::new("tripled", "{third} * 3").with_decimal_places(4));

    let report = Engine::default()
        .execute(&calc, &InputValues::new(), &StaticLookup::new())
        .await
        .unwrap();

    assert_eq!(report.results["third"].value, Value::Number(0.33));
    assert_eq!(report.results["tripled"].value, Value::Number(0.99));
    assert_eq!(report.results["tripled"].formatted, "0.9900");
}

#[tokio::test]
async fn test_display_formats() {
    let calc = Calculator::new("formats", "Formats")
        .with_field(Field::manual("x"))
        .with_formula(Formula::new("money", "{x} * -1").with_format(DisplayFormat::Currency))
        .with_formula(Formula::new("share", "12.5").with_format(DisplayFormat::Percentage))
        .with_formula(Formula::new("whole", "{x}").with_decimal_places(0))
        .with_formula(Formula::new("label", "IF({x} > 1000, \"big\", \"small\")"));
    let options = ExecutionOptions {
        currency_symbol: "€".to_string(),
        ..ExecutionOptions::default()
    };

    let report = Engine::new(options)
        .execute(&calc, &inputs(&[("x", 1234.5.into())]), &StaticLookup::new())
        .await
        .unwrap();

    assert_eq!(report.results["money"].formatted, "-€1,234.50");
    assert_eq!(report.results["share"].formatted, "12.50%");
    assert_eq!(report.results["whole"].formatted, "1,235");
    assert_eq!(report.results["label"].value, Value::Text("big".into()));
    assert_eq!(report.results["label"].formatted, "big");
}

#[tokio::test]
async fn test_plan_cache_follows_definition() {
    let calc = Calculator::new("cache", "Cache")
        .with_field(Field::manual("a"))
        .with_formula(Formula::new("double", "{a} * 2"));
    let engine = Engine::default();
    let values = inputs(&[("a", 4.0.into())]);

    engine.execute(&calc, &values, &StaticLookup::new()).await.unwrap();
    engine.execute(&calc, &values, &StaticLookup::new()).await.unwrap();
    assert_eq!(engine.cached_plans(), 1);

    let mut changed = calc.clone();
    changed.formulas[0].expression = "{a} * 3".to_string();
    let report = engine.execute(&changed, &values, &StaticLookup::new()).await.unwrap();
    // The stale plan for the same id is replaced, not kept alongside
    assert_eq!(engine.cached_plans(), 1);
    assert_eq!(report.results["double"].value, Value::Number(12.0));
}

#[tokio::test(start_paused = true)]
async fn test_dropped_execution_stops_lookups() {
    let calc = Calculator::new("slow", "Slow")
        .with_field(Field::lookup("first", DataSource::Mhr, "rate").with_default("M-1"))
        .with_field(Field::lookup("second", DataSource::Mhr, "rate").with_default("M-2"))
        .with_formula(Formula::new("total", "{first} + {second}"));
    let lookup = SlowLookup {
        calls: AtomicUsize::new(0),
    };
    let engine = Engine::default();
    let values = InputValues::new();

    let outcome = tokio::time::timeout(
        Duration::from_millis(50),
        engine.execute(&calc, &values, &lookup),
    )
    .await;

    assert!(outcome.is_err());
    tokio::time::sleep(Duration::from_secs(5)).await;
    assert_eq!(lookup.calls.load(Ordering::SeqCst), 1);
}

#[test]
fn test_node_error_serializes_category() {
    let calc = Calculator::new("json", "Json")
        .with_field(Field::manual("a"))
        .with_formula(Formula::new("bad", "1 / {a}"));
    let runtime = tokio::runtime::Builder::new_current_thread()
        .build()
        .unwrap();
    let report = runtime
        .block_on(Engine::default().execute(
            &calc,
            &inputs(&[("a", 0.0.into())]),
            &StaticLookup::new(),
        ))
        .unwrap();

    let error: &NodeError = report.results["bad"].error.as_ref().unwrap();
    let json = serde_json::to_value(error).unwrap();
    assert_eq!(json["category"], "evaluation");
    assert_eq!(json["message"], "Division by zero");
}
