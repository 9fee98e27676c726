//! Calculator execution engine
//!
//! Turns a validated calculator definition into an execution plan (node
//! order plus parsed expressions), then walks the plan against caller inputs
//! and a lookup provider.
//!
//! # Example
//!
//! ```rust
//! use calcsmith::prelude::*;
//!
//! let calc = Calculator::new("sum", "Sum")
//!     .with_field(Field::manual("a"))
//!     .with_field(Field::manual("b"))
//!     .with_formula(Formula::new("sum", "SUM({a}, {b})"));
//!
//! let mut inputs = InputValues::new();
//! inputs.insert("a".into(), InputValue::Number(2.0));
//! inputs.insert("b".into(), InputValue::Number(3.0));
//!
//! let engine = Engine::default();
//! let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
//! let report = runtime
//!     .block_on(engine.execute(&calc, &inputs, &StaticLookup::new()))
//!     .unwrap();
//! assert_eq!(report.results["sum"].value, Value::Number(5.0));
//! assert_eq!(report.results["sum"].formatted, "5.00");
//! ```

use crate::lookup::LookupProvider;
use ahash::AHashMap;
use calcsmith_core::format::{format_plain, format_value, round_half_away, FormatOptions};
use calcsmith_core::{
    Calculator, DataSource, DisplayFormat, ErrorCategory, ErrorKind, FieldKind, InputValue, Value,
};
use calcsmith_formula::{
    evaluate, parse_formula, resolve_with, validate_calculator, CalculatorReport, Environment,
    EvaluationContext, FormulaExpr,
};
use log::{debug, warn};
use std::collections::BTreeMap;
use std::sync::{Arc, RwLock};
use thiserror::Error;

/// Caller-supplied values by field name
pub type InputValues = BTreeMap<String, InputValue>;

/// Options for calculator execution
#[derive(Debug, Clone)]
pub struct ExecutionOptions {
    /// Reuse plans for definitions seen before (keyed by definition hash)
    pub cache_plans: bool,
    /// Prefix for currency-formatted results
    pub currency_symbol: String,
    /// Group integer digits of formatted results with `,`
    pub thousands_separator: bool,
}

impl Default for ExecutionOptions {
    fn default() -> Self {
        Self {
            cache_plans: true,
            currency_symbol: "$".to_string(),
            thousands_separator: true,
        }
    }
}

impl ExecutionOptions {
    fn format_options(&self) -> FormatOptions {
        FormatOptions {
            currency_symbol: self.currency_symbol.clone(),
            thousands_separator: self.thousands_separator,
        }
    }
}

/// Why a calculator could not be executed at all
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExecutionError {
    /// Authoring errors (syntax, unknown names, arity, naming)
    #[error("Calculator definition is invalid: {}", .0.error_messages().join("; "))]
    InvalidDefinition(CalculatorReport),

    /// The reference graph has cycles
    #[error("Circular reference: {}", format_cycles(.cycles))]
    CircularReference { cycles: Vec<Vec<String>> },
}

fn format_cycles(cycles: &[Vec<String>]) -> String {
    cycles
        .iter()
        .map(|cycle| cycle.join(" -> "))
        .collect::<Vec<_>>()
        .join("; ")
}

/// A failed node
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NodeError {
    pub category: ErrorCategory,
    pub kind: ErrorKind,
    pub message: String,
}

impl NodeError {
    fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            category: kind.category(),
            kind,
            message: message.into(),
        }
    }
}

/// Outcome of one field or formula
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NodeResult {
    pub value: Value,
    pub formatted: String,
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub error: Option<NodeError>,
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ExecutionReport {
    /// True iff no node failed
    pub success: bool,
    /// Order the nodes were computed in
    pub order: Vec<String>,
    pub results: BTreeMap<String, NodeResult>,
    /// Name of the formula flagged as primary result
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub primary_result: Option<String>,
}

impl ExecutionReport {
    /// Nodes that failed, in execution order
    pub fn failed(&self) -> impl Iterator<Item = (&str, &NodeError)> + '_ {
        self.order.iter().filter_map(move |name| {
            self.results
                .get(name)
                .and_then(|r| r.error.as_ref())
                .map(|e| (name.as_str(), e))
        })
    }
}

/// How one plan node gets its value
#[derive(Debug, Clone)]
enum NodeSource {
    Manual {
        default: Option<InputValue>,
        required: bool,
    },
    Lookup {
        source: Option<DataSource>,
        field: String,
        default: Option<InputValue>,
    },
    Calculated {
        expr: Option<FormulaExpr>,
    },
    Formula {
        expr: FormulaExpr,
        decimal_places: u32,
        display_format: DisplayFormat,
    },
}

#[derive(Debug, Clone)]
struct PlanNode {
    name: String,
    source: NodeSource,
}

/// Read-only product of validation and resolution for one definition
#[derive(Debug)]
pub struct ExecutionPlan {
    /// Definition the plan was built from, for the equality check on cache hits
    calculator: Calculator,
    nodes: Vec<PlanNode>,
}

impl ExecutionPlan {
    /// Validate and resolve a calculator
    pub fn build(calc: &Calculator) -> Result<Self, ExecutionError> {
        let report = validate_calculator(calc);
        if !report.is_valid() {
            let only_cycles = report.definition_errors.is_empty()
                && report.expressions.iter().all(|n| n.report.is_valid);
            return Err(if only_cycles {
                ExecutionError::CircularReference {
                    cycles: report.cycles,
                }
            } else {
                ExecutionError::InvalidDefinition(report)
            });
        }

        let mut parsed: AHashMap<String, FormulaExpr> = AHashMap::new();
        for field in calc.fields.iter().filter(|f| f.kind == FieldKind::Calculated) {
            if let Some(expr) = field.expression_text().and_then(|e| parse_formula(e).ok()) {
                parsed.insert(field.name.clone(), expr);
            }
        }
        for formula in &calc.formulas {
            if let Ok(expr) = parse_formula(&formula.expression) {
                parsed.insert(formula.name.clone(), expr);
            }
        }

        let resolution = resolve_with(calc, &parsed);
        let mut nodes = Vec::with_capacity(resolution.order.len());
        for name in resolution.order {
            let source = if let Some(field) = calc.field(&name) {
                match field.kind {
                    FieldKind::Manual => NodeSource::Manual {
                        default: field.default_value.clone(),
                        required: field.is_required,
                    },
                    FieldKind::DatabaseLookup => NodeSource::Lookup {
                        source: field.data_source,
                        field: field.source_field.clone().unwrap_or_default(),
                        default: field.default_value.clone(),
                    },
                    FieldKind::Calculated => NodeSource::Calculated {
                        expr: parsed.remove(&name),
                    },
                }
            } else if let Some(formula) = calc.formula(&name) {
                let expr = parsed.remove(&name).ok_or_else(|| {
                    ExecutionError::InvalidDefinition(validate_calculator(calc))
                })?;
                NodeSource::Formula {
                    expr,
                    decimal_places: formula.decimal_places,
                    display_format: formula.display_format,
                }
            } else {
                continue;
            };
            nodes.push(PlanNode { name, source });
        }

        debug!("built plan for '{}' with {} nodes", calc.id, nodes.len());

        Ok(Self {
            calculator: calc.clone(),
            nodes,
        })
    }

    /// Node names in execution order
    pub fn order(&self) -> impl Iterator<Item = &str> + '_ {
        self.nodes.iter().map(|n| n.name.as_str())
    }
}

/// Executes calculators
///
/// Holds no per-execution state; the only shared state is the read-only
/// plan cache, so one engine can serve concurrent executions.
#[derive(Debug, Default)]
pub struct Engine {
    options: ExecutionOptions,
    cache: RwLock<AHashMap<u64, Arc<ExecutionPlan>>>,
}

impl Engine {
    pub fn new(options: ExecutionOptions) -> Self {
        Self {
            options,
            cache: RwLock::new(AHashMap::new()),
        }
    }

    pub fn options(&self) -> &ExecutionOptions {
        &self.options
    }

    /// Number of cached plans
    pub fn cached_plans(&self) -> usize {
        self.cache.read().map(|cache| cache.len()).unwrap_or(0)
    }

    /// Get the plan for a definition, building (and caching) it when needed
    pub fn plan(&self, calc: &Calculator) -> Result<Arc<ExecutionPlan>, ExecutionError> {
        if !self.options.cache_plans {
            return ExecutionPlan::build(calc).map(Arc::new);
        }

        let hash = calc.definition_hash();
        if let Ok(cache) = self.cache.read() {
            if let Some(plan) = cache.get(&hash) {
                // Verify it's actually the same (hash collision check)
                if plan.calculator.same_definition(calc) {
                    debug!("plan cache hit for '{}'", calc.id);
                    return Ok(Arc::clone(plan));
                }
            }
        }

        debug!("plan cache miss for '{}'", calc.id);
        let plan = Arc::new(ExecutionPlan::build(calc)?);
        if let Ok(mut cache) = self.cache.write() {
            // One plan per calculator id; older definitions are dropped
            cache.retain(|_, cached| cached.calculator.id != calc.id);
            cache.insert(hash, Arc::clone(&plan));
        }
        Ok(plan)
    }

    /// Execute a calculator against inputs
    ///
    /// Node failures are reported per node and never abort the run; only an
    /// invalid or cyclic definition does. Dropping the returned future stops
    /// execution before the next node.
    pub async fn execute<L: LookupProvider>(
        &self,
        calc: &Calculator,
        inputs: &InputValues,
        lookup: &L,
    ) -> Result<ExecutionReport, ExecutionError> {
        let plan = self.plan(calc)?;
        let format = self.options.format_options();

        let mut env = Environment::new();
        let mut results = BTreeMap::new();
        let mut order = Vec::with_capacity(plan.nodes.len());

        for node in &plan.nodes {
            let outcome = match &node.source {
                NodeSource::Manual { default, required } => {
                    manual_value(&node.name, inputs, default.as_ref(), *required)
                }
                NodeSource::Lookup {
                    source,
                    field,
                    default,
                } => {
                    lookup_value(&node.name, inputs, *source, field, default.as_ref(), lookup)
                        .await
                }
                NodeSource::Calculated { expr: None } => Err(NodeError::new(
                    ErrorKind::MissingExpression,
                    format!("Calculated field '{}' has no expression", node.name),
                )),
                NodeSource::Calculated { expr: Some(expr) } => evaluate_node(expr, &env),
                NodeSource::Formula {
                    expr,
                    decimal_places,
                    ..
                } => evaluate_node(expr, &env).map(|value| match value {
                    Value::Number(n) => Value::Number(round_half_away(n, *decimal_places)),
                    other => other,
                }),
            };

            let result = match outcome {
                Ok(value) => {
                    let formatted = match &node.source {
                        NodeSource::Formula {
                            decimal_places,
                            display_format,
                            ..
                        } => format_value(&value, *decimal_places, *display_format, &format),
                        _ => format_plain(&value),
                    };
                    debug!("{} = {}", node.name, formatted);
                    NodeResult {
                        value,
                        formatted,
                        error: None,
                    }
                }
                Err(error) => {
                    warn!("{} failed: {}", node.name, error.message);
                    NodeResult {
                        value: Value::Error(error.kind),
                        formatted: error.kind.code().to_string(),
                        error: Some(error),
                    }
                }
            };

            env.insert(node.name.clone(), result.value.clone());
            results.insert(node.name.clone(), result);
            order.push(node.name.clone());
        }

        let success = results.values().all(|r| r.error.is_none());
        Ok(ExecutionReport {
            success,
            order,
            results,
            primary_result: calc.primary_result().map(|f| f.name.clone()),
        })
    }
}

fn manual_value(
    name: &str,
    inputs: &InputValues,
    default: Option<&InputValue>,
    required: bool,
) -> Result<Value, NodeError> {
    match inputs.get(name).or(default) {
        Some(value) => Ok(Value::from(value.clone())),
        None if required => Err(NodeError::new(
            ErrorKind::MissingInput,
            format!("Required input '{}' was not provided", name),
        )),
        None => Ok(Value::Number(0.0)),
    }
}

async fn lookup_value<L: LookupProvider>(
    name: &str,
    inputs: &InputValues,
    source: Option<DataSource>,
    field: &str,
    default: Option<&InputValue>,
    lookup: &L,
) -> Result<Value, NodeError> {
    let record_id = inputs
        .get(name)
        .or(default)
        .map(InputValue::as_record_id)
        .ok_or_else(|| {
            NodeError::new(
                ErrorKind::MissingInput,
                format!("No record selected for lookup field '{}'", name),
            )
        })?;
    // Validation guarantees a data source; stay total anyway
    let source = source.ok_or_else(|| {
        NodeError::new(
            ErrorKind::LookupFailed,
            format!("Lookup field '{}' has no data source", name),
        )
    })?;

    match lookup.lookup(source, &record_id, field).await {
        Ok(Value::Error(kind)) => Err(NodeError::new(
            ErrorKind::LookupFailed,
            format!("Lookup for '{}' returned {}", name, kind),
        )),
        Ok(Value::Number(n)) if !n.is_finite() => Err(NodeError::new(
            ErrorKind::LookupFailed,
            format!("Lookup for '{}' returned non-finite number {}", name, n),
        )),
        Ok(value) => Ok(value),
        Err(error) => Err(NodeError::new(ErrorKind::LookupFailed, error.to_string())),
    }
}

fn evaluate_node(expr: &FormulaExpr, env: &Environment) -> Result<Value, NodeError> {
    evaluate(expr, &EvaluationContext::new(env))
        .map_err(|error| NodeError::new(error.kind(), error.to_string()))
}
