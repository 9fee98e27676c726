//! Authoring-time validation of formulas and whole calculators

use crate::ast::{FormulaExpr, UnaryOperator};
use crate::dependency::{expressions, resolve};
use crate::error::FormulaError;
use crate::functions::registry;
use crate::parser::{parse_with_sites, CallSite};
use calcsmith_core::{Calculator, Field, FieldKind};
use std::collections::BTreeSet;

/// What an authoring error is about
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum DiagnosticKind {
    Syntax,
    UnknownReference,
    UnknownFunction,
    WrongArity,
    InvalidArgument,
    InvalidName,
    DuplicateName,
    IncompleteLookup,
}

/// An error that blocks saving
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub message: String,
    /// Char offset in the expression
    #[cfg_attr(feature = "serde", serde(skip_serializing_if = "Option::is_none"))]
    pub position: Option<usize>,
}

impl Diagnostic {
    fn at(kind: DiagnosticKind, error: &FormulaError, position: Option<usize>) -> Self {
        Self {
            kind,
            message: error.to_string(),
            position,
        }
    }
}

impl From<calcsmith_core::Error> for Diagnostic {
    fn from(error: calcsmith_core::Error) -> Self {
        let kind = match error {
            calcsmith_core::Error::InvalidName(_) => DiagnosticKind::InvalidName,
            calcsmith_core::Error::DuplicateName(_) => DiagnosticKind::DuplicateName,
            calcsmith_core::Error::IncompleteLookup(_)
            | calcsmith_core::Error::UnknownDataSource(_) => DiagnosticKind::IncompleteLookup,
            calcsmith_core::Error::Other(_) => DiagnosticKind::InvalidArgument,
        };
        Self {
            kind,
            message: error.to_string(),
            position: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum WarningKind {
    SelfReference,
    EmptyCalculatedField,
}

/// Something worth flagging that does not block saving
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Warning {
    pub kind: WarningKind,
    pub message: String,
}

/// Outcome of validating one expression
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct ValidationReport {
    pub is_valid: bool,
    pub errors: Vec<Diagnostic>,
    pub warnings: Vec<Warning>,
    /// Distinct `{name}` references in first-occurrence order
    pub referenced_fields: Vec<String>,
    /// Distinct function names (upper case) in first-occurrence order
    pub referenced_functions: Vec<String>,
}

/// Validate an expression against the names it may reference
pub fn validate(expression: &str, known_names: &BTreeSet<String>) -> ValidationReport {
    Validator::new(known_names).validate(expression)
}

/// Expression validator with optional calculator context
pub struct Validator<'a> {
    known_names: &'a BTreeSet<String>,
    self_name: Option<&'a str>,
    empty_calculated: Option<&'a BTreeSet<String>>,
}

impl<'a> Validator<'a> {
    pub fn new(known_names: &'a BTreeSet<String>) -> Self {
        Self {
            known_names,
            self_name: None,
            empty_calculated: None,
        }
    }

    /// Name of the node being edited, for the self-reference warning
    pub fn with_self_name(mut self, name: &'a str) -> Self {
        self.self_name = Some(name);
        self
    }

    /// Calculated fields without an expression
    pub fn with_empty_calculated(mut self, names: &'a BTreeSet<String>) -> Self {
        self.empty_calculated = Some(names);
        self
    }

    pub fn validate(&self, expression: &str) -> ValidationReport {
        let mut report = ValidationReport::default();

        // Syntax first; nothing else is meaningful without a tree
        let parsed = match parse_with_sites(expression) {
            Ok(parsed) => parsed,
            Err(error) => {
                report
                    .errors
                    .push(Diagnostic::at(DiagnosticKind::Syntax, &error, error.position()));
                return report;
            }
        };

        for site in &parsed.references {
            if report.referenced_fields.contains(&site.name) {
                continue;
            }
            report.referenced_fields.push(site.name.clone());
            if !self.known_names.contains(&site.name) {
                report.errors.push(Diagnostic::at(
                    DiagnosticKind::UnknownReference,
                    &FormulaError::UnknownReference(site.name.clone()),
                    Some(site.position),
                ));
            }
        }

        for call in &parsed.calls {
            if !report.referenced_functions.contains(&call.name) {
                report.referenced_functions.push(call.name.clone());
            }
            if let Some(diagnostic) = check_call(call) {
                report.errors.push(diagnostic);
            }
        }

        if let Some(name) = self.self_name {
            if report.referenced_fields.iter().any(|r| r == name) {
                report.warnings.push(Warning {
                    kind: WarningKind::SelfReference,
                    message: format!("'{}' references itself", name),
                });
            }
        }

        if let Some(empty) = self.empty_calculated {
            for name in report.referenced_fields.iter().filter(|r| empty.contains(*r)) {
                report.warnings.push(Warning {
                    kind: WarningKind::EmptyCalculatedField,
                    message: format!("Calculated field '{}' has no expression", name),
                });
            }
        }

        report.is_valid = report.errors.is_empty();
        report
    }
}

fn check_call(call: &CallSite) -> Option<Diagnostic> {
    let position = Some(call.position);
    let func = match registry().get(&call.name) {
        Some(func) => func,
        None => {
            return Some(Diagnostic::at(
                DiagnosticKind::UnknownFunction,
                &FormulaError::UnknownFunction(call.name.clone()),
                position,
            ))
        }
    };

    if !func.accepts(call.args.len()) {
        return Some(Diagnostic::at(
            DiagnosticKind::WrongArity,
            &FormulaError::ArgumentCount {
                function: func.name.to_string(),
                expected: func.arity(),
                actual: call.args.len(),
            },
            position,
        ));
    }

    if func.name == "ROUND" {
        let invalid = |message: String| {
            Some(Diagnostic::at(
                DiagnosticKind::InvalidArgument,
                &FormulaError::InvalidArgument(message),
                position,
            ))
        };
        match call.args.get(1) {
            None | Some(FormulaExpr::FieldRef(_)) => {}
            Some(expr) => match literal_number(expr) {
                Some(places) if places < 0.0 || places.fract() != 0.0 => {
                    return invalid(format!(
                        "ROUND places must be a non-negative integer, got {}",
                        places
                    ));
                }
                Some(_) => {}
                None => {
                    return invalid(
                        "ROUND places must be an integer literal or a field reference".into(),
                    );
                }
            },
        }
    }

    None
}

/// Value of a literal number, including a negated one
fn literal_number(expr: &FormulaExpr) -> Option<f64> {
    match expr {
        FormulaExpr::Number(n) => Some(*n),
        FormulaExpr::UnaryOp {
            op: UnaryOperator::Negate,
            operand,
        } => literal_number(operand).map(|n| -n),
        _ => None,
    }
}

/// Validation report for one node with an expression
#[derive(Debug, Clone, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct NodeReport {
    pub name: String,
    pub report: ValidationReport,
}

/// Save-time validation of a whole calculator
#[derive(Debug, Clone, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct CalculatorReport {
    /// Name and lookup configuration problems
    pub definition_errors: Vec<Diagnostic>,
    /// One report per formula and non-empty calculated field
    pub expressions: Vec<NodeReport>,
    /// Reference cycles as closed paths
    pub cycles: Vec<Vec<String>>,
}

impl CalculatorReport {
    /// False if anything blocks saving
    pub fn is_valid(&self) -> bool {
        self.definition_errors.is_empty()
            && self.cycles.is_empty()
            && self.expressions.iter().all(|n| n.report.is_valid)
    }

    /// Every blocking problem as a one-line message
    pub fn error_messages(&self) -> Vec<String> {
        let mut messages: Vec<String> = self
            .definition_errors
            .iter()
            .map(|d| d.message.clone())
            .collect();
        for node in &self.expressions {
            for error in &node.report.errors {
                messages.push(format!("{}: {}", node.name, error.message));
            }
        }
        for cycle in &self.cycles {
            messages.push(FormulaError::CircularReference(cycle.clone()).to_string());
        }
        messages
    }
}

/// Validate a calculator before saving it
pub fn validate_calculator(calc: &Calculator) -> CalculatorReport {
    let mut report = CalculatorReport::default();

    let mut seen = BTreeSet::new();
    let names = calc
        .fields
        .iter()
        .map(|f| f.name.as_str())
        .chain(calc.formulas.iter().map(|f| f.name.as_str()));
    for name in names {
        if !Field::is_valid_name(name) {
            report
                .definition_errors
                .push(calcsmith_core::Error::InvalidName(name.to_string()).into());
        } else if !seen.insert(name) {
            report
                .definition_errors
                .push(calcsmith_core::Error::DuplicateName(name.to_string()).into());
        }
    }

    for field in calc.fields.iter().filter(|f| f.kind == FieldKind::DatabaseLookup) {
        if let Err(error @ calcsmith_core::Error::IncompleteLookup(_)) = field.check() {
            report.definition_errors.push(error.into());
        }
    }

    let known_names = calc.known_names();
    let empty_calculated = calc.empty_calculated_fields();
    for (name, expression) in expressions(calc) {
        let node_report = Validator::new(&known_names)
            .with_self_name(name)
            .with_empty_calculated(&empty_calculated)
            .validate(expression);
        report.expressions.push(NodeReport {
            name: name.to_string(),
            report: node_report,
        });
    }

    report.cycles = resolve(calc).cycles;
    report
}

/// Fill each formula's derived `depends_on_fields` / `depends_on_formulas`
pub fn annotate_dependencies(calc: &mut Calculator) {
    let fields: BTreeSet<String> = calc.fields.iter().map(|f| f.name.clone()).collect();
    let formulas: BTreeSet<String> = calc.formulas.iter().map(|f| f.name.clone()).collect();

    for formula in &mut calc.formulas {
        formula.depends_on_fields.clear();
        formula.depends_on_formulas.clear();

        let parsed = match parse_with_sites(&formula.expression) {
            Ok(parsed) => parsed,
            Err(_) => continue,
        };
        for site in parsed.references {
            if fields.contains(&site.name) {
                formula.depends_on_fields.insert(site.name);
            } else if formulas.contains(&site.name) {
                formula.depends_on_formulas.insert(site.name);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use calcsmith_core::{DataSource, Formula};
    use pretty_assertions::assert_eq;

    fn names(list: &[&str]) -> BTreeSet<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_valid_expression() {
        let report = validate("SUM({a}, {b}) * ROUND({a}, 2)", &names(&["a", "b"]));
        assert!(report.is_valid);
        assert!(report.errors.is_empty());
        assert_eq!(report.referenced_fields, vec!["a", "b"]);
        assert_eq!(report.referenced_functions, vec!["SUM", "ROUND"]);
    }

    #[test]
    fn test_unknown_reference() {
        let report = validate("{a} + {unknownField}", &names(&["a"]));
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, DiagnosticKind::UnknownReference);
        assert_eq!(report.errors[0].position, Some(6));
        assert!(report.errors[0].message.contains("unknownField"));
    }

    #[test]
    fn test_syntax_error_stops_further_checks() {
        let report = validate("{nope} + (1", &names(&[]));
        assert!(!report.is_valid);
        assert_eq!(report.errors.len(), 1);
        assert_eq!(report.errors[0].kind, DiagnosticKind::Syntax);
        assert_eq!(report.errors[0].position, Some(9));
        assert!(report.referenced_fields.is_empty());
    }

    #[test]
    fn test_unknown_function_and_arity() {
        let report = validate("MEDIAN(1, 2) + SQRT(1, 2)", &names(&[]));
        let kinds: Vec<DiagnosticKind> = report.errors.iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![DiagnosticKind::UnknownFunction, DiagnosticKind::WrongArity]
        );
        assert_eq!(report.errors[1].position, Some(15));
        assert_eq!(report.referenced_functions, vec!["MEDIAN", "SQRT"]);
    }

    #[test]
    fn test_round_literal_precision() {
        let known = names(&["x"]);
        assert!(validate("ROUND({x}, 2)", &known).is_valid);
        assert!(validate("ROUND({x}, {x})", &known).is_valid);

        let negative = validate("ROUND({x}, -1)", &known);
        assert_eq!(negative.errors[0].kind, DiagnosticKind::InvalidArgument);
        let fractional = validate("ROUND({x}, 1.5)", &known);
        assert_eq!(fractional.errors[0].kind, DiagnosticKind::InvalidArgument);
    }

    #[test]
    fn test_round_computed_precision() {
        let known = names(&["x", "a"]);
        for expression in ["ROUND({x}, {a} + 1)", "ROUND({x}, \"2\")", "ROUND({x}, ABS({a}))"] {
            let report = validate(expression, &known);
            assert!(!report.is_valid, "{}", expression);
            assert_eq!(report.errors[0].kind, DiagnosticKind::InvalidArgument);
            assert!(report.errors[0].message.contains("field reference"));
        }
        assert!(validate("ROUND({x}, {a})", &known).is_valid);
    }

    #[test]
    fn test_deep_nesting_is_a_syntax_error() {
        let known = names(&["x"]);
        let parens = format!("{}{{x}}{}", "(".repeat(5000), ")".repeat(5000));
        let signs = format!("{}{{x}}", "-".repeat(200_000));
        for expression in [parens, signs] {
            let report = validate(&expression, &known);
            assert!(!report.is_valid);
            assert_eq!(report.errors.len(), 1);
            assert_eq!(report.errors[0].kind, DiagnosticKind::Syntax);
            assert_eq!(report.errors[0].position, Some(crate::parser::MAX_NESTING));
        }
    }

    #[test]
    fn test_warnings() {
        let known = names(&["total", "area"]);
        let empty = names(&["area"]);
        let report = Validator::new(&known)
            .with_self_name("total")
            .with_empty_calculated(&empty)
            .validate("{total} + {area}");

        assert!(report.is_valid);
        let kinds: Vec<WarningKind> = report.warnings.iter().map(|w| w.kind).collect();
        assert_eq!(
            kinds,
            vec![WarningKind::SelfReference, WarningKind::EmptyCalculatedField]
        );
    }

    #[test]
    fn test_validate_calculator_collects_everything() {
        let calc = Calculator::new("c", "broken")
            .with_field(Field::manual("qty"))
            .with_field(Field::manual("qty"))
            .with_field(Field::manual("2x"))
            .with_field(Field {
                source_field: None,
                ..Field::lookup("rate", DataSource::Lhr, "rate")
            })
            .with_formula(Formula::new("A", "{B} + {qty}"))
            .with_formula(Formula::new("B", "{A} + {ghost}"));

        let report = validate_calculator(&calc);
        assert!(!report.is_valid());

        let kinds: Vec<DiagnosticKind> = report.definition_errors.iter().map(|d| d.kind).collect();
        assert_eq!(
            kinds,
            vec![
                DiagnosticKind::DuplicateName,
                DiagnosticKind::InvalidName,
                DiagnosticKind::IncompleteLookup
            ]
        );
        assert!(report.expressions[0].report.is_valid);
        assert!(!report.expressions[1].report.is_valid);
        assert_eq!(report.cycles, vec![vec!["A", "B", "A"]]);

        let messages = report.error_messages();
        assert!(messages.iter().any(|m| m.contains("ghost")));
        assert!(messages.iter().any(|m| m == "Circular reference: A -> B -> A"));
    }

    #[test]
    fn test_validate_calculator_ok() {
        let calc = Calculator::new("c", "ok")
            .with_field(Field::manual("a"))
            .with_field(Field::calculated("double", "{a} * 2"))
            .with_formula(Formula::new("total", "{double} + 1"));
        let report = validate_calculator(&calc);
        assert!(report.is_valid(), "{:?}", report.error_messages());
        assert_eq!(report.expressions.len(), 2);
    }

    #[test]
    fn test_annotate_dependencies() {
        let mut calc = Calculator::new("c", "deps")
            .with_field(Field::manual("qty"))
            .with_field(Field::manual("price"))
            .with_formula(Formula::new("subtotal", "{qty} * {price}"))
            .with_formula(Formula::new("total", "{subtotal} * 1.2 + {qty} * 0"));

        annotate_dependencies(&mut calc);

        let total = calc.formula("total").unwrap();
        assert_eq!(total.depends_on_fields, names(&["qty"]));
        assert_eq!(total.depends_on_formulas, names(&["subtotal"]));
        assert_eq!(
            calc.formula("subtotal").unwrap().depends_on_fields,
            names(&["price", "qty"])
        );
    }
}
