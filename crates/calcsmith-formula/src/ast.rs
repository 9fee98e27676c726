//! Formula Abstract Syntax Tree types

use std::fmt;

/// Formula expression AST
#[derive(Debug, Clone, PartialEq)]
pub enum FormulaExpr {
    // === Literals ===
    /// Numeric literal (always finite and non-negative; `-` is a unary op)
    Number(f64),
    /// String literal
    String(String),

    // === References ===
    /// `{name}` reference to a field or formula
    FieldRef(String),

    // === Operators ===
    /// Binary operation
    BinaryOp {
        op: BinaryOperator,
        left: Box<FormulaExpr>,
        right: Box<FormulaExpr>,
    },
    /// Unary operation
    UnaryOp {
        op: UnaryOperator,
        operand: Box<FormulaExpr>,
    },

    // === Function call ===
    Function {
        name: String,
        args: Vec<FormulaExpr>,
    },
}

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BinaryOperator {
    // Arithmetic
    Add,
    Subtract,
    Multiply,
    Divide,

    // Comparison
    Equal,
    NotEqual,
    LessThan,
    LessEqual,
    GreaterThan,
    GreaterEqual,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UnaryOperator {
    Negate,
}

// Binding strength, loosest first
const PREC_COMPARISON: u8 = 1;
const PREC_ADDITIVE: u8 = 2;
const PREC_MULTIPLICATIVE: u8 = 3;
const PREC_UNARY: u8 = 4;
const PREC_PRIMARY: u8 = 5;

impl BinaryOperator {
    /// Operator as written in formula text
    pub fn symbol(&self) -> &'static str {
        match self {
            BinaryOperator::Add => "+",
            BinaryOperator::Subtract => "-",
            BinaryOperator::Multiply => "*",
            BinaryOperator::Divide => "/",
            BinaryOperator::Equal => "==",
            BinaryOperator::NotEqual => "!=",
            BinaryOperator::LessThan => "<",
            BinaryOperator::LessEqual => "<=",
            BinaryOperator::GreaterThan => ">",
            BinaryOperator::GreaterEqual => ">=",
        }
    }

    pub fn is_comparison(&self) -> bool {
        self.precedence() == PREC_COMPARISON
    }

    fn precedence(&self) -> u8 {
        match self {
            BinaryOperator::Add | BinaryOperator::Subtract => PREC_ADDITIVE,
            BinaryOperator::Multiply | BinaryOperator::Divide => PREC_MULTIPLICATIVE,
            _ => PREC_COMPARISON,
        }
    }
}

impl FormulaExpr {
    fn precedence(&self) -> u8 {
        match self {
            FormulaExpr::BinaryOp { op, .. } => op.precedence(),
            FormulaExpr::UnaryOp { .. } => PREC_UNARY,
            _ => PREC_PRIMARY,
        }
    }

    /// Visit every `{name}` reference, left to right
    pub fn for_each_reference<'a>(&'a self, f: &mut impl FnMut(&'a str)) {
        match self {
            FormulaExpr::FieldRef(name) => f(name),
            FormulaExpr::BinaryOp { left, right, .. } => {
                left.for_each_reference(f);
                right.for_each_reference(f);
            }
            FormulaExpr::UnaryOp { operand, .. } => operand.for_each_reference(f),
            FormulaExpr::Function { args, .. } => {
                for arg in args {
                    arg.for_each_reference(f);
                }
            }
            FormulaExpr::Number(_) | FormulaExpr::String(_) => {}
        }
    }
}

fn write_operand(
    f: &mut fmt::Formatter<'_>,
    expr: &FormulaExpr,
    needs_parens: bool,
) -> fmt::Result {
    if needs_parens {
        write!(f, "({})", expr)
    } else {
        write!(f, "{}", expr)
    }
}

/// Canonical formula text; parsing it yields the same tree
impl fmt::Display for FormulaExpr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FormulaExpr::Number(n) => write!(f, "{}", n),
            FormulaExpr::String(s) => write!(f, "\"{}\"", s.replace('"', "\"\"")),
            FormulaExpr::FieldRef(name) => write!(f, "{{{}}}", name),
            FormulaExpr::BinaryOp { op, left, right } => {
                let prec = op.precedence();
                // Comparisons do not chain, the others associate to the left
                let left_parens = if op.is_comparison() {
                    left.precedence() <= prec
                } else {
                    left.precedence() < prec
                };
                write_operand(f, left, left_parens)?;
                write!(f, " {} ", op.symbol())?;
                write_operand(f, right, right.precedence() <= prec)
            }
            FormulaExpr::UnaryOp {
                op: UnaryOperator::Negate,
                operand,
            } => {
                f.write_str("-")?;
                write_operand(f, operand, operand.precedence() < PREC_UNARY)
            }
            FormulaExpr::Function { name, args } => {
                write!(f, "{}(", name)?;
                for (i, arg) in args.iter().enumerate() {
                    if i > 0 {
                        f.write_str(", ")?;
                    }
                    write!(f, "{}", arg)?;
                }
                f.write_str(")")
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn num(n: f64) -> Box<FormulaExpr> {
        Box::new(FormulaExpr::Number(n))
    }

    #[test]
    fn test_print_minimal_parens() {
        let sum = FormulaExpr::BinaryOp {
            op: BinaryOperator::Add,
            left: num(1.0),
            right: num(2.0),
        };
        let product = FormulaExpr::BinaryOp {
            op: BinaryOperator::Multiply,
            left: Box::new(sum.clone()),
            right: num(3.0),
        };
        assert_eq!(product.to_string(), "(1 + 2) * 3");

        let nested_right = FormulaExpr::BinaryOp {
            op: BinaryOperator::Subtract,
            left: num(1.0),
            right: Box::new(sum),
        };
        assert_eq!(nested_right.to_string(), "1 - (1 + 2)");
    }

    #[test]
    fn test_print_literals() {
        assert_eq!(FormulaExpr::Number(2.5).to_string(), "2.5");
        assert_eq!(FormulaExpr::Number(10.0).to_string(), "10");
        assert_eq!(
            FormulaExpr::String("say \"hi\"".into()).to_string(),
            "\"say \"\"hi\"\"\""
        );
        assert_eq!(FormulaExpr::FieldRef("qty".into()).to_string(), "{qty}");
    }

    #[test]
    fn test_print_negated_group() {
        let expr = FormulaExpr::UnaryOp {
            op: UnaryOperator::Negate,
            operand: Box::new(FormulaExpr::BinaryOp {
                op: BinaryOperator::Add,
                left: num(1.0),
                right: num(2.0),
            }),
        };
        assert_eq!(expr.to_string(), "-(1 + 2)");
    }

    #[test]
    fn test_references_in_order() {
        let expr = FormulaExpr::Function {
            name: "SUM".into(),
            args: vec![
                FormulaExpr::FieldRef("b".into()),
                FormulaExpr::FieldRef("a".into()),
                FormulaExpr::FieldRef("b".into()),
            ],
        };
        let mut names = Vec::new();
        expr.for_each_reference(&mut |name| names.push(name));
        assert_eq!(names, vec!["b", "a", "b"]);
    }
}
