//! Built-in calculator functions

pub mod logical;
pub mod math;
pub mod statistical;

use crate::ast::FormulaExpr;
use crate::error::EvalResult;
use crate::evaluator::EvaluationContext;
use ahash::AHashMap;
use calcsmith_core::Value;
use once_cell::sync::Lazy;
use std::fmt;

/// Function over already-evaluated arguments
pub type EagerFn = fn(&[Value]) -> EvalResult<Value>;

/// Function that decides which of its arguments to evaluate
pub type LazyFn = fn(&[FormulaExpr], &EvaluationContext) -> EvalResult<Value>;

/// How a function is invoked
#[derive(Clone, Copy)]
pub enum Implementation {
    Eager(EagerFn),
    Lazy(LazyFn),
}

/// Function category, shown in suggestions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum FunctionCategory {
    Math,
    Logical,
    Statistical,
}

impl fmt::Display for FunctionCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            FunctionCategory::Math => "Math",
            FunctionCategory::Logical => "Logical",
            FunctionCategory::Statistical => "Statistical",
        })
    }
}

/// Function definition
pub struct FunctionDef {
    /// Function name (uppercase)
    pub name: &'static str,
    pub category: FunctionCategory,
    /// Minimum arguments
    pub min_args: usize,
    /// Maximum arguments (None = unlimited)
    pub max_args: Option<usize>,
    /// Call shape, e.g. `ROUND(number, places)`
    pub signature: &'static str,
    pub description: &'static str,
    /// Implementation
    pub implementation: Implementation,
}

impl FunctionDef {
    /// Check an argument count against the arity contract
    pub fn accepts(&self, count: usize) -> bool {
        count >= self.min_args && self.max_args.map_or(true, |max| count <= max)
    }

    /// Human readable arity, e.g. `exactly 2` or `at least 1`
    pub fn arity(&self) -> String {
        match self.max_args {
            Some(max) if max == self.min_args => format!("exactly {}", max),
            Some(max) => format!("{} to {}", self.min_args, max),
            None => format!("at least {}", self.min_args),
        }
    }
}

impl fmt::Debug for FunctionDef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionDef")
            .field("name", &self.name)
            .field("category", &self.category)
            .field("min_args", &self.min_args)
            .field("max_args", &self.max_args)
            .finish()
    }
}

/// Function registry
pub struct FunctionRegistry {
    functions: AHashMap<String, FunctionDef>,
}

static REGISTRY: Lazy<FunctionRegistry> = Lazy::new(FunctionRegistry::new);

/// The process-wide registry of built-in functions
pub fn registry() -> &'static FunctionRegistry {
    &REGISTRY
}

impl FunctionRegistry {
    /// Create a new registry with all built-in functions
    pub fn new() -> Self {
        let mut registry = Self {
            functions: AHashMap::new(),
        };

        registry.register_statistical_functions();
        registry.register_math_functions();
        registry.register_logical_functions();

        registry
    }

    /// Look up a function by name (case-insensitive)
    pub fn get(&self, name: &str) -> Option<&FunctionDef> {
        self.functions.get(&name.to_uppercase())
    }

    /// Register a function
    pub fn register(&mut self, def: FunctionDef) {
        self.functions.insert(def.name.to_uppercase(), def);
    }

    /// Functions whose name starts with `prefix` (case-insensitive), sorted by name
    pub fn by_prefix(&self, prefix: &str) -> Vec<&FunctionDef> {
        let upper = prefix.to_ascii_uppercase();
        let mut found: Vec<&FunctionDef> = self
            .functions
            .values()
            .filter(|f| f.name.starts_with(&upper))
            .collect();
        found.sort_by_key(|f| f.name);
        found
    }

    /// All registered names, sorted
    pub fn names(&self) -> Vec<&'static str> {
        let mut names: Vec<&'static str> = self.functions.values().map(|f| f.name).collect();
        names.sort_unstable();
        names
    }

    fn register_statistical_functions(&mut self) {
        self.register(FunctionDef {
            name: "SUM",
            category: FunctionCategory::Statistical,
            min_args: 1,
            max_args: None,
            signature: "SUM(value1, value2, ...)",
            description: "Adds all of its arguments",
            implementation: Implementation::Eager(statistical::fn_sum),
        });

        self.register(FunctionDef {
            name: "AVG",
            category: FunctionCategory::Statistical,
            min_args: 1,
            max_args: None,
            signature: "AVG(value1, value2, ...)",
            description: "Arithmetic mean of its arguments",
            implementation: Implementation::Eager(statistical::fn_avg),
        });

        self.register(FunctionDef {
            name: "MIN",
            category: FunctionCategory::Statistical,
            min_args: 1,
            max_args: None,
            signature: "MIN(value1, value2, ...)",
            description: "Smallest of its arguments",
            implementation: Implementation::Eager(statistical::fn_min),
        });

        self.register(FunctionDef {
            name: "MAX",
            category: FunctionCategory::Statistical,
            min_args: 1,
            max_args: None,
            signature: "MAX(value1, value2, ...)",
            description: "Largest of its arguments",
            implementation: Implementation::Eager(statistical::fn_max),
        });
    }

    fn register_math_functions(&mut self) {
        self.register(FunctionDef {
            name: "ROUND",
            category: FunctionCategory::Math,
            min_args: 2,
            max_args: Some(2),
            signature: "ROUND(number, places)",
            description: "Rounds half away from zero to a whole number of decimal places",
            implementation: Implementation::Eager(math::fn_round),
        });

        self.register(FunctionDef {
            name: "ABS",
            category: FunctionCategory::Math,
            min_args: 1,
            max_args: Some(1),
            signature: "ABS(number)",
            description: "Absolute value",
            implementation: Implementation::Eager(math::fn_abs),
        });

        self.register(FunctionDef {
            name: "SQRT",
            category: FunctionCategory::Math,
            min_args: 1,
            max_args: Some(1),
            signature: "SQRT(number)",
            description: "Square root of a non-negative number",
            implementation: Implementation::Eager(math::fn_sqrt),
        });

        self.register(FunctionDef {
            name: "POW",
            category: FunctionCategory::Math,
            min_args: 2,
            max_args: Some(2),
            signature: "POW(base, exponent)",
            description: "Raises base to the power of exponent",
            implementation: Implementation::Eager(math::fn_pow),
        });
    }

    fn register_logical_functions(&mut self) {
        self.register(FunctionDef {
            name: "IF",
            category: FunctionCategory::Logical,
            min_args: 3,
            max_args: Some(3),
            signature: "IF(condition, when_true, when_false)",
            description: "Evaluates only the branch selected by the condition",
            implementation: Implementation::Lazy(logical::fn_if),
        });
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::new()
    }
}
