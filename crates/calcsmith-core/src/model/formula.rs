//! Output formulas

use std::collections::BTreeSet;

/// How a formula's numeric result is rendered
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum DisplayFormat {
    /// `1,234.50`
    #[default]
    Number,
    /// `$1,234.50`
    Currency,
    /// `12.50%` (the value is already a percentage)
    Percentage,
}

/// A named output expression
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Formula {
    pub name: String,
    pub expression: String,
    /// Tie-break hint; the dependency order always wins
    #[cfg_attr(feature = "serde", serde(default))]
    pub execution_order: i32,
    #[cfg_attr(feature = "serde", serde(default = "default_decimal_places"))]
    pub decimal_places: u32,
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_format: DisplayFormat,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_primary_result: bool,
    /// Fields this formula references (derived)
    #[cfg_attr(feature = "serde", serde(default))]
    pub depends_on_fields: BTreeSet<String>,
    /// Formulas this formula references (derived)
    #[cfg_attr(feature = "serde", serde(default))]
    pub depends_on_formulas: BTreeSet<String>,
}

#[cfg(feature = "serde")]
fn default_decimal_places() -> u32 {
    Formula::DEFAULT_DECIMAL_PLACES
}

impl Formula {
    /// Decimal places used when none are configured
    pub const DEFAULT_DECIMAL_PLACES: u32 = 2;

    /// Create a formula with default display settings
    pub fn new(name: impl Into<String>, expression: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            expression: expression.into(),
            execution_order: 0,
            decimal_places: Self::DEFAULT_DECIMAL_PLACES,
            display_format: DisplayFormat::Number,
            is_primary_result: false,
            depends_on_fields: BTreeSet::new(),
            depends_on_formulas: BTreeSet::new(),
        }
    }

    pub fn with_order(mut self, order: i32) -> Self {
        self.execution_order = order;
        self
    }

    pub fn with_decimal_places(mut self, places: u32) -> Self {
        self.decimal_places = places;
        self
    }

    pub fn with_format(mut self, format: DisplayFormat) -> Self {
        self.display_format = format;
        self
    }

    /// Flag this formula as the calculator's headline result
    pub fn primary(mut self) -> Self {
        self.is_primary_result = true;
        self
    }
}
