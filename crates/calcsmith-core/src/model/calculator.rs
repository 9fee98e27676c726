//! The calculator: unit of validation and execution

use super::{Field, FieldKind, Formula};
use crate::value::InputValue;
use std::collections::BTreeSet;
use std::hash::{Hash, Hasher};

/// A named bundle of fields and formulas
#[derive(Debug, Clone, PartialEq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Calculator {
    #[cfg_attr(feature = "serde", serde(default))]
    pub id: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub name: String,
    #[cfg_attr(feature = "serde", serde(default))]
    pub fields: Vec<Field>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub formulas: Vec<Formula>,
}

impl Calculator {
    /// Create an empty calculator
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            fields: Vec::new(),
            formulas: Vec::new(),
        }
    }

    /// Add a field (builder style)
    pub fn with_field(mut self, field: Field) -> Self {
        self.fields.push(field);
        self
    }

    /// Add a formula (builder style)
    pub fn with_formula(mut self, formula: Formula) -> Self {
        self.formulas.push(formula);
        self
    }

    /// Every name an expression may reference
    pub fn known_names(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .map(|f| f.name.clone())
            .chain(self.formulas.iter().map(|f| f.name.clone()))
            .collect()
    }

    /// Get a field by name
    pub fn field(&self, name: &str) -> Option<&Field> {
        self.fields.iter().find(|f| f.name == name)
    }

    /// Get a formula by name
    pub fn formula(&self, name: &str) -> Option<&Formula> {
        self.formulas.iter().find(|f| f.name == name)
    }

    /// The first formula flagged as primary result
    pub fn primary_result(&self) -> Option<&Formula> {
        self.formulas.iter().find(|f| f.is_primary_result)
    }

    /// Calculated fields whose expression is missing or blank
    pub fn empty_calculated_fields(&self) -> BTreeSet<String> {
        self.fields
            .iter()
            .filter(|f| f.kind == FieldKind::Calculated && f.expression_text().is_none())
            .map(|f| f.name.clone())
            .collect()
    }

    /// Content hash of everything that affects execution
    ///
    /// Labels, units and the derived dependency sets are left out. Equal
    /// definitions always hash equal; callers still compare on a hit.
    pub fn definition_hash(&self) -> u64 {
        let mut hasher = ahash::AHasher::default();

        self.fields.len().hash(&mut hasher);
        for field in &self.fields {
            field.name.hash(&mut hasher);
            field.kind.hash(&mut hasher);
            field.data_source.hash(&mut hasher);
            field.source_field.hash(&mut hasher);
            hash_input(field.default_value.as_ref(), &mut hasher);
            field.expression.hash(&mut hasher);
            field.is_required.hash(&mut hasher);
        }

        self.formulas.len().hash(&mut hasher);
        for formula in &self.formulas {
            formula.name.hash(&mut hasher);
            formula.expression.hash(&mut hasher);
            formula.execution_order.hash(&mut hasher);
            formula.decimal_places.hash(&mut hasher);
            formula.display_format.hash(&mut hasher);
        }

        hasher.finish()
    }

    /// Compare two definitions on the same inputs as [`definition_hash`](Self::definition_hash)
    pub fn same_definition(&self, other: &Calculator) -> bool {
        self.fields.len() == other.fields.len()
            && self.formulas.len() == other.formulas.len()
            && self.fields.iter().zip(&other.fields).all(|(a, b)| {
                a.name == b.name
                    && a.kind == b.kind
                    && a.data_source == b.data_source
                    && a.source_field == b.source_field
                    && a.default_value == b.default_value
                    && a.expression == b.expression
                    && a.is_required == b.is_required
            })
            && self.formulas.iter().zip(&other.formulas).all(|(a, b)| {
                a.name == b.name
                    && a.expression == b.expression
                    && a.execution_order == b.execution_order
                    && a.decimal_places == b.decimal_places
                    && a.display_format == b.display_format
            })
    }
}

fn hash_input<H: Hasher>(value: Option<&InputValue>, hasher: &mut H) {
    match value {
        None => 0u8.hash(hasher),
        Some(InputValue::Number(n)) => {
            1u8.hash(hasher);
            n.to_bits().hash(hasher);
        }
        Some(InputValue::Text(s)) => {
            2u8.hash(hasher);
            s.hash(hasher);
        }
    }
}
