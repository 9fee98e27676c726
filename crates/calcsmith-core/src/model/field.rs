//! Input fields of a calculator

use crate::error::{Error, Result};
use crate::value::InputValue;
use std::fmt;
use std::str::FromStr;

/// How a field gets its value
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub enum FieldKind {
    /// Typed in by the user
    Manual,
    /// Fetched from an external data source
    DatabaseLookup,
    /// Computed from its own expression
    Calculated,
}

/// External tables a lookup field can read from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum DataSource {
    /// Machine-hour rates
    #[cfg_attr(feature = "serde", serde(rename = "mhr"))]
    Mhr,
    /// Labour-hour rates
    #[cfg_attr(feature = "serde", serde(rename = "lhr"))]
    Lhr,
    #[cfg_attr(feature = "serde", serde(rename = "raw_materials"))]
    RawMaterials,
    #[cfg_attr(feature = "serde", serde(rename = "processes"))]
    Processes,
}

impl DataSource {
    /// All data sources, in wire-name order
    pub const ALL: [DataSource; 4] = [
        DataSource::Mhr,
        DataSource::Lhr,
        DataSource::RawMaterials,
        DataSource::Processes,
    ];

    /// Identifier used on the wire
    pub fn as_str(&self) -> &'static str {
        match self {
            DataSource::Mhr => "mhr",
            DataSource::Lhr => "lhr",
            DataSource::RawMaterials => "raw_materials",
            DataSource::Processes => "processes",
        }
    }
}

impl fmt::Display for DataSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for DataSource {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        DataSource::ALL
            .into_iter()
            .find(|source| source.as_str() == s)
            .ok_or_else(|| Error::UnknownDataSource(s.to_string()))
    }
}

/// A named input slot
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "camelCase"))]
pub struct Field {
    /// Identifier used inside `{name}` references
    pub name: String,
    /// Label shown on forms
    #[cfg_attr(feature = "serde", serde(default))]
    pub display_label: String,
    pub kind: FieldKind,
    /// Source table (lookup fields only)
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub data_source: Option<DataSource>,
    /// Column read from the source table (lookup fields only)
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub source_field: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub default_value: Option<InputValue>,
    /// Expression text (calculated fields only)
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub expression: Option<String>,
    #[cfg_attr(
        feature = "serde",
        serde(default, skip_serializing_if = "Option::is_none")
    )]
    pub unit: Option<String>,
    #[cfg_attr(feature = "serde", serde(default))]
    pub is_required: bool,
}

impl Field {
    fn with_kind(name: impl Into<String>, kind: FieldKind) -> Self {
        let name = name.into();
        Self {
            display_label: name.clone(),
            name,
            kind,
            data_source: None,
            source_field: None,
            default_value: None,
            expression: None,
            unit: None,
            is_required: false,
        }
    }

    /// Create a user-entered field
    pub fn manual(name: impl Into<String>) -> Self {
        Self::with_kind(name, FieldKind::Manual)
    }

    /// Create a field fetched from `source`, reading column `source_field`
    pub fn lookup(
        name: impl Into<String>,
        source: DataSource,
        source_field: impl Into<String>,
    ) -> Self {
        let mut field = Self::with_kind(name, FieldKind::DatabaseLookup);
        field.data_source = Some(source);
        field.source_field = Some(source_field.into());
        field
    }

    /// Create a field computed from `expression`
    pub fn calculated(name: impl Into<String>, expression: impl Into<String>) -> Self {
        let mut field = Self::with_kind(name, FieldKind::Calculated);
        field.expression = Some(expression.into());
        field
    }

    /// Set the display label
    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.display_label = label.into();
        self
    }

    /// Set the default value
    pub fn with_default(mut self, value: impl Into<InputValue>) -> Self {
        self.default_value = Some(value.into());
        self
    }

    /// Set the unit shown next to the value
    pub fn with_unit(mut self, unit: impl Into<String>) -> Self {
        self.unit = Some(unit.into());
        self
    }

    /// Mark the field as required
    pub fn required(mut self) -> Self {
        self.is_required = true;
        self
    }

    /// Expression text of a calculated field, `None` when blank
    pub fn expression_text(&self) -> Option<&str> {
        self.expression
            .as_deref()
            .filter(|expr| !expr.trim().is_empty())
    }

    /// Check a name against `[A-Za-z_][A-Za-z0-9_]*`
    pub fn is_valid_name(name: &str) -> bool {
        let mut chars = name.chars();
        match chars.next() {
            Some(c) if c.is_ascii_alphabetic() || c == '_' => {}
            _ => return false,
        }
        chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
    }

    /// Check the field's own invariants
    pub fn check(&self) -> Result<()> {
        if !Self::is_valid_name(&self.name) {
            return Err(Error::InvalidName(self.name.clone()));
        }
        if self.kind == FieldKind::DatabaseLookup
            && (self.data_source.is_none()
                || self.source_field.as_deref().map_or(true, str::is_empty))
        {
            return Err(Error::IncompleteLookup(self.name.clone()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_names() {
        assert!(Field::is_valid_name("qty"));
        assert!(Field::is_valid_name("_hidden"));
        assert!(Field::is_valid_name("rate_2"));
        assert!(!Field::is_valid_name(""));
        assert!(!Field::is_valid_name("2rate"));
        assert!(!Field::is_valid_name("unit price"));
        assert!(!Field::is_valid_name("größe"));
    }

    #[test]
    fn test_data_source_parse() {
        assert_eq!("raw_materials".parse::<DataSource>(), Ok(DataSource::RawMaterials));
        assert_eq!(DataSource::Lhr.to_string(), "lhr");
        assert_eq!(
            "plants".parse::<DataSource>(),
            Err(Error::UnknownDataSource("plants".into()))
        );
    }

    #[test]
    fn test_check_incomplete_lookup() {
        let mut field = Field::lookup("rate", DataSource::Mhr, "rate");
        assert!(field.check().is_ok());

        field.source_field = Some(String::new());
        assert_eq!(field.check(), Err(Error::IncompleteLookup("rate".into())));
    }

    #[test]
    fn test_blank_expression() {
        let field = Field::calculated("area", "   ");
        assert_eq!(field.expression_text(), None);
        let field = Field::calculated("area", "{w} * {h}");
        assert_eq!(field.expression_text(), Some("{w} * {h}"));
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_field_from_json() {
        let field: Field = serde_json::from_str(
            r#"{
                "name": "steel",
                "kind": "databaseLookup",
                "dataSource": "raw_materials",
                "sourceField": "price_per_kg",
                "defaultValue": "S235"
            }"#,
        )
        .unwrap();

        assert_eq!(field.kind, FieldKind::DatabaseLookup);
        assert_eq!(field.data_source, Some(DataSource::RawMaterials));
        assert_eq!(field.default_value, Some(InputValue::Text("S235".into())));
        assert_eq!(field.display_label, "");
        assert!(!field.is_required);
    }
}
