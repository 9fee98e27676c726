//! External data lookups for `DatabaseLookup` fields

use calcsmith_core::{DataSource, InputValue, Value};
use std::collections::BTreeMap;
use std::future::Future;
use thiserror::Error;

/// Why a lookup produced no value
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LookupError {
    /// No such record, or the record has no such field
    #[error("No '{field}' for record '{record_id}' in {data_source}")]
    NotFound {
        data_source: DataSource,
        record_id: String,
        field: String,
    },

    /// The data source could not be reached
    #[error("Data source unavailable: {0}")]
    Unavailable(String),
}

/// Supplies values for lookup fields
///
/// This is the only place execution suspends. Implementations must be
/// deterministic for executions to be repeatable.
pub trait LookupProvider: Sync {
    fn lookup(
        &self,
        source: DataSource,
        record_id: &str,
        field: &str,
    ) -> impl Future<Output = Result<Value, LookupError>> + Send;
}

/// In-memory lookup tables
///
/// Deserializes from `{ "mhr": { "<recordId>": { "<field>": value } } }`.
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(transparent))]
pub struct StaticLookup {
    tables: BTreeMap<DataSource, BTreeMap<String, BTreeMap<String, InputValue>>>,
}

impl StaticLookup {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add one value (builder style)
    pub fn with(
        mut self,
        source: DataSource,
        record_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<InputValue>,
    ) -> Self {
        self.insert(source, record_id, field, value);
        self
    }

    /// Add one value
    pub fn insert(
        &mut self,
        source: DataSource,
        record_id: impl Into<String>,
        field: impl Into<String>,
        value: impl Into<InputValue>,
    ) {
        self.tables
            .entry(source)
            .or_default()
            .entry(record_id.into())
            .or_default()
            .insert(field.into(), value.into());
    }

    /// Synchronous lookup
    pub fn get(&self, source: DataSource, record_id: &str, field: &str) -> Option<&InputValue> {
        self.tables.get(&source)?.get(record_id)?.get(field)
    }
}

impl LookupProvider for StaticLookup {
    fn lookup(
        &self,
        source: DataSource,
        record_id: &str,
        field: &str,
    ) -> impl Future<Output = Result<Value, LookupError>> + Send {
        let result = self
            .get(source, record_id, field)
            .cloned()
            .map(Value::from)
            .ok_or_else(|| LookupError::NotFound {
                data_source: source,
                record_id: record_id.to_string(),
                field: field.to_string(),
            });
        std::future::ready(result)
    }
}
