//! Query parameter and result models.

use serde::Serialize;
use std::collections::BTreeMap;

use crate::models::Value;

/// One result record: field name to normalized value.
pub type Record = BTreeMap<String, Value>;

/// Parameters bound to a statement.
///
/// PostgreSQL takes positional placeholders (`$1`, `$2`, ...); Neo4j takes
/// named placeholders (`$name`).
#[derive(Debug, Clone, PartialEq, Default)]
pub enum QueryParams {
    /// No parameters
    #[default]
    None,
    /// Values for `$1`, `$2`, ...
    Positional(Vec<Value>),
    /// Values for `$name` placeholders
    Named(BTreeMap<String, Value>),
}

impl QueryParams {
    /// Positional parameters, in placeholder order.
    pub fn positional<I, V>(values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self::Positional(values.into_iter().map(Into::into).collect())
    }

    /// Named parameters.
    pub fn named<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<Value>,
    {
        Self::Named(pairs.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }

    /// Number of bound values.
    pub fn len(&self) -> usize {
        match self {
            Self::None => 0,
            Self::Positional(values) => values.len(),
            Self::Named(values) => values.len(),
        }
    }

    /// Check if no values are bound.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Placeholder style, for diagnostics.
    pub fn style(&self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Positional(_) => "positional",
            Self::Named(_) => "named",
        }
    }
}

/// Normalized results from a statement.
#[derive(Debug, Clone, Default, Serialize)]
pub struct QueryResult {
    /// Column or field names in result order
    pub columns: Vec<String>,
    /// Result records
    pub records: Vec<Record>,
    /// Time to execute in milliseconds
    pub execution_time_ms: u64,
}

impl QueryResult {
    /// Get the number of records returned.
    pub fn row_count(&self) -> usize {
        self.records.len()
    }

    /// Check if the result is empty.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Get column names.
    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(String::as_str).collect()
    }

    /// First record, if any.
    pub fn first(&self) -> Option<&Record> {
        self.records.first()
    }

    /// Value of `column` in the first record.
    pub fn scalar(&self, column: &str) -> Option<&Value> {
        self.first()?.get(column)
    }

    /// Compare columns and records, ignoring timing.
    pub fn same_data(&self, other: &Self) -> bool {
        self.columns == other.columns && self.records == other.records
    }
}
