//! Record store capability.
//!
//! The service never talks to a backend directly; it is handed a
//! [`RecordStore`] and works in terms of table rows.

mod file;
mod rest;

pub use file::FileStore;
pub use rest::RestStore;

use crate::errors::StoreError;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use std::cmp::Ordering;

pub type Row = Map<String, Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Table {
    Students,
    Attendances,
}

impl Table {
    pub fn name(&self) -> &'static str {
        match self {
            Table::Students => "students",
            Table::Attendances => "attendances",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Filter {
    Eq(&'static str, Value),
    Gte(&'static str, Value),
    NotNull(&'static str),
}

impl Filter {
    pub fn equals(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Eq(column, value.into())
    }

    pub fn at_least(column: &'static str, value: impl Into<Value>) -> Self {
        Filter::Gte(column, value.into())
    }

    pub fn column(&self) -> &'static str {
        match self {
            Filter::Eq(column, _) | Filter::Gte(column, _) | Filter::NotNull(column) => column,
        }
    }

    pub fn matches(&self, row: &Row) -> bool {
        let field = row.get(self.column()).filter(|value| !value.is_null());
        match (self, field) {
            (Filter::NotNull(_), field) => field.is_some(),
            (_, None) => false,
            (Filter::Eq(_, expected), Some(actual)) => {
                compare_values(actual, expected) == Some(Ordering::Equal)
            }
            (Filter::Gte(_, bound), Some(actual)) => matches!(
                compare_values(actual, bound),
                Some(Ordering::Greater | Ordering::Equal)
            ),
        }
    }
}

/// Compares JSON scalars the way a table backend would: numbers
/// numerically, timestamps as instants, other strings lexically.
pub fn compare_values(left: &Value, right: &Value) -> Option<Ordering> {
    match (left, right) {
        (Value::Number(a), Value::Number(b)) => a.as_f64()?.partial_cmp(&b.as_f64()?),
        (Value::String(a), Value::String(b)) => {
            match (
                crate::stats::parse_timestamp(a),
                crate::stats::parse_timestamp(b),
            ) {
                (Ok(a), Ok(b)) => Some(a.cmp(&b)),
                _ => Some(a.cmp(b)),
            }
        }
        (Value::Bool(a), Value::Bool(b)) => Some(a.cmp(b)),
        _ => None,
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Query {
    pub filters: Vec<Filter>,
}

impl Query {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn filter(mut self, filter: Filter) -> Self {
        self.filters.push(filter);
        self
    }
}

#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Short backend label for health output and logs.
    fn kind(&self) -> &'static str;

    async fn query(&self, table: Table, query: &Query) -> Result<Vec<Row>, StoreError>;

    /// Inserts `row` and returns it as stored, including the assigned `id`.
    async fn insert(&self, table: Table, row: Row) -> Result<Row, StoreError>;

    /// Applies `patch` to every matching row and returns how many changed.
    async fn update(
        &self,
        table: Table,
        filters: &[Filter],
        patch: Row,
    ) -> Result<usize, StoreError>;

    async fn delete(&self, table: Table, filters: &[Filter]) -> Result<usize, StoreError>;
}

pub fn from_row<T: DeserializeOwned>(table: Table, row: Row) -> Result<T, StoreError> {
    serde_json::from_value(Value::Object(row)).map_err(|err| StoreError::InvalidRow {
        table: table.name(),
        message: err.to_string(),
    })
}
