use std::sync::Arc;

use crate::error::{DmRsError, Result};
use crate::types::{SqlValue, TypeParserRegistry};

/// Column descriptor reported by the driver.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnMeta {
    pub name: String,
    /// Driver type name, e.g. `BIGINT` or `CLOB`.
    pub type_name: String,
}

impl ColumnMeta {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
        }
    }
}

/// One result set as delivered by the driver.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ResultSet {
    pub columns: Vec<ColumnMeta>,
    pub rows: Vec<Vec<SqlValue>>,
}

impl ResultSet {
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self { columns, rows }
    }
}

/// Driver-agnostic raw response from a statement execution.
/// Statements that produce no rows (INSERT, UPDATE, ...) carry no result set.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawQueryResult {
    pub result_sets: Vec<ResultSet>,
    pub rows_affected: u64,
    pub insert_id: Option<u64>,
    /// Number of warnings the server raised for the statement.
    pub warning_status: u16,
}

impl RawQueryResult {
    /// A response holding a single result set.
    pub fn new(columns: Vec<ColumnMeta>, rows: Vec<Vec<SqlValue>>) -> Self {
        Self {
            rows_affected: rows.len() as u64,
            result_sets: vec![ResultSet::new(columns, rows)],
            ..Self::default()
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    /// A response with no rows, only the execution header.
    pub fn header(rows_affected: u64, insert_id: Option<u64>) -> Self {
        Self {
            rows_affected,
            insert_id,
            ..Self::default()
        }
    }

    /// True when the driver returned only an execution header.
    pub fn is_header(&self) -> bool {
        self.result_sets.is_empty()
    }
}

/// A single materialized row. Column names are shared by all rows of a set.
#[derive(Debug, Clone, PartialEq)]
pub struct Row {
    columns: Arc<[String]>,
    values: Vec<SqlValue>,
}

impl Row {
    /// Creates a new Row from column names and values.
    pub fn new(columns: Arc<[String]>, values: Vec<SqlValue>) -> Self {
        Self { columns, values }
    }

    /// Builds a row from `(column, value)` pairs.
    pub fn from_pairs<K: Into<String>>(pairs: impl IntoIterator<Item = (K, SqlValue)>) -> Self {
        let (columns, values): (Vec<String>, Vec<SqlValue>) =
            pairs.into_iter().map(|(k, v)| (k.into(), v)).unzip();
        Self {
            columns: columns.into(),
            values,
        }
    }

    /// Gets a value by column name.
    pub fn get(&self, column: &str) -> Result<&SqlValue> {
        self.value(column)
            .ok_or_else(|| DmRsError::ColumnNotFound(column.to_string()))
    }

    /// Gets a value by column name, `None` when the column is absent.
    pub fn value(&self, column: &str) -> Option<&SqlValue> {
        self.columns
            .iter()
            .position(|c| c == column)
            .map(|i| &self.values[i])
    }

    /// Returns all column names in this row.
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[SqlValue] {
        &self.values
    }

    pub(crate) fn values_mut(&mut self) -> &mut [SqlValue] {
        &mut self.values
    }

    pub fn into_values(self) -> Vec<SqlValue> {
        self.values
    }

    /// Iterates `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &SqlValue)> {
        self.columns
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    /// Returns the number of columns in this row.
    pub fn len(&self) -> usize {
        self.values.len()
    }

    /// Returns true if this row has no columns.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Row shape selector for returned rows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutFormat {
    /// Rows keyed by column name.
    #[default]
    Object,
    /// Rows as bare value tuples in column order.
    Array,
}

/// A row projected to the caller's requested shape.
#[derive(Debug, Clone, PartialEq)]
pub enum OutRow {
    Object(Row),
    Array(Vec<SqlValue>),
}

impl OutRow {
    pub fn project(row: Row, format: OutFormat) -> Self {
        match format {
            OutFormat::Object => OutRow::Object(row),
            OutFormat::Array => OutRow::Array(row.into_values()),
        }
    }

    /// Value by column name. Array rows carry no names.
    pub fn get(&self, column: &str) -> Option<&SqlValue> {
        match self {
            OutRow::Object(row) => row.value(column),
            OutRow::Array(_) => None,
        }
    }

    pub fn values(&self) -> &[SqlValue] {
        match self {
            OutRow::Object(row) => row.values(),
            OutRow::Array(values) => values,
        }
    }
}

/// Canonical result of a statement execution.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct QueryResult {
    rows: Vec<Row>,
    more_results: Vec<Vec<Row>>,
    pub rows_affected: u64,
    pub insert_id: Option<u64>,
    /// Column descriptors, present when extended metadata was requested.
    pub metadata: Option<Vec<ColumnMeta>>,
    pub warnings: Vec<String>,
}

impl QueryResult {
    /// Creates a QueryResult from a RawQueryResult, running every value
    /// through the parser registered for its column type.
    pub fn from_raw(raw: RawQueryResult, parsers: &TypeParserRegistry, metadata: bool) -> Self {
        let mut sets = raw.result_sets.into_iter().map(|set| {
            let names: Arc<[String]> = set.columns.iter().map(|c| c.name.clone()).collect();
            let rows = set
                .rows
                .into_iter()
                .map(|values| {
                    let values = values
                        .into_iter()
                        .zip(set.columns.iter())
                        .map(|(value, column)| parsers.parse(column, value))
                        .collect();
                    Row::new(Arc::clone(&names), values)
                })
                .collect::<Vec<_>>();
            (set.columns, rows)
        });
        let (columns, rows) = sets.next().unwrap_or_default();
        Self {
            rows,
            more_results: sets.map(|(_, rows)| rows).collect(),
            rows_affected: raw.rows_affected,
            insert_id: raw.insert_id,
            metadata: metadata.then_some(columns),
            warnings: Vec::new(),
        }
    }

    /// Returns all rows of the first result set.
    pub fn rows(self) -> Vec<Row> {
        self.rows
    }

    /// Returns a reference to the rows without consuming the result.
    pub fn rows_ref(&self) -> &[Row] {
        &self.rows
    }

    pub(crate) fn rows_mut(&mut self) -> &mut Vec<Row> {
        &mut self.rows
    }

    /// Result sets after the first one, as returned by procedure calls.
    pub fn more_results(&self) -> &[Vec<Row>] {
        &self.more_results
    }

    /// Returns the number of rows in the first result set.
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    /// Returns true if the first result set contains no rows.
    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}
