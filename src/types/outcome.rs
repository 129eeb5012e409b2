use std::collections::BTreeMap;

use crate::types::{Instance, OutRow, QueryResult, SqlValue};

/// One column of a described table.
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnDescription {
    /// Uppercased type, e.g. `VARCHAR(32)` or `ENUM('a','b')`.
    pub type_name: String,
    pub allow_null: bool,
    pub default_value: Option<SqlValue>,
    pub primary_key: bool,
    pub auto_increment: bool,
    pub comment: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IndexOrder {
    Asc,
}

/// One column of an index.
#[derive(Debug, Clone, PartialEq)]
pub struct IndexField {
    pub attribute: String,
    /// Indexed prefix length.
    pub length: Option<i64>,
    /// `None` when the server reports no collation.
    pub order: Option<IndexOrder>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct IndexDescription {
    pub name: String,
    pub primary: bool,
    pub unique: bool,
    pub table_name: Option<String>,
    pub index_type: Option<String>,
    /// Columns in index order.
    pub fields: Vec<IndexField>,
}

/// What an INSERT or UPDATE produced besides its row count.
#[derive(Debug, Clone, PartialEq)]
pub enum WriteTarget {
    /// Nothing was bound and nothing could be reconstructed.
    None,
    /// The bound instance, possibly with generated keys filled in.
    Entity(Instance),
    /// One row per inserted record, keyed by the primary key column.
    Rows(Vec<OutRow>),
    InsertId(Option<u64>),
}

/// Normalized result of a statement, shaped by its [`QueryType`](crate::query::QueryType).
#[derive(Debug, Clone, PartialEq)]
pub enum QueryOutcome {
    /// Select and procedure call rows.
    Rows(Vec<OutRow>),
    /// First row of a plain select.
    Row(Option<OutRow>),
    Written {
        target: WriteTarget,
        rows_affected: u64,
    },
    /// Bulk update and bulk delete.
    Affected(u64),
    /// `created` is true when the upsert inserted a row.
    Upserted {
        instance: Option<Instance>,
        created: bool,
    },
    Columns(BTreeMap<String, ColumnDescription>),
    Indexes(Vec<IndexDescription>),
    Tables(Vec<String>),
    Version(Option<String>),
    /// Driver-shaped passthrough for introspection and raw statements.
    Raw(QueryResult),
    /// Statements with no dedicated shape hand back the bound instance.
    Entity(Option<Instance>),
}
