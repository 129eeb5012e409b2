mod model;
mod outcome;
mod parsers;
mod row;
mod sql_value;

pub use model::{Instance, ModelDefinition, UniqueKey};
pub use outcome::{
    ColumnDescription, IndexDescription, IndexField, IndexOrder, QueryOutcome, WriteTarget,
};
pub use parsers::{TypeParser, TypeParserRegistry};
pub use row::{ColumnMeta, OutFormat, OutRow, QueryResult, RawQueryResult, ResultSet, Row};
pub use sql_value::SqlValue;
