use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::types::{ColumnMeta, SqlValue};

/// Decoder applied to every value of a column with a given driver type.
pub type TypeParser = Arc<dyn Fn(&ColumnMeta, SqlValue) -> SqlValue + Send + Sync>;

/// Registry of value decoders keyed by driver column type name.
/// Lookups are case-insensitive.
#[derive(Clone, Default)]
pub struct TypeParserRegistry {
    parsers: HashMap<String, TypeParser>,
}

impl TypeParserRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with the DM defaults: CLOB columns are fetched as strings.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.refresh(
            "CLOB",
            Arc::new(|_: &ColumnMeta, value: SqlValue| fetch_as_string(value)),
        );
        registry
    }

    /// Registers or replaces the parser for `type_name`.
    pub fn refresh(&mut self, type_name: &str, parser: TypeParser) {
        self.parsers.insert(type_name.to_ascii_uppercase(), parser);
    }

    pub fn clear(&mut self) {
        self.parsers.clear();
    }

    pub fn get(&self, type_name: &str) -> Option<&TypeParser> {
        self.parsers.get(&type_name.to_ascii_uppercase())
    }

    /// Runs `value` through the parser for its column, or returns it as is.
    pub fn parse(&self, column: &ColumnMeta, value: SqlValue) -> SqlValue {
        match self.get(&column.type_name) {
            Some(parser) if !value.is_null() => parser(column, value),
            _ => value,
        }
    }

    pub fn len(&self) -> usize {
        self.parsers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.parsers.is_empty()
    }
}

impl fmt::Debug for TypeParserRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_set().entries(self.parsers.keys()).finish()
    }
}

fn fetch_as_string(value: SqlValue) -> SqlValue {
    match value {
        SqlValue::Bytes(bytes) => match String::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text),
            Err(e) => SqlValue::Bytes(e.into_bytes()),
        },
        SqlValue::Text(_) => value,
        other => SqlValue::Text(other.to_string()),
    }
}
