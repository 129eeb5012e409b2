use std::collections::{BTreeMap, HashMap};

use crate::types::SqlValue;

/// A declared unique constraint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UniqueKey {
    pub fields: Vec<String>,
    /// Custom message reported on violation.
    pub msg: Option<String>,
}

impl UniqueKey {
    pub fn new<S: Into<String>>(fields: impl IntoIterator<Item = S>) -> Self {
        Self {
            fields: fields.into_iter().map(Into::into).collect(),
            msg: None,
        }
    }

    pub fn with_message(mut self, msg: impl Into<String>) -> Self {
        self.msg = Some(msg.into());
        self
    }
}

/// Model metadata the executor needs from the data-access layer.
#[derive(Debug, Clone, Default)]
pub struct ModelDefinition {
    pub name: String,
    pub table: String,
    /// Primary key attribute.
    pub primary_key: Option<String>,
    /// Auto-increment attribute.
    pub auto_increment: Option<String>,
    /// Attribute name to column name, for attributes whose column differs.
    pub fields: HashMap<String, String>,
    /// Declared unique constraints keyed by constraint name.
    pub unique_keys: HashMap<String, UniqueKey>,
}

impl ModelDefinition {
    pub fn new(name: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            table: table.into(),
            ..Self::default()
        }
    }

    pub fn primary_key(mut self, attribute: impl Into<String>) -> Self {
        self.primary_key = Some(attribute.into());
        self
    }

    pub fn auto_increment(mut self, attribute: impl Into<String>) -> Self {
        self.auto_increment = Some(attribute.into());
        self
    }

    pub fn field(mut self, attribute: impl Into<String>, column: impl Into<String>) -> Self {
        self.fields.insert(attribute.into(), column.into());
        self
    }

    pub fn unique_key(mut self, name: impl Into<String>, key: UniqueKey) -> Self {
        self.unique_keys.insert(name.into(), key);
        self
    }

    /// Column name backing `attribute`.
    pub fn field_name<'a>(&'a self, attribute: &'a str) -> &'a str {
        self.fields
            .get(attribute)
            .map(String::as_str)
            .unwrap_or(attribute)
    }

    /// Column of the primary key when it is also the auto-increment attribute.
    pub fn auto_increment_primary_key_field(&self) -> Option<&str> {
        match (&self.primary_key, &self.auto_increment) {
            (Some(pk), Some(ai)) if pk == ai => Some(self.field_name(pk)),
            _ => None,
        }
    }
}

/// An entity instance bound to a query, as attribute values.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Instance {
    values: BTreeMap<String, SqlValue>,
}

impl Instance {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with(mut self, attribute: impl Into<String>, value: impl Into<SqlValue>) -> Self {
        self.set(attribute, value);
        self
    }

    pub fn set(&mut self, attribute: impl Into<String>, value: impl Into<SqlValue>) {
        self.values.insert(attribute.into(), value.into());
    }

    pub fn get(&self, attribute: &str) -> Option<&SqlValue> {
        self.values.get(attribute)
    }

    /// True when the attribute holds a non-NULL value.
    pub fn has(&self, attribute: &str) -> bool {
        self.get(attribute).is_some_and(|v| !v.is_null())
    }

    pub fn values(&self) -> &BTreeMap<String, SqlValue> {
        &self.values
    }
}
