use std::sync::Arc;

use crate::traits::ExecuteOptions;
use crate::transaction::Transaction;
use crate::types::{Instance, ModelDefinition, OutFormat};

/// Shape of a statement, decided by the caller that generated it.
/// Selects how the driver response is normalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum QueryType {
    Select,
    Insert,
    Update,
    Upsert,
    BulkUpdate,
    BulkDelete,
    Describe,
    ShowIndexes,
    ShowTables,
    ShowConstraints,
    Version,
    ForeignKeys,
    Call,
    #[default]
    Raw,
    /// No dedicated shape; the bound instance is handed back.
    Other,
}

/// Per-statement execution options.
#[derive(Debug, Clone, Default)]
pub struct QueryOptions {
    pub query_type: QueryType,
    pub extended_meta_data: bool,
    pub out_format: OutFormat,
    pub result_set: bool,
    pub show_warnings: bool,
    /// Row limit, 0 for unbounded.
    pub max_rows: u32,
    /// Return only the first row of a select.
    pub plain: bool,
    pub model: Option<Arc<ModelDefinition>>,
    pub instance: Option<Instance>,
    pub transaction: Option<Transaction>,
}

impl QueryOptions {
    pub fn new(query_type: QueryType) -> Self {
        Self {
            query_type,
            ..Self::default()
        }
    }

    pub fn extended_meta_data(mut self, enabled: bool) -> Self {
        self.extended_meta_data = enabled;
        self
    }

    pub fn out_format(mut self, format: OutFormat) -> Self {
        self.out_format = format;
        self
    }

    pub fn result_set(mut self, enabled: bool) -> Self {
        self.result_set = enabled;
        self
    }

    pub fn show_warnings(mut self, enabled: bool) -> Self {
        self.show_warnings = enabled;
        self
    }

    pub fn max_rows(mut self, max_rows: u32) -> Self {
        self.max_rows = max_rows;
        self
    }

    pub fn plain(mut self, enabled: bool) -> Self {
        self.plain = enabled;
        self
    }

    pub fn model(mut self, model: Arc<ModelDefinition>) -> Self {
        self.model = Some(model);
        self
    }

    pub fn instance(mut self, instance: Instance) -> Self {
        self.instance = Some(instance);
        self
    }

    pub fn transaction(mut self, transaction: Transaction) -> Self {
        self.transaction = Some(transaction);
        self
    }

    pub(crate) fn execute_options(&self) -> ExecuteOptions {
        ExecuteOptions {
            extended_meta_data: self.extended_meta_data,
            out_format: self.out_format,
            result_set: self.result_set,
            max_rows: self.max_rows,
        }
    }
}
