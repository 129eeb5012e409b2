use std::sync::Arc;
use std::time::Instant;

use crate::connection::Connection;
use crate::error::{DmRsError, DriverError, Result};
use crate::error_format::{format_error, ER_DEADLOCK};
use crate::query::bind::{format_bind_parameters, Parameters};
use crate::query::normalize;
use crate::query::options::{QueryOptions, QueryType};
use crate::traits::ExecuteOptions;
use crate::transaction::TransactionState;
use crate::types::{
    OutRow, QueryOutcome, QueryResult, RawQueryResult, Row, SqlValue, WriteTarget,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryState {
    Pending,
    Executing,
    Succeeded,
    Failed,
}

/// Runs one statement on a connection and normalizes its response
/// according to the statement's [`QueryType`].
///
/// # Example
/// ```ignore
/// let mut query = QueryExecutor::new(connection, QueryOptions::new(QueryType::Select));
/// let outcome = query
///     .run("SELECT * FROM users WHERE id = $1", &Parameters::positional([1]))
///     .await?;
/// ```
pub struct QueryExecutor {
    connection: Connection,
    options: QueryOptions,
    state: QueryState,
    warnings: Vec<String>,
}

impl QueryExecutor {
    pub fn new(connection: Connection, options: QueryOptions) -> Self {
        Self {
            connection,
            options,
            state: QueryState::Pending,
            warnings: Vec::new(),
        }
    }

    pub fn state(&self) -> QueryState {
        self.state
    }

    pub fn options(&self) -> &QueryOptions {
        &self.options
    }

    pub fn connection(&self) -> &Connection {
        &self.connection
    }

    /// Warnings fetched after the last run, when `show_warnings` was set.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    /// Executes `sql` with `parameters` bound to its placeholders.
    ///
    /// A deadlock inside a transaction rolls the transaction back before
    /// the original error is returned. Nothing is retried.
    pub async fn run(&mut self, sql: &str, parameters: &Parameters) -> Result<QueryOutcome> {
        let id = self.connection.id();
        if !self.connection.is_usable() {
            self.state = QueryState::Failed;
            return Err(DmRsError::ConnectionRetired(id.to_string()));
        }

        let (sql, bind) = format_bind_parameters(sql, parameters);
        let bind = bind.unwrap_or_default();
        self.state = QueryState::Executing;
        self.warnings.clear();
        log::debug!("Executing ({}): {}", id, sql);
        if !bind.is_empty() {
            log::debug!("Parameters ({}): {:?}", id, bind);
        }

        let started = Instant::now();
        let response = self
            .connection
            .session()
            .execute(&sql, &bind, &self.options.execute_options())
            .await;
        log::debug!("Executed ({}) in {:?}", id, started.elapsed());

        let raw = match response {
            Ok(raw) => raw,
            Err(error) => {
                self.state = QueryState::Failed;
                return Err(self.fail(error, sql, bind).await);
            }
        };

        if self.options.show_warnings && raw.warning_status > 0 {
            self.fetch_warnings().await;
        }
        let outcome = self.format_results(raw);
        self.state = QueryState::Succeeded;
        Ok(outcome)
    }

    async fn fail(&self, mut error: DriverError, sql: String, parameters: Vec<SqlValue>) -> DmRsError {
        log::debug!("Failed ({}): {}", self.connection.id(), error);
        if error.errno == Some(ER_DEADLOCK) {
            if let Some(transaction) = &self.options.transaction {
                if let Err(rollback_error) = transaction.rollback().await {
                    log::error!(
                        "Failed to roll back transaction {} after deadlock: {}",
                        transaction.id(),
                        rollback_error
                    );
                }
                transaction.mark(TransactionState::RolledBack);
            }
        }
        error.sql = Some(sql);
        error.parameters = parameters;
        format_error(error, self.options.model.as_deref(), self.options.instance.as_ref())
    }

    async fn fetch_warnings(&mut self) {
        let id = self.connection.id();
        let response = self
            .connection
            .session()
            .execute("SHOW WARNINGS", &[], &ExecuteOptions::default())
            .await;
        match response {
            Ok(raw) => {
                let result = QueryResult::from_raw(raw, self.connection.type_parsers(), false);
                self.warnings = normalize::warning_messages(result.rows_ref());
                if !self.warnings.is_empty() {
                    log::warn!("DM Warnings ({}): {}", id, self.warnings.join("; "));
                }
            }
            Err(error) => log::warn!("Could not fetch warnings ({}): {}", id, error),
        }
    }

    fn format_results(&mut self, raw: RawQueryResult) -> QueryOutcome {
        let header = raw.is_header();
        let mut result = QueryResult::from_raw(
            raw,
            self.connection.type_parsers(),
            self.options.extended_meta_data,
        );
        result.warnings = self.warnings.clone();
        let format = self.options.out_format;

        match self.options.query_type {
            QueryType::Select => {
                normalize::apply_big_number_policy(
                    result.rows_mut(),
                    self.connection.big_number_policy(),
                );
                let rows = normalize::project(result.rows(), format);
                if self.options.plain {
                    QueryOutcome::Row(rows.into_iter().next())
                } else {
                    QueryOutcome::Rows(rows)
                }
            }
            QueryType::Insert => {
                let rows_affected = result.rows_affected;
                QueryOutcome::Written {
                    target: self.handle_insert(result, header),
                    rows_affected,
                }
            }
            QueryType::Update => QueryOutcome::Written {
                target: self
                    .options
                    .instance
                    .clone()
                    .map_or(WriteTarget::None, WriteTarget::Entity),
                rows_affected: result.rows_affected,
            },
            QueryType::BulkUpdate | QueryType::BulkDelete => {
                QueryOutcome::Affected(result.rows_affected)
            }
            QueryType::Upsert => QueryOutcome::Upserted {
                instance: self.options.instance.clone(),
                created: result.rows_affected == 1,
            },
            QueryType::Describe => QueryOutcome::Columns(normalize::describe(result.rows_ref())),
            QueryType::ShowIndexes => {
                QueryOutcome::Indexes(normalize::show_indexes(result.rows_ref()))
            }
            QueryType::ShowTables => QueryOutcome::Tables(normalize::show_tables(result.rows_ref())),
            QueryType::Version => QueryOutcome::Version(normalize::version(result.rows_ref())),
            QueryType::Call => QueryOutcome::Rows(normalize::project(result.rows(), format)),
            QueryType::ForeignKeys | QueryType::ShowConstraints | QueryType::Raw => {
                QueryOutcome::Raw(result)
            }
            QueryType::Other => QueryOutcome::Entity(self.options.instance.clone()),
        }
    }

    /// Back-fills the bound instance, or rebuilds the ids of a multi-row
    /// insert from the first generated id.
    fn handle_insert(&mut self, result: QueryResult, header: bool) -> WriteTarget {
        let insert_id = result.insert_id;
        let model = self.options.model.as_deref();

        let Some(instance) = self.options.instance.as_mut() else {
            let field = model.and_then(|m| m.auto_increment_primary_key_field());
            let end = insert_id.and_then(|start| start.checked_add(result.rows_affected));
            return match (field, insert_id, end) {
                (Some(field), Some(start), Some(end)) if header => {
                    let columns: Arc<[String]> = Arc::from(vec![field.to_string()]);
                    let rows = (start..end)
                        .map(|id| {
                            let row = Row::new(Arc::clone(&columns), vec![SqlValue::from(id)]);
                            OutRow::project(row, self.options.out_format)
                        })
                        .collect();
                    WriteTarget::Rows(rows)
                }
                _ => WriteTarget::InsertId(insert_id),
            };
        };

        if let Some(model) = model {
            if let (Some(attribute), Some(id)) = (&model.auto_increment, insert_id) {
                if !instance.has(attribute) {
                    instance.set(attribute.clone(), id);
                }
            }
            if let (Some(pk), Some(first)) = (&model.primary_key, result.rows_ref().first()) {
                if !instance.has(pk) {
                    if let Some(value) = first.value(model.field_name(pk)).filter(|v| !v.is_null()) {
                        instance.set(pk.clone(), value.clone());
                    }
                }
            }
        }
        WriteTarget::Entity(instance.clone())
    }
}
