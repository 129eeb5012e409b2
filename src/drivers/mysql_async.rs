use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use mysql_async::prelude::{Protocol, Queryable};
use mysql_async::{Conn, IoError, OptsBuilder, Params, Pool, QueryResult, Value};

use crate::config::ConnectDescriptor;
use crate::error::DriverError;
use crate::traits::{
    session_channel, DatabaseDriver, DriverPool, DriverSession, ExecuteOptions, PooledSession,
    SessionSignals,
};
use crate::types::{ColumnMeta, RawQueryResult, ResultSet, SqlValue};

/// Driver for servers speaking the MySQL wire protocol, which DM exposes
/// in its compatibility mode.
#[derive(Debug, Default)]
pub struct MySqlProtocolDriver;

impl MySqlProtocolDriver {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl DatabaseDriver for MySqlProtocolDriver {
    async fn create_pool(
        &self,
        descriptor: &ConnectDescriptor,
    ) -> Result<Arc<dyn DriverPool>, DriverError> {
        let opts = OptsBuilder::default()
            .ip_or_hostname(descriptor.host.clone())
            .tcp_port(descriptor.port)
            .user(Some(descriptor.user.clone()))
            .pass(Some(descriptor.password.clone()))
            .db_name(descriptor.schema.clone());
        log::debug!("Creating pool for {}", descriptor.redacted());
        Ok(Arc::new(MySqlPool {
            pool: Pool::new(opts),
            sessions: Mutex::new(HashMap::new()),
            next_id: AtomicU64::new(1),
        }))
    }
}

struct MySqlPool {
    pool: Pool,
    sessions: Mutex<HashMap<u64, Arc<MySqlSession>>>,
    next_id: AtomicU64,
}

#[async_trait]
impl DriverPool for MySqlPool {
    async fn get_connection(&self) -> Result<PooledSession, DriverError> {
        let (mut signals, events) = session_channel();
        let conn = match self.pool.get_conn().await {
            Ok(conn) => {
                signals.connected();
                Some(conn)
            }
            Err(error) => {
                signals.error(map_error(error));
                None
            }
        };
        let session = Arc::new(MySqlSession {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            conn: tokio::sync::Mutex::new(conn),
            signals: Mutex::new(signals),
        });
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(session.id, Arc::clone(&session));
        Ok(PooledSession { session, events })
    }

    fn destroy(&self, session: &Arc<dyn DriverSession>) {
        let removed = self
            .sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.id());
        if let Some(session) = removed {
            // The pool discards the underlying socket once it is dropped broken.
            tokio::spawn(async move {
                session.conn.lock().await.take();
            });
        }
    }

    fn release(&self, session: &Arc<dyn DriverSession>) {
        self.sessions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&session.id());
    }
}

struct MySqlSession {
    id: u64,
    conn: tokio::sync::Mutex<Option<Conn>>,
    signals: Mutex<SessionSignals>,
}

impl MySqlSession {
    fn raise(&self, error: &DriverError) {
        if error.is_transport_fatal() {
            self.signals
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .error(error.clone());
        }
    }
}

#[async_trait]
impl DriverSession for MySqlSession {
    fn id(&self) -> u64 {
        self.id
    }

    /// Rows are always materialized; `options.result_set` is not consulted.
    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        options: &ExecuteOptions,
    ) -> Result<RawQueryResult, DriverError> {
        let mut guard = self.conn.lock().await;
        let conn = guard
            .as_mut()
            .ok_or_else(|| DriverError::client("PROTOCOL_CONNECTION_LOST", "Session is closed"))?;

        let response = if params.is_empty() {
            match conn.query_iter(sql).await {
                Ok(result) => collect(result, options.max_rows).await,
                Err(error) => Err(error),
            }
        } else {
            let params = Params::Positional(params.iter().map(to_value).collect());
            match conn.exec_iter(sql, params).await {
                Ok(result) => collect(result, options.max_rows).await,
                Err(error) => Err(error),
            }
        };

        match response {
            Ok(mut raw) => {
                raw.warning_status = conn.get_warnings();
                Ok(raw)
            }
            Err(error) => {
                let error = map_error(error);
                self.raise(&error);
                Err(error)
            }
        }
    }

    async fn close(&self) -> Result<(), DriverError> {
        match self.conn.lock().await.take() {
            Some(conn) => conn.disconnect().await.map_err(map_error),
            None => Ok(()),
        }
    }
}

async fn collect<P: Protocol>(
    mut result: QueryResult<'_, '_, P>,
    max_rows: u32,
) -> Result<RawQueryResult, mysql_async::Error> {
    let mut raw = RawQueryResult::empty();
    while !result.is_empty() {
        let columns: Vec<ColumnMeta> = result
            .columns()
            .map(|columns| {
                columns
                    .iter()
                    .map(|column| {
                        let type_name = format!("{:?}", column.column_type());
                        ColumnMeta::new(
                            column.name_str(),
                            type_name.trim_start_matches("MYSQL_TYPE_"),
                        )
                    })
                    .collect()
            })
            .unwrap_or_default();
        let rows: Vec<mysql_async::Row> = result.collect().await?;
        raw.rows_affected = result.affected_rows();
        raw.insert_id = result.last_insert_id();
        if columns.is_empty() {
            continue;
        }
        let limit = if max_rows == 0 { usize::MAX } else { max_rows as usize };
        let rows = rows
            .iter()
            .take(limit)
            .map(|row| {
                (0..row.len())
                    .map(|i| row.as_ref(i).map_or(SqlValue::Null, from_value))
                    .collect()
            })
            .collect();
        raw.result_sets.push(ResultSet::new(columns, rows));
    }
    Ok(raw)
}

fn from_value(value: &Value) -> SqlValue {
    match value {
        Value::NULL => SqlValue::Null,
        Value::Bytes(bytes) => match std::str::from_utf8(bytes) {
            Ok(text) => SqlValue::Text(text.to_string()),
            Err(_) => SqlValue::Bytes(bytes.clone()),
        },
        Value::Int(v) => SqlValue::Int64(*v),
        Value::UInt(v) => SqlValue::from(*v),
        Value::Float(v) => SqlValue::Double(f64::from(*v)),
        Value::Double(v) => SqlValue::Double(*v),
        Value::Date(year, month, day, hour, minute, second, micros) => SqlValue::Text(format!(
            "{year:04}-{month:02}-{day:02} {hour:02}:{minute:02}:{second:02}.{micros:06}"
        )),
        Value::Time(negative, days, hours, minutes, seconds, micros) => {
            let sign = if *negative { "-" } else { "" };
            let hours = u32::from(*hours) + days * 24;
            SqlValue::Text(format!(
                "{sign}{hours:02}:{minutes:02}:{seconds:02}.{micros:06}"
            ))
        }
    }
}

fn to_value(value: &SqlValue) -> Value {
    match value {
        SqlValue::Null => Value::NULL,
        SqlValue::Text(v) => Value::from(v.as_str()),
        SqlValue::Int32(v) => Value::Int(i64::from(*v)),
        SqlValue::Int64(v) => Value::Int(*v),
        SqlValue::BigInt(v) => match i64::try_from(*v) {
            Ok(v) => Value::Int(v),
            Err(_) => Value::Bytes(v.to_string().into_bytes()),
        },
        SqlValue::Double(v) => Value::Double(*v),
        SqlValue::Bool(v) => Value::Int(i64::from(*v)),
        SqlValue::Bytes(v) => Value::Bytes(v.clone()),
    }
}

fn map_error(error: mysql_async::Error) -> DriverError {
    match error {
        mysql_async::Error::Server(server) => {
            DriverError::server(u32::from(server.code), server.message)
        }
        mysql_async::Error::Io(IoError::Io(io)) => {
            let code = match io.kind() {
                std::io::ErrorKind::ConnectionRefused => "ECONNREFUSED",
                std::io::ErrorKind::ConnectionReset => "ECONNRESET",
                std::io::ErrorKind::ConnectionAborted => "ESOCKET",
                std::io::ErrorKind::BrokenPipe => "EPIPE",
                std::io::ErrorKind::UnexpectedEof => "PROTOCOL_CONNECTION_LOST",
                _ if io.to_string().contains("lookup") => "ENOTFOUND",
                _ => "EHOSTUNREACH",
            };
            DriverError::client(code, io.to_string())
        }
        mysql_async::Error::Driver(mysql_async::DriverError::ConnectionClosed) => {
            DriverError::client("PROTOCOL_CONNECTION_LOST", "Connection closed")
        }
        mysql_async::Error::Url(url) => DriverError::client("EINVAL", url.to_string()),
        other => DriverError::new(other.to_string()),
    }
}
