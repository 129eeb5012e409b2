use std::backtrace::Backtrace;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use thiserror::Error;

use crate::transaction::TransactionState;
use crate::types::SqlValue;

/// Transport codes after which a session can never be used again.
const TRANSPORT_FATAL_CODES: [&str; 4] = [
    "ESOCKET",
    "ECONNRESET",
    "EPIPE",
    "PROTOCOL_CONNECTION_LOST",
];

/// Raw failure reported by a driver, before classification.
///
/// Server errors carry a numeric `errno`; socket and client errors carry a
/// symbolic `code` such as `ECONNREFUSED`.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("{message}")]
pub struct DriverError {
    pub errno: Option<u32>,
    pub code: Option<String>,
    pub message: String,
    /// Statement that was running, attached by the executor.
    pub sql: Option<String>,
    /// Bound parameters of that statement.
    pub parameters: Vec<SqlValue>,
}

impl DriverError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            errno: None,
            code: None,
            message: message.into(),
            sql: None,
            parameters: Vec::new(),
        }
    }

    /// A server error with a numeric code.
    pub fn server(errno: u32, message: impl Into<String>) -> Self {
        Self {
            errno: Some(errno),
            ..Self::new(message)
        }
    }

    /// A client or socket error with a symbolic code.
    pub fn client(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            ..Self::new(message)
        }
    }

    pub fn code_str(&self) -> Option<&str> {
        self.code.as_deref()
    }

    /// Socket reset, broken pipe, lost connection or aborted socket.
    pub fn is_transport_fatal(&self) -> bool {
        self.code_str()
            .is_some_and(|code| TRANSPORT_FATAL_CODES.contains(&code))
    }

    pub fn is_protocol_error(&self) -> bool {
        self.code_str()
            .is_some_and(|code| code.starts_with("PROTOCOL_"))
    }
}

/// Which side of a foreign key blocked the statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelationRole {
    /// A child row still references the row being deleted or updated.
    Parent,
    /// The referenced parent row does not exist.
    Child,
}

impl fmt::Display for RelationRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            RelationRole::Parent => "parent",
            RelationRole::Child => "child",
        })
    }
}

/// One field-level item of a constraint violation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationErrorItem {
    pub message: String,
    pub kind: String,
    pub path: String,
    pub value: String,
    pub validator_key: String,
}

impl ValidationErrorItem {
    pub(crate) fn not_unique(path: &str, value: &str) -> Self {
        Self {
            message: format!("{path} must be unique"),
            kind: "unique violation".to_string(),
            path: path.to_string(),
            value: value.to_string(),
            validator_key: "not_unique".to_string(),
        }
    }
}

/// Error type for dmrs operations
#[derive(Debug, Error)]
pub enum DmRsError {
    #[error("{message}")]
    UniqueConstraint {
        message: String,
        /// Unique key name parsed from the driver message.
        key: Option<String>,
        fields: BTreeMap<String, String>,
        errors: Vec<ValidationErrorItem>,
        #[source]
        source: DriverError,
    },

    #[error("{source}")]
    ForeignKeyConstraint {
        role: RelationRole,
        table: Option<String>,
        fields: Option<Vec<String>>,
        referenced_fields: Option<Vec<String>>,
        /// Value of the first offending field on the bound instance.
        value: Option<SqlValue>,
        index: Option<String>,
        #[source]
        source: DriverError,
    },

    #[error("Connection refused: {0}")]
    ConnectionRefused(#[source] DriverError),

    #[error("Access denied: {0}")]
    AccessDenied(#[source] DriverError),

    #[error("Host not found: {0}")]
    HostNotFound(#[source] DriverError),

    #[error("Host unreachable: {0}")]
    HostUnreachable(#[source] DriverError),

    #[error("Invalid connection configuration: {0}")]
    InvalidConnectionConfig(#[source] DriverError),

    #[error("Connection failed: {0}")]
    ConnectionFailed(#[source] DriverError),

    #[error("Query failed: {source}")]
    QueryFailed {
        #[source]
        source: DriverError,
        trace: Arc<Backtrace>,
    },

    #[error("Connection {0} is retired")]
    ConnectionRetired(String),

    #[error("Transaction already finished with state {0:?}")]
    TransactionFinished(TransactionState),

    #[error("Column not found: {0}")]
    ColumnNotFound(String),
}

impl DmRsError {
    pub(crate) fn query_failed(source: DriverError) -> Self {
        DmRsError::QueryFailed {
            source,
            trace: Arc::new(Backtrace::capture()),
        }
    }

    /// The driver error this failure was classified from.
    pub fn driver_error(&self) -> Option<&DriverError> {
        match self {
            DmRsError::UniqueConstraint { source, .. }
            | DmRsError::ForeignKeyConstraint { source, .. }
            | DmRsError::QueryFailed { source, .. } => Some(source),
            DmRsError::ConnectionRefused(e)
            | DmRsError::AccessDenied(e)
            | DmRsError::HostNotFound(e)
            | DmRsError::HostUnreachable(e)
            | DmRsError::InvalidConnectionConfig(e)
            | DmRsError::ConnectionFailed(e) => Some(e),
            DmRsError::ConnectionRetired(_)
            | DmRsError::TransactionFinished(_)
            | DmRsError::ColumnNotFound(_) => None,
        }
    }
}

/// Result type alias for dmrs operations
pub type Result<T> = std::result::Result<T, DmRsError>;
