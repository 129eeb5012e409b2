//! dmrs - DM database dialect adapter: connection lifecycle and query
//! result normalization over a pluggable driver.
//!
//! # Example
//! ```ignore
//! use dmrs::{DmConfig, DmDialect, Parameters, QueryOptions, QueryOutcome, QueryType};
//!
//! let dialect = DmDialect::new(driver);
//! let connection = dialect
//!     .connect(&DmConfig::new().host("db").username("SYSDBA").password("pw"))
//!     .await?;
//!
//! let outcome = dialect
//!     .query(&connection, QueryOptions::new(QueryType::Select))
//!     .run("SELECT id, name FROM users WHERE name = $name", &Parameters::named([("name", "John")]))
//!     .await?;
//!
//! if let QueryOutcome::Rows(rows) = outcome {
//!     let id = rows[0].get("id");
//! }
//! dialect.disconnect(&connection).await?;
//! ```

pub mod config;
pub mod connection;
pub mod drivers;
pub mod error;
pub mod error_format;
pub mod query;
pub mod traits;
pub mod transaction;
pub mod types;

mod dialect;

// Re-export main types for convenient access
pub use config::{BigNumberPolicy, ConnectDescriptor, DmConfig};
pub use connection::{Connection, ConnectionManager};
pub use dialect::DmDialect;
pub use error::{DmRsError, DriverError, Result};
pub use query::{Parameters, QueryExecutor, QueryOptions, QueryType};
pub use traits::{DatabaseDriver, DriverPool, DriverSession};
pub use transaction::{Transaction, TransactionState};
pub use types::{
    Instance, ModelDefinition, OutFormat, OutRow, QueryOutcome, QueryResult, RawQueryResult, Row,
    SqlValue, WriteTarget,
};
