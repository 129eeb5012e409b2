use std::sync::Arc;

use crate::config::DmConfig;
use crate::connection::{Connection, ConnectionManager};
use crate::error::Result;
use crate::query::{Parameters, QueryExecutor, QueryOptions, QueryType};
use crate::traits::DatabaseDriver;
use crate::types::{QueryOutcome, TypeParserRegistry};

/// Main entry point for dmrs.
/// Wires the connection manager and query executors for one DM deployment.
pub struct DmDialect {
    manager: ConnectionManager,
    show_warnings: bool,
}

impl DmDialect {
    pub const NAME: &'static str = "dm";
    /// Server version assumed when the version probe yields nothing.
    pub const DEFAULT_VERSION: &'static str = "8.0.0";

    /// Create a dialect over a custom driver.
    ///
    /// # Example
    /// ```ignore
    /// let dialect = DmDialect::new(Arc::new(MySqlProtocolDriver::new())).show_warnings(true);
    /// let connection = dialect.connect(&DmConfig::new().host("db")).await?;
    /// let outcome = dialect
    ///     .query(&connection, QueryOptions::new(QueryType::ShowTables))
    ///     .run("SHOW TABLES", &Parameters::None)
    ///     .await?;
    /// ```
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self {
            manager: ConnectionManager::new(driver),
            show_warnings: false,
        }
    }

    /// Fetch server warnings after every statement that raised some.
    pub fn show_warnings(mut self, enabled: bool) -> Self {
        self.show_warnings = enabled;
        self
    }

    pub fn name(&self) -> &'static str {
        Self::NAME
    }

    pub fn connection_manager(&self) -> &ConnectionManager {
        &self.manager
    }

    pub fn type_parsers_mut(&mut self) -> &mut TypeParserRegistry {
        self.manager.type_parsers_mut()
    }

    pub async fn connect(&self, config: &DmConfig) -> Result<Connection> {
        self.manager.connect(config).await
    }

    pub async fn disconnect(&self, connection: &Connection) -> Result<()> {
        self.manager.disconnect(connection).await
    }

    pub fn validate(&self, connection: &Connection) -> bool {
        self.manager.validate(connection)
    }

    /// Create an executor for one statement on `connection`.
    pub fn query(&self, connection: &Connection, mut options: QueryOptions) -> QueryExecutor {
        options.show_warnings |= self.show_warnings;
        QueryExecutor::new(connection.clone(), options)
    }

    /// Reads the server version from its banner, falling back to
    /// [`DEFAULT_VERSION`](Self::DEFAULT_VERSION).
    pub async fn server_version(&self, connection: &Connection) -> Result<String> {
        let outcome = self
            .query(connection, QueryOptions::new(QueryType::Version))
            .run("SELECT BANNER FROM V$VERSION", &Parameters::None)
            .await?;
        let version = match outcome {
            QueryOutcome::Version(Some(version)) => version,
            _ => Self::DEFAULT_VERSION.to_string(),
        };
        log::debug!("Connection {} reports server version {}", connection.id(), version);
        Ok(version)
    }
}
