use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, oneshot};

use crate::config::ConnectDescriptor;
use crate::error::DriverError;
use crate::types::{OutFormat, RawQueryResult, SqlValue};

/// Options passed to the driver with every statement.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ExecuteOptions {
    pub extended_meta_data: bool,
    pub out_format: OutFormat,
    /// Stream the rows through a cursor instead of materializing them.
    pub result_set: bool,
    /// Row limit, 0 for unbounded.
    pub max_rows: u32,
}

/// Receiving side of a session's signals, held by the connection manager.
///
/// `connected` fires once when the handshake completes. `errors` carries
/// every error the session raises for its whole lifetime.
#[derive(Debug)]
pub struct SessionEvents {
    pub connected: oneshot::Receiver<()>,
    pub errors: mpsc::UnboundedReceiver<DriverError>,
}

/// Sending side of a session's signals, held by the driver.
#[derive(Debug)]
pub struct SessionSignals {
    pub connected: Option<oneshot::Sender<()>>,
    pub errors: mpsc::UnboundedSender<DriverError>,
}

impl SessionSignals {
    /// Reports the handshake as complete. Later calls do nothing.
    pub fn connected(&mut self) {
        if let Some(sender) = self.connected.take() {
            let _ = sender.send(());
        }
    }

    /// Raises an error on the session. Dropped when nobody listens anymore.
    pub fn error(&self, error: DriverError) {
        let _ = self.errors.send(error);
    }
}

/// Creates a linked pair of session signals and events.
pub fn session_channel() -> (SessionSignals, SessionEvents) {
    let (connected_tx, connected_rx) = oneshot::channel();
    let (errors_tx, errors_rx) = mpsc::unbounded_channel();
    (
        SessionSignals {
            connected: Some(connected_tx),
            errors: errors_tx,
        },
        SessionEvents {
            connected: connected_rx,
            errors: errors_rx,
        },
    )
}

/// A session checked out of a pool, with its signals.
pub struct PooledSession {
    pub session: Arc<dyn DriverSession>,
    pub events: SessionEvents,
}

/// Trait for database driver implementations.
/// Drivers are responsible for:
/// - Creating session pools from a connect descriptor
/// - Converting SqlValue parameters to native types
/// - Executing statements and converting results to RawQueryResult
#[async_trait]
pub trait DatabaseDriver: Send + Sync {
    /// Creates a pool of sessions described by `descriptor`.
    async fn create_pool(
        &self,
        descriptor: &ConnectDescriptor,
    ) -> Result<Arc<dyn DriverPool>, DriverError>;
}

#[async_trait]
pub trait DriverPool: Send + Sync {
    /// Checks out a session. The handshake may still be in progress.
    async fn get_connection(&self) -> Result<PooledSession, DriverError>;

    /// Evicts the session from the pool for good.
    fn destroy(&self, session: &Arc<dyn DriverSession>);

    /// Forgets a session that was closed gracefully.
    fn release(&self, _session: &Arc<dyn DriverSession>) {}
}

#[async_trait]
pub trait DriverSession: Send + Sync {
    /// Identifier of the session within its pool.
    fn id(&self) -> u64;

    /// Execute a statement with positional parameters (`?` placeholders).
    async fn execute(
        &self,
        sql: &str,
        params: &[SqlValue],
        options: &ExecuteOptions,
    ) -> Result<RawQueryResult, DriverError>;

    /// Gracefully close the session.
    async fn close(&self) -> Result<(), DriverError>;
}
