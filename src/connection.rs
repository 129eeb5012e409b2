use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock, Weak};

use tokio::sync::{mpsc, Mutex};
use tokio::task::AbortHandle;
use uuid::Uuid;

use crate::config::{BigNumberPolicy, ConnectDescriptor, DmConfig};
use crate::error::{DmRsError, DriverError, Result};
use crate::error_format::format_connect_error;
use crate::traits::{DatabaseDriver, DriverPool, DriverSession, PooledSession, SessionEvents};
use crate::types::TypeParserRegistry;

/// A driver session checked out of a pool.
///
/// Cloning is cheap and yields a handle to the same session. A connection is
/// usable until one of its liveness flags is set; after that it is retired
/// and must not run further queries.
#[derive(Clone)]
pub struct Connection {
    inner: Arc<ConnectionInner>,
}

struct ConnectionInner {
    id: Uuid,
    session: Arc<dyn DriverSession>,
    pool: Arc<dyn DriverPool>,
    policy: BigNumberPolicy,
    parsers: Arc<TypeParserRegistry>,
    closing: AtomicBool,
    fatal_error: AtomicBool,
    protocol_error: AtomicBool,
    closed: AtomicBool,
    listener: OnceLock<AbortHandle>,
}

impl ConnectionInner {
    fn stop_listening(&self) {
        if let Some(listener) = self.listener.get() {
            listener.abort();
        }
    }
}

impl Drop for ConnectionInner {
    fn drop(&mut self) {
        self.stop_listening();
    }
}

impl Connection {
    /// Identity token used in logs.
    pub fn id(&self) -> Uuid {
        self.inner.id
    }

    pub fn is_closing(&self) -> bool {
        self.inner.closing.load(Ordering::Acquire)
    }

    pub fn has_fatal_error(&self) -> bool {
        self.inner.fatal_error.load(Ordering::Acquire)
    }

    pub fn has_protocol_error(&self) -> bool {
        self.inner.protocol_error.load(Ordering::Acquire)
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(Ordering::Acquire)
    }

    /// True when no liveness flag is set.
    pub fn is_usable(&self) -> bool {
        !(self.is_closing() || self.has_fatal_error() || self.has_protocol_error() || self.is_closed())
    }

    /// Precision policy the session was opened with.
    pub fn big_number_policy(&self) -> BigNumberPolicy {
        self.inner.policy
    }

    pub fn type_parsers(&self) -> &TypeParserRegistry {
        &self.inner.parsers
    }

    /// Whether the background listener for session errors is still running.
    pub fn is_listening(&self) -> bool {
        self.inner
            .listener
            .get()
            .is_some_and(|listener| !listener.is_finished())
    }

    pub(crate) fn session(&self) -> &Arc<dyn DriverSession> {
        &self.inner.session
    }
}

impl fmt::Debug for Connection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Connection")
            .field("id", &self.inner.id)
            .field("session", &self.inner.session.id())
            .field("closing", &self.is_closing())
            .field("fatal_error", &self.has_fatal_error())
            .field("protocol_error", &self.has_protocol_error())
            .field("closed", &self.is_closed())
            .finish()
    }
}

/// Opens, validates and closes DM connections.
///
/// # Example
/// ```ignore
/// let manager = ConnectionManager::new(driver);
/// let connection = manager
///     .connect(&DmConfig::new().host("db").username("SYSDBA").password("pw"))
///     .await?;
/// assert!(manager.validate(&connection));
/// manager.disconnect(&connection).await?;
/// ```
pub struct ConnectionManager {
    driver: Arc<dyn DatabaseDriver>,
    pools: Mutex<HashMap<String, Arc<dyn DriverPool>>>,
    parsers: Arc<TypeParserRegistry>,
}

impl ConnectionManager {
    pub fn new(driver: Arc<dyn DatabaseDriver>) -> Self {
        Self {
            driver,
            pools: Mutex::new(HashMap::new()),
            parsers: Arc::new(TypeParserRegistry::with_defaults()),
        }
    }

    /// Type parsers handed to connections opened from now on.
    pub fn type_parsers_mut(&mut self) -> &mut TypeParserRegistry {
        Arc::make_mut(&mut self.parsers)
    }

    /// Opens a connection: checks a session out of the pool for `config`
    /// and waits for whichever of its handshake signals fires first.
    pub async fn connect(&self, config: &DmConfig) -> Result<Connection> {
        let descriptor = config.descriptor()?;
        log::debug!("Connecting to {}", descriptor.redacted());
        let pool = self.pool(&descriptor).await.map_err(format_connect_error)?;
        let PooledSession { session, events } =
            pool.get_connection().await.map_err(format_connect_error)?;
        let SessionEvents {
            connected,
            mut errors,
        } = events;

        let handshake = tokio::select! {
            result = connected => result.map_err(|_| {
                DriverError::client("PROTOCOL_CONNECTION_LOST", "Session closed during handshake")
            }),
            Some(error) = errors.recv() => Err(error),
        };
        if let Err(error) = handshake {
            log::error!("Could not connect to {}: {}", descriptor.redacted(), error);
            pool.destroy(&session);
            return Err(format_connect_error(error));
        }

        let connection = Connection {
            inner: Arc::new(ConnectionInner {
                id: Uuid::new_v4(),
                session,
                pool,
                policy: descriptor.big_number_policy(),
                parsers: Arc::clone(&self.parsers),
                closing: AtomicBool::new(false),
                fatal_error: AtomicBool::new(false),
                protocol_error: AtomicBool::new(false),
                closed: AtomicBool::new(false),
                listener: OnceLock::new(),
            }),
        };
        let listener = tokio::spawn(watch_session(Arc::downgrade(&connection.inner), errors));
        let _ = connection.inner.listener.set(listener.abort_handle());
        log::debug!("Connection {} established", connection.id());
        Ok(connection)
    }

    /// Gracefully closes the connection. Closing an already closing
    /// connection is a no-op.
    pub async fn disconnect(&self, connection: &Connection) -> Result<()> {
        if connection.inner.closing.swap(true, Ordering::AcqRel) {
            log::debug!(
                "Connection {} tried to disconnect but was already at CLOSED state",
                connection.id()
            );
            return Ok(());
        }
        connection.inner.stop_listening();
        let result = connection.session().close().await;
        connection.inner.pool.release(connection.session());
        connection.inner.closed.store(true, Ordering::Release);
        result.map_err(DmRsError::ConnectionFailed)
    }

    /// Whether the pool may hand this connection out again.
    pub fn validate(&self, connection: &Connection) -> bool {
        !(connection.has_fatal_error() || connection.has_protocol_error() || connection.is_closed())
    }

    async fn pool(
        &self,
        descriptor: &ConnectDescriptor,
    ) -> std::result::Result<Arc<dyn DriverPool>, DriverError> {
        let mut pools = self.pools.lock().await;
        if let Some(pool) = pools.get(&descriptor.connect_string) {
            return Ok(Arc::clone(pool));
        }
        let pool = self.driver.create_pool(descriptor).await?;
        pools.insert(descriptor.connect_string.clone(), Arc::clone(&pool));
        Ok(pool)
    }
}

/// Listens to a live session's errors and evicts it on transport failure.
async fn watch_session(
    connection: Weak<ConnectionInner>,
    mut errors: mpsc::UnboundedReceiver<DriverError>,
) {
    while let Some(error) = errors.recv().await {
        let Some(inner) = connection.upgrade() else {
            break;
        };
        if !error.is_transport_fatal() {
            log::warn!("Connection {} raised: {}", inner.id, error);
            continue;
        }
        log::error!("Connection {} lost, evicting: {}", inner.id, error);
        inner.fatal_error.store(true, Ordering::Release);
        if error.is_protocol_error() {
            inner.protocol_error.store(true, Ordering::Release);
        }
        inner.pool.destroy(&inner.session);
        break;
    }
}
