mod driver;

pub use driver::{
    session_channel, DatabaseDriver, DriverPool, DriverSession, ExecuteOptions, PooledSession,
    SessionEvents, SessionSignals,
};
