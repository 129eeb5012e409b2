#[cfg(feature = "mysql")]
mod mysql_async;

pub use self::in_memory_test::{
    Handshake, InMemoryTestDriver, InMemoryTestResponseBuilder, RecordedQuery,
};
#[cfg(feature = "mysql")]
pub use self::mysql_async::MySqlProtocolDriver;
