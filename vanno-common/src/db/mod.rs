//! Rating event storage

pub mod init;
pub mod memory;
pub mod sqlite;
pub mod store;

pub use init::init_database;
pub use memory::MemoryEventStore;
pub use sqlite::SqliteEventStore;
pub use store::{EventFilter, EventStore};
