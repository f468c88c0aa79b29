//! libSQL-backed storage for the offline queue and conflict list

mod conflict_store;
mod connection;
mod migrations;
mod queue;

use std::sync::Arc;

use tokio::sync::Mutex;

pub use conflict_store::{LibSqlConflictStore, CONFLICTS_KEY};
pub use connection::Database;
pub use queue::LibSqlLocalQueue;

/// Database handle shared by the queue and the conflict store.
pub type SharedDatabase = Arc<Mutex<Database>>;

/// Wrap an opened database for sharing between stores.
pub fn shared(database: Database) -> SharedDatabase {
    Arc::new(Mutex::new(database))
}
