//! Read access to the killmail collection.
//!
//! Route handlers only see the [`KillmailStore`] trait. Production wires it
//! to the MongoDB driver ([`MongoKillmailStore`]); tests use the in-memory
//! [`MemoryKillmailStore`], which evaluates the same filter documents.

pub mod memory;
pub mod mongo;

use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::models::KillmailRecord;
use crate::query::BulkQuery;

pub use memory::{CursorStats, MemoryKillmailStore};
pub use mongo::MongoKillmailStore;

/// Store handle shared through Rocket state.
pub type SharedStore = Arc<dyn KillmailStore>;

/// Errors raised while talking to the document store.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Driver(#[from] rocket_db_pools::mongodb::error::Error),
    #[error("failed to decode killmail: {0}")]
    Decode(String),
    #[error("store operation timed out after {0:?}")]
    Timeout(Duration),
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

#[rocket::async_trait]
pub trait KillmailStore: Send + Sync {
    /// Equality lookup on the record identifier.
    async fn find_one(&self, id: i64) -> Result<Option<KillmailRecord>, StoreError>;

    /// Run a filtered, sorted, paginated query. The returned cursor holds
    /// server-side resources until it is dropped.
    async fn find(&self, query: &BulkQuery) -> Result<Box<dyn KillmailCursor>, StoreError>;

    /// Round trip used at startup to verify connectivity.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// Lazily decoded query results.
#[rocket::async_trait]
pub trait KillmailCursor: Send {
    /// Decode the next record, `Ok(None)` once the cursor is exhausted.
    async fn try_next(&mut self) -> Result<Option<KillmailRecord>, StoreError>;
}
