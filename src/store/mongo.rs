use rocket_db_pools::mongodb::bson::doc;
use rocket_db_pools::mongodb::error::{Error as DriverError, ErrorKind};
use rocket_db_pools::mongodb::options::FindOptions;
use rocket_db_pools::mongodb::{Client, Collection, Cursor, Database};
use std::time::Duration;

use super::{KillmailCursor, KillmailStore, StoreError};
use crate::config::KillboardConfig;
use crate::models::KillmailRecord;
use crate::query::BulkQuery;

/// [`KillmailStore`] backed by a MongoDB collection.
#[derive(Clone)]
pub struct MongoKillmailStore {
    database: Database,
    collection: Collection<KillmailRecord>,
    max_time: Duration,
}

impl MongoKillmailStore {
    pub fn new(client: &Client, config: &KillboardConfig) -> Self {
        let database = client.database(&config.database);
        let collection = database.collection::<KillmailRecord>(&config.collection);
        Self {
            database,
            collection,
            max_time: config.query_timeout,
        }
    }
}

/// Decode failures surface as their own error kind so callers can tell a
/// malformed document apart from a broken connection.
fn classify(err: DriverError) -> StoreError {
    if let ErrorKind::BsonDeserialization(source) = err.kind.as_ref() {
        return StoreError::Decode(source.to_string());
    }
    StoreError::Driver(err)
}

#[rocket::async_trait]
impl KillmailStore for MongoKillmailStore {
    async fn find_one(&self, id: i64) -> Result<Option<KillmailRecord>, StoreError> {
        self.collection
            .find_one(doc! { "_id": id }, None)
            .await
            .map_err(classify)
    }

    async fn find(&self, query: &BulkQuery) -> Result<Box<dyn KillmailCursor>, StoreError> {
        log::debug!(
            "querying killmails: filter={} sort={} skip={} limit={}",
            query.filter,
            query.sort,
            query.skip,
            query.limit
        );

        let options = FindOptions::builder()
            .sort(query.sort.clone())
            .skip(query.skip)
            .limit(query.limit)
            .max_time(self.max_time)
            .build();

        let cursor = self
            .collection
            .find(query.filter.clone(), options)
            .await
            .map_err(classify)?;

        Ok(Box::new(MongoCursor { inner: cursor }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.database.run_command(doc! { "ping": 1 }, None).await?;
        Ok(())
    }
}

/// Dropping the driver cursor kills it server-side when it is not exhausted.
struct MongoCursor {
    inner: Cursor<KillmailRecord>,
}

#[rocket::async_trait]
impl KillmailCursor for MongoCursor {
    async fn try_next(&mut self) -> Result<Option<KillmailRecord>, StoreError> {
        if !self.inner.advance().await.map_err(classify)? {
            return Ok(None);
        }
        self.inner.deserialize_current().map(Some).map_err(classify)
    }
}
