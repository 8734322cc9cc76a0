//! Store round trips behind the two killmail endpoints.
//!
//! Each operation runs under a fixed time budget. The bulk cursor lives
//! inside the budgeted future, so it is dropped (and released) exactly once
//! whether the drain succeeds, hits a decode error, or times out.

use std::future::Future;
use std::time::Duration;

use crate::error::ApiError;
use crate::models::{KillmailPage, KillmailRecord};
use crate::query::BulkQuery;
use crate::store::{KillmailCursor, KillmailStore, StoreError};

async fn with_budget<T, F>(budget: Duration, operation: F) -> Result<T, StoreError>
where
    F: Future<Output = Result<T, StoreError>>,
{
    tokio::time::timeout(budget, operation)
        .await
        .map_err(|_| StoreError::Timeout(budget))?
}

/// Look up one killmail. A miss is reported as [`ApiError::NotFound`].
pub async fn fetch_killmail(
    store: &dyn KillmailStore,
    id: i64,
    budget: Duration,
) -> Result<KillmailRecord, ApiError> {
    match with_budget(budget, store.find_one(id)).await? {
        Some(record) => Ok(record),
        None => Err(ApiError::NotFound(format!("killmail {id} not found"))),
    }
}

/// Run a bulk query and collect the page keyed by killmail id.
pub async fn list_killmails(
    store: &dyn KillmailStore,
    query: &BulkQuery,
    budget: Duration,
) -> Result<KillmailPage, ApiError> {
    let page = with_budget(budget, async {
        let mut cursor = store.find(query).await?;
        drain(cursor.as_mut()).await
    })
    .await?;

    Ok(page)
}

async fn drain(cursor: &mut dyn KillmailCursor) -> Result<KillmailPage, StoreError> {
    let mut page = KillmailPage::new();
    while let Some(record) = cursor.try_next().await? {
        if !record.is_listable() {
            log::warn!("dropping killmail {} without derived attributes", record.id);
            continue;
        }
        page.insert(record.id, record);
    }
    Ok(page)
}
