//! In-process [`KillmailStore`] holding raw BSON documents.
//!
//! Filters are evaluated with the subset of MongoDB query semantics the
//! query builder emits: implicit equality on dotted paths (descending into
//! arrays), `$eq`, `$exists`, `$and` and `$or`. Documents are decoded
//! lazily as the cursor advances, so malformed documents fail at the same
//! point they would against a real server.

use parking_lot::{Mutex, RwLock};
use rocket_db_pools::mongodb::bson::{self, Bson, Document};
use std::cmp::Ordering;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering as AtomicOrdering};
use std::time::Duration;

use super::{KillmailCursor, KillmailStore, StoreError};
use crate::models::KillmailRecord;
use crate::query::BulkQuery;

/// Number of cursors handed out and released by a [`MemoryKillmailStore`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CursorStats {
    pub opened: usize,
    pub released: usize,
}

#[derive(Default)]
struct CursorCounters {
    opened: AtomicUsize,
    released: AtomicUsize,
}

#[derive(Default)]
pub struct MemoryKillmailStore {
    documents: RwLock<Vec<Document>>,
    latency: Mutex<Option<Duration>>,
    offline: AtomicBool,
    counters: Arc<CursorCounters>,
}

impl MemoryKillmailStore {
    pub fn new(documents: impl IntoIterator<Item = Document>) -> Self {
        Self {
            documents: RwLock::new(documents.into_iter().collect()),
            ..Self::default()
        }
    }

    pub fn insert(&self, document: Document) {
        self.documents.write().push(document);
    }

    /// Delay every store call by `latency`.
    pub fn set_latency(&self, latency: Option<Duration>) {
        *self.latency.lock() = latency;
    }

    /// While offline every call fails with [`StoreError::Unavailable`].
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, AtomicOrdering::SeqCst);
    }

    pub fn cursor_stats(&self) -> CursorStats {
        CursorStats {
            opened: self.counters.opened.load(AtomicOrdering::SeqCst),
            released: self.counters.released.load(AtomicOrdering::SeqCst),
        }
    }

    async fn round_trip(&self) -> Result<(), StoreError> {
        let latency = *self.latency.lock();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }
        if self.offline.load(AtomicOrdering::SeqCst) {
            return Err(StoreError::Unavailable("memory store is offline".to_string()));
        }
        Ok(())
    }

    fn select(&self, query: &BulkQuery) -> VecDeque<Document> {
        let mut selected: Vec<Document> = self
            .documents
            .read()
            .iter()
            .filter(|document| matches_filter(document, &query.filter))
            .cloned()
            .collect();

        selected.sort_by(|a, b| compare_documents(a, b, &query.sort));

        let limit = match query.limit.unsigned_abs() {
            0 => usize::MAX,
            n => usize::try_from(n).unwrap_or(usize::MAX),
        };
        let skip = usize::try_from(query.skip).unwrap_or(usize::MAX);

        selected.into_iter().skip(skip).take(limit).collect()
    }
}

#[rocket::async_trait]
impl KillmailStore for MemoryKillmailStore {
    async fn find_one(&self, id: i64) -> Result<Option<KillmailRecord>, StoreError> {
        self.round_trip().await?;

        let key = Bson::Int64(id);
        let document = self
            .documents
            .read()
            .iter()
            .find(|document| document.get("_id").is_some_and(|value| values_equal(value, &key)))
            .cloned();

        document.map(decode).transpose()
    }

    async fn find(&self, query: &BulkQuery) -> Result<Box<dyn KillmailCursor>, StoreError> {
        self.round_trip().await?;

        let pending = self.select(query);
        self.counters.opened.fetch_add(1, AtomicOrdering::SeqCst);

        Ok(Box::new(MemoryCursor {
            pending,
            counters: Arc::clone(&self.counters),
        }))
    }

    async fn ping(&self) -> Result<(), StoreError> {
        self.round_trip().await
    }
}

struct MemoryCursor {
    pending: VecDeque<Document>,
    counters: Arc<CursorCounters>,
}

#[rocket::async_trait]
impl KillmailCursor for MemoryCursor {
    async fn try_next(&mut self) -> Result<Option<KillmailRecord>, StoreError> {
        self.pending.pop_front().map(decode).transpose()
    }
}

impl Drop for MemoryCursor {
    fn drop(&mut self) {
        self.counters.released.fetch_add(1, AtomicOrdering::SeqCst);
    }
}

fn decode(document: Document) -> Result<KillmailRecord, StoreError> {
    bson::from_document(document).map_err(|err| StoreError::Decode(err.to_string()))
}

// ===== Filter evaluation =====

fn matches_filter(document: &Document, filter: &Document) -> bool {
    filter.iter().all(|(key, condition)| match key.as_str() {
        "$and" => clauses(condition).all(|clause| matches_filter(document, clause)),
        "$or" => clauses(condition).any(|clause| matches_filter(document, clause)),
        path => matches_field(document, path, condition),
    })
}

fn clauses(condition: &Bson) -> impl Iterator<Item = &Document> {
    condition
        .as_array()
        .into_iter()
        .flatten()
        .filter_map(Bson::as_document)
}

fn matches_field(document: &Document, path: &str, condition: &Bson) -> bool {
    let found = resolve_path(document, path);

    match condition {
        Bson::Document(operators) if is_operator_document(operators) => {
            operators.iter().all(|(operator, operand)| match operator.as_str() {
                "$exists" => !found.is_empty() == operand.as_bool().unwrap_or(true),
                "$eq" => found.iter().any(|value| equals_or_contains(value, operand)),
                other => {
                    log::warn!("memory store ignores unsupported operator {}", other);
                    false
                }
            })
        }
        expected => found.iter().any(|value| equals_or_contains(value, expected)),
    }
}

fn is_operator_document(document: &Document) -> bool {
    document.keys().next().is_some_and(|key| key.starts_with('$'))
}

/// Collect every value reachable through `path`, fanning out over arrays of
/// embedded documents the way MongoDB does for dotted paths.
fn resolve_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let mut segments = path.split('.');
    let Some(mut current) = segments
        .next()
        .and_then(|first| document.get(first))
        .map(|value| vec![value])
    else {
        return Vec::new();
    };

    for segment in segments {
        current = current
            .into_iter()
            .flat_map(|value| descend(value, segment))
            .collect();
    }

    current
}

fn descend<'a>(value: &'a Bson, segment: &str) -> Vec<&'a Bson> {
    match value {
        Bson::Document(document) => document.get(segment).into_iter().collect(),
        Bson::Array(items) => items
            .iter()
            .filter_map(Bson::as_document)
            .filter_map(|document| document.get(segment))
            .collect(),
        _ => Vec::new(),
    }
}

fn equals_or_contains(value: &Bson, expected: &Bson) -> bool {
    match value {
        Bson::Array(items) => {
            values_equal(value, expected) || items.iter().any(|item| values_equal(item, expected))
        }
        _ => values_equal(value, expected),
    }
}

fn as_integer(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(n) => Some(i64::from(*n)),
        Bson::Int64(n) => Some(*n),
        _ => None,
    }
}

fn as_float(value: &Bson) -> Option<f64> {
    match value {
        Bson::Double(n) => Some(*n),
        other => as_integer(other).map(|n| n as f64),
    }
}

/// Numbers compare by value regardless of their BSON width.
fn values_equal(a: &Bson, b: &Bson) -> bool {
    if let (Some(x), Some(y)) = (as_integer(a), as_integer(b)) {
        return x == y;
    }
    if let (Some(x), Some(y)) = (as_float(a), as_float(b)) {
        return x == y;
    }
    a == b
}

fn compare_values(a: Option<&Bson>, b: Option<&Bson>) -> Ordering {
    match (a, b) {
        (Some(x), Some(y)) => match (as_integer(x), as_integer(y)) {
            (Some(x), Some(y)) => x.cmp(&y),
            _ => match (as_float(x), as_float(y)) {
                (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(Ordering::Equal),
                _ => Ordering::Equal,
            },
        },
        (Some(_), None) => Ordering::Greater,
        (None, Some(_)) => Ordering::Less,
        (None, None) => Ordering::Equal,
    }
}

fn compare_documents(a: &Document, b: &Document, sort: &Document) -> Ordering {
    for (field, direction) in sort {
        let ord = compare_values(
            resolve_path(a, field).first().copied(),
            resolve_path(b, field).first().copied(),
        );
        if ord != Ordering::Equal {
            let descending = as_integer(direction).is_some_and(|d| d < 0);
            return if descending { ord.reverse() } else { ord };
        }
    }
    Ordering::Equal
}
