use super::{
    field_at, matches_filter, timestamp_millis, DocumentStore, FeedQuery, RawDocument,
};
use crate::error::{AppError, AppResult};
use async_trait::async_trait;
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

/// What the store saw for one feed query. Used by tests to assert on the
/// planner's behavior (effective limits, cursor propagation, call counts).
#[derive(Debug, Clone)]
pub struct RecordedQuery {
    pub collection: &'static str,
    pub limit: i64,
    pub created_before: Option<i64>,
}

/// In-memory document store used by unit and black-box tests.
///
/// Documents live under `(group_id, collection)` buckets, mirroring the
/// sub-collection-per-group layout; feed queries span every group's
/// same-named bucket, like a collection-group query does.
#[derive(Default)]
pub struct MemoryDocumentStore {
    documents: Mutex<HashMap<(String, String), Vec<RawDocument>>>,
    feed_queries: Mutex<Vec<RecordedQuery>>,
    roster_fetches: AtomicUsize,
    failing_collections: Mutex<HashSet<&'static str>>,
    failing_rosters: AtomicBool,
}

impl MemoryDocumentStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert_document(&self, group_id: &str, collection: &str, id: &str, payload: Value) {
        let mut documents = self.documents.lock().unwrap();
        documents
            .entry((group_id.to_string(), collection.to_string()))
            .or_default()
            .push(RawDocument {
                id: id.to_string(),
                payload,
            });
    }

    pub fn insert_member(&self, group_id: &str, payload: Value) {
        let id = payload
            .get("id")
            .and_then(Value::as_str)
            .unwrap_or("member")
            .to_string();
        self.insert_document(group_id, "members", &id, payload);
    }

    /// Make every query against `collection` fail.
    pub fn fail_collection(&self, collection: &'static str) {
        self.failing_collections.lock().unwrap().insert(collection);
    }

    /// Make every roster fetch fail.
    pub fn fail_rosters(&self) {
        self.failing_rosters.store(true, Ordering::SeqCst);
    }

    pub fn feed_query_count(&self) -> usize {
        self.feed_queries.lock().unwrap().len()
    }

    pub fn roster_fetch_count(&self) -> usize {
        self.roster_fetches.load(Ordering::SeqCst)
    }

    pub fn recorded_queries(&self) -> Vec<RecordedQuery> {
        self.feed_queries.lock().unwrap().clone()
    }
}

#[async_trait]
impl DocumentStore for MemoryDocumentStore {
    async fn query_feed_documents(&self, query: &FeedQuery) -> AppResult<Vec<RawDocument>> {
        self.feed_queries.lock().unwrap().push(RecordedQuery {
            collection: query.collection,
            limit: query.limit,
            created_before: query.created_before,
        });

        if self
            .failing_collections
            .lock()
            .unwrap()
            .contains(query.collection)
        {
            return Err(AppError::Store(format!(
                "injected failure for collection {}",
                query.collection
            )));
        }

        let documents = self.documents.lock().unwrap();
        let mut matches: Vec<RawDocument> = documents
            .iter()
            .filter(|((_, collection), _)| collection == query.collection)
            .flat_map(|(_, docs)| docs.iter().cloned())
            .filter(|doc| {
                field_at(&doc.payload, query.group_id_field)
                    .and_then(Value::as_str)
                    .is_some_and(|gid| query.group_ids.iter().any(|g| g.as_str() == gid))
            })
            .filter(|doc| {
                query
                    .extra_filters
                    .iter()
                    .all(|f| matches_filter(&doc.payload, f))
            })
            .filter(|doc| match query.created_before {
                Some(before) => {
                    field_at(&doc.payload, query.timestamp_field)
                        .and_then(timestamp_millis)
                        .unwrap_or(0)
                        < before
                }
                None => true,
            })
            .collect();

        matches.sort_by_key(|doc| {
            std::cmp::Reverse(
                field_at(&doc.payload, query.timestamp_field)
                    .and_then(timestamp_millis)
                    .unwrap_or(0),
            )
        });
        matches.truncate(query.limit as usize);

        Ok(matches)
    }

    async fn fetch_group_members(&self, group_id: &str) -> AppResult<Vec<RawDocument>> {
        self.roster_fetches.fetch_add(1, Ordering::SeqCst);

        if self.failing_rosters.load(Ordering::SeqCst) {
            return Err(AppError::Store("injected roster failure".to_string()));
        }

        let documents = self.documents.lock().unwrap();
        Ok(documents
            .get(&(group_id.to_string(), "members".to_string()))
            .cloned()
            .unwrap_or_default())
    }
}
