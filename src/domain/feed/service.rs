use super::error::FeedServiceError;
use super::model::{FeedItem, FeedPage, ItemIdentifier, ItemMetadata, Member};
use super::types::{FeedTypeConfig, FEED_TYPE_CONFIGS};
use super::GetUserFeedsRequest;
use crate::infrastructure::store::{
    field_at, timestamp_millis, DocumentStore, FeedQuery, RawDocument,
};
use async_trait::async_trait;
use futures::future::try_join_all;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;
use uuid::Uuid;

const DEFAULT_LIMIT: i64 = 10;

/// Floor on the per-type fetch limit. Each type over-fetches so the merged
/// page can still fill after cross-type truncation.
const MIN_FETCH_LIMIT: i64 = 10;

pub struct FeedService {
    store: Arc<dyn DocumentStore>,
}

impl FeedService {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
pub trait FeedServiceApi: Send + Sync {
    /// Aggregate the caller's group feeds into one reverse-chronological page.
    ///
    /// Fans out one bounded query per feed-item type and one roster fetch per
    /// group, all concurrently; any sub-failure aborts the whole request.
    /// Items sharing a timestamp keep their per-invocation merge order, so a
    /// client paging across such a boundary may see a skip or a duplicate.
    async fn get_user_feeds(
        &self,
        user_id: Uuid,
        request: GetUserFeedsRequest,
    ) -> Result<FeedPage, FeedServiceError>;
}

#[async_trait]
impl FeedServiceApi for FeedService {
    async fn get_user_feeds(
        &self,
        user_id: Uuid,
        request: GetUserFeedsRequest,
    ) -> Result<FeedPage, FeedServiceError> {
        let limit = request.limit.unwrap_or(DEFAULT_LIMIT);
        if limit <= 0 {
            return Err(FeedServiceError::Invalid(
                "limit must be positive".to_string(),
            ));
        }

        let group_ids = request.group_ids;

        tracing::info!(
            user_id = %user_id,
            groups = group_ids.len(),
            limit,
            cursor = ?request.last_visible,
            "aggregating user feeds"
        );

        if group_ids.is_empty() {
            return Ok(FeedPage {
                feeds: Vec::new(),
                last_visible: None,
                has_more: false,
            });
        }

        let fetch_limit = limit.max(MIN_FETCH_LIMIT);

        // Content fan-out and membership fan-out have no data dependency;
        // run the two batches concurrently and join on both.
        let (result_sets, rosters) = tokio::try_join!(
            self.fan_out_queries(&group_ids, request.last_visible, fetch_limit),
            self.resolve_rosters(&group_ids),
        )?;

        Ok(assemble_page(result_sets, &rosters, limit))
    }
}

impl FeedService {
    /// Issue one filtered, ordered, bounded query per feed-item type.
    async fn fan_out_queries(
        &self,
        group_ids: &[String],
        created_before: Option<i64>,
        fetch_limit: i64,
    ) -> Result<Vec<(&'static FeedTypeConfig, Vec<RawDocument>)>, FeedServiceError> {
        try_join_all(FEED_TYPE_CONFIGS.iter().map(|config| {
            let query = FeedQuery {
                collection: config.collection,
                group_id_field: config.group_id_field,
                timestamp_field: config.timestamp_field,
                group_ids: group_ids.to_vec(),
                created_before,
                limit: fetch_limit,
                extra_filters: config.extra_filters,
            };
            async move {
                let documents = self
                    .store
                    .query_feed_documents(&query)
                    .await
                    .map_err(|e| FeedServiceError::Dependency(e.to_string()))?;
                Ok::<_, FeedServiceError>((config, documents))
            }
        }))
        .await
    }

    /// Fetch every requested group's full member roster.
    async fn resolve_rosters(
        &self,
        group_ids: &[String],
    ) -> Result<HashMap<String, Vec<Member>>, FeedServiceError> {
        let rosters = try_join_all(group_ids.iter().map(|group_id| async move {
            let documents = self
                .store
                .fetch_group_members(group_id)
                .await
                .map_err(|e| FeedServiceError::Dependency(e.to_string()))?;
            Ok::<_, FeedServiceError>((group_id.clone(), parse_members(group_id, documents)))
        }))
        .await?;

        Ok(rosters.into_iter().collect())
    }
}

fn parse_members(group_id: &str, documents: Vec<RawDocument>) -> Vec<Member> {
    documents
        .into_iter()
        .filter_map(|doc| match serde_json::from_value::<Member>(doc.payload) {
            Ok(member) => Some(member),
            Err(e) => {
                tracing::warn!(
                    group_id,
                    doc_id = %doc.id,
                    error = %e,
                    "skipping malformed member document"
                );
                None
            }
        })
        .collect()
}

/// Merge the per-type result sets into one sorted, truncated page.
fn assemble_page(
    result_sets: Vec<(&'static FeedTypeConfig, Vec<RawDocument>)>,
    rosters: &HashMap<String, Vec<Member>>,
    limit: i64,
) -> FeedPage {
    let mut combined: Vec<FeedItem> = result_sets
        .into_iter()
        .flat_map(|(config, documents)| {
            documents
                .into_iter()
                .map(move |doc| normalize_item(config, doc, rosters))
        })
        .collect();

    // Each per-type set arrives pre-sorted, but a global sort over the
    // bounded combined set is simpler than an n-way merge. Stable, so
    // equal timestamps keep their merge order within this invocation.
    combined.sort_by(|a, b| b.metadata.timestamp.cmp(&a.metadata.timestamp));

    let has_more = combined.len() as i64 > limit;
    combined.truncate(limit as usize);
    let last_visible = combined.last().map(|item| item.metadata.timestamp);

    FeedPage {
        feeds: combined,
        last_visible,
        has_more,
    }
}

fn normalize_item(
    config: &FeedTypeConfig,
    doc: RawDocument,
    rosters: &HashMap<String, Vec<Member>>,
) -> FeedItem {
    let group_id = field_at(&doc.payload, config.group_id_field)
        .and_then(Value::as_str)
        .unwrap_or_else(|| {
            tracing::warn!(
                collection = config.collection,
                doc_id = %doc.id,
                "document missing its group id field"
            );
            ""
        })
        .to_string();

    let timestamp = field_at(&doc.payload, config.timestamp_field)
        .and_then(timestamp_millis)
        .unwrap_or(0);

    let members = rosters.get(&group_id).cloned().unwrap_or_default();

    FeedItem {
        identifier: ItemIdentifier {
            id: doc.id,
            group_id,
        },
        metadata: ItemMetadata {
            item_type: config.item_type,
            timestamp,
        },
        members,
        data: doc.payload,
    }
}
