pub mod error;
pub mod model;
pub mod service;
pub mod types;

pub use error::FeedServiceError;
pub use model::{FeedItem, FeedPage, ItemIdentifier, ItemMetadata, Member};
pub use service::{FeedService, FeedServiceApi};
pub use types::{FeedItemType, FeedTypeConfig, SchemaGeneration, FEED_TYPE_CONFIGS};

use serde::{Deserialize, Serialize};

/// Request to aggregate the caller's group feeds into one page
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct GetUserFeedsRequest {
    /// Pagination cursor, epoch millis; absent or null means first page.
    #[serde(rename = "lastVisible", default)]
    pub last_visible: Option<i64>,
    /// Desired page size; defaults to 10.
    #[serde(default)]
    pub limit: Option<i64>,
    /// Groups to aggregate across; defaults to none.
    #[serde(rename = "groupIds", default)]
    pub group_ids: Vec<String>,
}

/// Response for the feed aggregation endpoint
#[derive(Debug, Serialize, Deserialize)]
pub struct GetUserFeedsResponse {
    pub feeds: Vec<FeedItem>,
    #[serde(rename = "lastVisible")]
    pub last_visible: Option<i64>,
    #[serde(rename = "hasMore")]
    pub has_more: bool,
}

impl From<FeedPage> for GetUserFeedsResponse {
    fn from(page: FeedPage) -> Self {
        Self {
            feeds: page.feeds,
            last_visible: page.last_visible,
            has_more: page.has_more,
        }
    }
}
