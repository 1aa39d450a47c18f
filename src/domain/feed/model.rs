use super::types::FeedItemType;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Globally unique within one merged feed by `(type, id)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemIdentifier {
    pub id: String,
    #[serde(rename = "groupId")]
    pub group_id: String,
}

/// The sort key of the merged feed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ItemMetadata {
    #[serde(rename = "type")]
    pub item_type: FeedItemType,
    /// Creation time, epoch millis. Defaults to 0 when the source document
    /// is missing its timestamp field.
    pub timestamp: i64,
}

/// Denormalized snapshot of a group participant at fetch time. Purely a
/// rendering convenience; not guaranteed fresh.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Member {
    pub id: String,
    #[serde(rename = "displayName")]
    pub display_name: String,
    #[serde(rename = "photoURL", default, skip_serializing_if = "Option::is_none")]
    pub photo_url: Option<String>,
    pub role: String,
    #[serde(rename = "statusMessage", default, skip_serializing_if = "Option::is_none")]
    pub status_message: Option<String>,
}

/// One normalized entry of the merged feed. `data` carries the raw
/// type-specific payload through untouched for the presentation layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeedItem {
    pub identifier: ItemIdentifier,
    pub metadata: ItemMetadata,
    pub members: Vec<Member>,
    pub data: Value,
}

/// One assembled page of the merged feed, plus pagination metadata.
#[derive(Debug, Clone)]
pub struct FeedPage {
    pub feeds: Vec<FeedItem>,
    /// Timestamp of the last returned item; `None` when the page is empty.
    pub last_visible: Option<i64>,
    pub has_more: bool,
}
