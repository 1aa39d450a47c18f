use crate::infrastructure::store::{FieldFilter, FilterOp, FilterValue};
use serde::{Deserialize, Serialize};

/// The closed set of content kinds aggregated into the unified feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum FeedItemType {
    Posts,
    FellowshipShares,
    PrayerRequests,
}

/// Which historical document layout a collection uses.
///
/// V1 keeps `createdAt` and `groupId` at the top level; V2 nests them under
/// `metadata.*` and `identifiers.*`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchemaGeneration {
    V1,
    V2,
}

/// Per-type query rules: where the collection lives and which field paths
/// encode creation time and group ownership. Adding a type or migrating a
/// schema generation is an edit here, not a code change.
#[derive(Debug, Clone, Copy)]
pub struct FeedTypeConfig {
    pub item_type: FeedItemType,
    pub collection: &'static str,
    pub schema: SchemaGeneration,
    pub timestamp_field: &'static str,
    pub group_id_field: &'static str,
    pub extra_filters: &'static [FieldFilter],
}

/// Posts can be soft-deleted in place; exclude anything flagged.
const NOT_SOFT_DELETED: &[FieldFilter] = &[FieldFilter {
    field: "deleted",
    op: FilterOp::Ne,
    value: FilterValue::Bool(true),
}];

pub const FEED_TYPE_CONFIGS: &[FeedTypeConfig] = &[
    FeedTypeConfig {
        item_type: FeedItemType::Posts,
        collection: "posts",
        schema: SchemaGeneration::V1,
        timestamp_field: "createdAt",
        group_id_field: "groupId",
        extra_filters: NOT_SOFT_DELETED,
    },
    FeedTypeConfig {
        item_type: FeedItemType::FellowshipShares,
        collection: "fellowship-shares",
        schema: SchemaGeneration::V2,
        timestamp_field: "metadata.createdAt",
        group_id_field: "identifiers.groupId",
        extra_filters: &[],
    },
    FeedTypeConfig {
        item_type: FeedItemType::PrayerRequests,
        collection: "prayer-requests",
        schema: SchemaGeneration::V1,
        timestamp_field: "createdAt",
        group_id_field: "groupId",
        extra_filters: &[],
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn type_serializes_as_kebab_case_collection_names() {
        assert_eq!(
            serde_json::to_string(&FeedItemType::FellowshipShares).unwrap(),
            "\"fellowship-shares\""
        );
        assert_eq!(
            serde_json::to_string(&FeedItemType::PrayerRequests).unwrap(),
            "\"prayer-requests\""
        );
        assert_eq!(serde_json::to_string(&FeedItemType::Posts).unwrap(), "\"posts\"");
    }

    #[test]
    fn v2_types_use_nested_field_paths() {
        for config in FEED_TYPE_CONFIGS {
            match config.schema {
                SchemaGeneration::V1 => {
                    assert_eq!(config.timestamp_field, "createdAt");
                    assert_eq!(config.group_id_field, "groupId");
                }
                SchemaGeneration::V2 => {
                    assert_eq!(config.timestamp_field, "metadata.createdAt");
                    assert_eq!(config.group_id_field, "identifiers.groupId");
                }
            }
        }
    }
}
