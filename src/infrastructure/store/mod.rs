pub mod memory;
pub mod postgres;

pub use memory::MemoryDocumentStore;
pub use postgres::PostgresDocumentStore;

use crate::error::AppResult;
use async_trait::async_trait;
use serde_json::Value;

/// A raw document as returned by the store: the handle id plus the
/// untouched payload. Field extraction is left to the caller, since the
/// payload layout differs per collection and schema generation.
#[derive(Debug, Clone)]
pub struct RawDocument {
    pub id: String,
    pub payload: Value,
}

/// Comparison operator for an extra query predicate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterOp {
    Eq,
    Ne,
}

/// Const-friendly filter value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FilterValue {
    Bool(bool),
    Text(&'static str),
}

impl FilterValue {
    /// Textual form used when comparing against a JSON field rendered as text.
    pub fn as_text(&self) -> String {
        match self {
            FilterValue::Bool(b) => b.to_string(),
            FilterValue::Text(s) => (*s).to_string(),
        }
    }
}

/// An extra predicate on a document field, e.g. excluding soft-deleted posts.
///
/// `Ne` matches documents where the field is absent or differs from the
/// value, so documents written before the field existed still qualify.
#[derive(Debug, Clone, Copy)]
pub struct FieldFilter {
    pub field: &'static str,
    pub op: FilterOp,
    pub value: FilterValue,
}

/// A bounded, ordered collection-group query over one feed collection.
///
/// The query spans the same-named sub-collection under every group; the
/// `group_ids` predicate scopes the results to the caller's groups.
#[derive(Debug, Clone)]
pub struct FeedQuery {
    /// Sub-collection name, e.g. `posts`.
    pub collection: &'static str,
    /// Dotted field path holding the owning group id.
    pub group_id_field: &'static str,
    /// Dotted field path holding the creation timestamp.
    pub timestamp_field: &'static str,
    /// Groups the caller belongs to; the `in` predicate.
    pub group_ids: Vec<String>,
    /// Exclusive upper bound on the creation timestamp, epoch millis.
    pub created_before: Option<i64>,
    /// Maximum number of documents to return.
    pub limit: i64,
    /// Type-specific extra predicates.
    pub extra_filters: &'static [FieldFilter],
}

/// Read-only boundary to the hierarchical document store.
///
/// The aggregation core only needs two capabilities: ordered, filtered,
/// bounded collection-group queries, and full roster reads. Implementations
/// decide how documents are physically stored.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Run one collection-group query, ordered by the timestamp field
    /// descending and bounded by `query.limit`.
    async fn query_feed_documents(&self, query: &FeedQuery) -> AppResult<Vec<RawDocument>>;

    /// Read the full `members` sub-collection of one group. Rosters are
    /// assumed small; no pagination.
    async fn fetch_group_members(&self, group_id: &str) -> AppResult<Vec<RawDocument>>;
}

/// Resolve a dotted field path (`metadata.createdAt`) inside a JSON payload.
pub fn field_at<'a>(payload: &'a Value, path: &str) -> Option<&'a Value> {
    path.split('.').try_fold(payload, |value, segment| value.get(segment))
}

/// Convert a stored timestamp value to epoch millis.
///
/// The store's native timestamp surfaces either as an integer number of
/// millis or as an RFC3339 string. Anything else yields `None`.
pub fn timestamp_millis(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => chrono::DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| dt.timestamp_millis()),
        _ => None,
    }
}

/// Evaluate an extra predicate against a payload. Comparison is on the
/// field's textual rendering; an absent field compares as absent.
pub fn matches_filter(payload: &Value, filter: &FieldFilter) -> bool {
    let actual = field_at(payload, filter.field).map(|v| match v {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    });
    let expected = filter.value.as_text();
    match filter.op {
        FilterOp::Eq => actual.as_deref() == Some(expected.as_str()),
        FilterOp::Ne => actual.as_deref() != Some(expected.as_str()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn field_at_resolves_nested_paths() {
        let payload = json!({"metadata": {"createdAt": 1700000000000_i64}});
        assert_eq!(
            field_at(&payload, "metadata.createdAt").and_then(Value::as_i64),
            Some(1700000000000)
        );
        assert_eq!(field_at(&payload, "metadata.missing"), None);
        assert_eq!(field_at(&payload, "identifiers.groupId"), None);
    }

    #[test]
    fn timestamp_millis_accepts_numbers_and_rfc3339() {
        assert_eq!(timestamp_millis(&json!(1700000000000_i64)), Some(1700000000000));
        assert_eq!(
            timestamp_millis(&json!("2023-11-14T22:13:20Z")),
            Some(1700000000000)
        );
        assert_eq!(timestamp_millis(&json!({"seconds": 1})), None);
        assert_eq!(timestamp_millis(&json!("not a date")), None);
    }

    #[test]
    fn ne_filter_keeps_documents_missing_the_field() {
        let filter = FieldFilter {
            field: "deleted",
            op: FilterOp::Ne,
            value: FilterValue::Bool(true),
        };
        assert!(matches_filter(&json!({"title": "hello"}), &filter));
        assert!(matches_filter(&json!({"deleted": false}), &filter));
        assert!(!matches_filter(&json!({"deleted": true}), &filter));
    }
}
