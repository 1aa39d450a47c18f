//! Exercises the production Postgres adapter against a real database.
//!
//! Gated on `TEST_DATABASE_URL`; each test works in freshly generated group
//! ids, so a shared database stays isolated between tests and runs.

use groupfeed_backend::domain::feed::{FeedTypeConfig, FEED_TYPE_CONFIGS};
use groupfeed_backend::infrastructure::db::DbPool;
use groupfeed_backend::infrastructure::store::{DocumentStore, FeedQuery, PostgresDocumentStore};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use sqlx::postgres::PgPoolOptions;
use std::sync::Arc;
use uuid::Uuid;

async fn test_store() -> Option<(Arc<DbPool>, PostgresDocumentStore)> {
    let url = match std::env::var("TEST_DATABASE_URL") {
        Ok(url) => url,
        Err(_) => {
            eprintln!("TEST_DATABASE_URL not set, skipping Postgres store test");
            return None;
        }
    };

    let pool = Arc::new(
        PgPoolOptions::new()
            .max_connections(5)
            .connect(&url)
            .await
            .expect("connect to TEST_DATABASE_URL"),
    );
    let store = PostgresDocumentStore::new(pool.clone());

    // Serialize schema bootstrap; concurrent CREATE OR REPLACE of the same
    // function can fail mid-flight.
    let mut conn = pool.acquire().await.expect("acquire connection");
    sqlx::query("SELECT pg_advisory_lock(727001)")
        .execute(&mut *conn)
        .await
        .expect("advisory lock");
    let ensured = store.ensure_schema().await;
    sqlx::query("SELECT pg_advisory_unlock(727001)")
        .execute(&mut *conn)
        .await
        .expect("advisory unlock");
    ensured.expect("ensure schema");

    Some((pool, store))
}

async fn seed(pool: &DbPool, group_id: &str, collection: &str, doc_id: &str, payload: Value) {
    sqlx::query(
        r#"
        INSERT INTO group_documents (group_id, collection, doc_id, payload)
        VALUES ($1, $2, $3, $4)
        "#,
    )
    .bind(group_id)
    .bind(collection)
    .bind(doc_id)
    .bind(payload)
    .execute(pool)
    .await
    .expect("seed document");
}

fn fresh_group() -> String {
    format!("g-{}", Uuid::new_v4().simple())
}

fn type_config(collection: &str) -> &'static FeedTypeConfig {
    FEED_TYPE_CONFIGS
        .iter()
        .find(|config| config.collection == collection)
        .expect("known collection")
}

fn query_for(
    config: &'static FeedTypeConfig,
    group_ids: &[String],
    created_before: Option<i64>,
    limit: i64,
) -> FeedQuery {
    FeedQuery {
        collection: config.collection,
        group_id_field: config.group_id_field,
        timestamp_field: config.timestamp_field,
        group_ids: group_ids.to_vec(),
        created_before,
        limit,
        extra_filters: config.extra_filters,
    }
}

fn post(group_id: &str, ts: i64) -> Value {
    json!({ "groupId": group_id, "createdAt": ts, "title": format!("post at {ts}") })
}

#[tokio::test]
async fn scopes_to_the_group_set_orders_descending_and_limits() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let (g_a, g_b, g_other) = (fresh_group(), fresh_group(), fresh_group());
    seed(&pool, &g_a, "posts", "a1", post(&g_a, 100)).await;
    seed(&pool, &g_a, "posts", "a2", post(&g_a, 400)).await;
    seed(&pool, &g_b, "posts", "b1", post(&g_b, 300)).await;
    seed(&pool, &g_b, "posts", "b2", post(&g_b, 200)).await;
    seed(&pool, &g_other, "posts", "x1", post(&g_other, 500)).await;

    let documents = store
        .query_feed_documents(&query_for(
            type_config("posts"),
            &[g_a.clone(), g_b.clone()],
            None,
            3,
        ))
        .await
        .unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["a2", "b1", "b2"]);
}

#[tokio::test]
async fn excludes_soft_deleted_posts_but_keeps_legacy_documents() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let group = fresh_group();
    let mut gone = post(&group, 300);
    gone["deleted"] = json!(true);
    let mut kept = post(&group, 200);
    kept["deleted"] = json!(false);
    seed(&pool, &group, "posts", "gone", gone).await;
    seed(&pool, &group, "posts", "kept", kept).await;
    seed(&pool, &group, "posts", "legacy", post(&group, 100)).await;

    let documents = store
        .query_feed_documents(&query_for(type_config("posts"), &[group.clone()], None, 10))
        .await
        .unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["kept", "legacy"]);
}

#[tokio::test]
async fn cursor_bound_is_exclusive() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let group = fresh_group();
    for ts in [100, 200, 300, 400] {
        seed(&pool, &group, "posts", &format!("p{ts}"), post(&group, ts)).await;
    }

    let documents = store
        .query_feed_documents(&query_for(
            type_config("posts"),
            &[group.clone()],
            Some(300),
            10,
        ))
        .await
        .unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["p200", "p100"]);
}

#[tokio::test]
async fn queries_nested_v2_field_paths() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let (group, other) = (fresh_group(), fresh_group());
    let share = |g: &str, ts: i64| {
        json!({
            "identifiers": { "groupId": g },
            "metadata": { "createdAt": ts },
            "info": { "preachTitle": format!("share at {ts}") }
        })
    };
    seed(&pool, &group, "fellowship-shares", "s1", share(&group, 100)).await;
    seed(&pool, &group, "fellowship-shares", "s2", share(&group, 200)).await;
    seed(&pool, &other, "fellowship-shares", "s3", share(&other, 300)).await;

    let documents = store
        .query_feed_documents(&query_for(
            type_config("fellowship-shares"),
            &[group.clone()],
            None,
            10,
        ))
        .await
        .unwrap();

    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids, vec!["s2", "s1"]);
}

#[tokio::test]
async fn tolerates_non_numeric_timestamps_instead_of_failing_the_query() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let group = fresh_group();
    seed(&pool, &group, "posts", "numeric", post(&group, 300)).await;
    seed(
        &pool,
        &group,
        "posts",
        "rfc3339",
        json!({ "groupId": group, "createdAt": "2023-11-14T22:13:20Z" }),
    )
    .await;
    seed(
        &pool,
        &group,
        "posts",
        "garbage",
        json!({ "groupId": group, "createdAt": "not a date" }),
    )
    .await;
    seed(
        &pool,
        &group,
        "posts",
        "object",
        json!({ "groupId": group, "createdAt": { "seconds": 1 } }),
    )
    .await;

    let documents = store
        .query_feed_documents(&query_for(type_config("posts"), &[group.clone()], None, 10))
        .await
        .unwrap();

    // RFC3339 converts to real millis; garbage and non-scalar values sort
    // as epoch 0 rather than aborting the statement.
    let ids: Vec<&str> = documents.iter().map(|d| d.id.as_str()).collect();
    assert_eq!(ids[0], "rfc3339");
    assert_eq!(ids[1], "numeric");
    let mut tail: Vec<&str> = ids[2..].to_vec();
    tail.sort();
    assert_eq!(tail, vec!["garbage", "object"]);

    // An epoch-0 default also stays subject to the exclusive cursor bound.
    let paged = store
        .query_feed_documents(&query_for(
            type_config("posts"),
            &[group.clone()],
            Some(100),
            10,
        ))
        .await
        .unwrap();
    let mut paged_ids: Vec<&str> = paged.iter().map(|d| d.id.as_str()).collect();
    paged_ids.sort();
    assert_eq!(paged_ids, vec!["garbage", "object"]);
}

#[tokio::test]
async fn reads_the_full_roster_of_one_group() {
    let Some((pool, store)) = test_store().await else {
        return;
    };
    let (group, other) = (fresh_group(), fresh_group());
    seed(
        &pool,
        &group,
        "members",
        "u1",
        json!({ "id": "u1", "displayName": "Ana", "role": "leader" }),
    )
    .await;
    seed(
        &pool,
        &group,
        "members",
        "u2",
        json!({ "id": "u2", "displayName": "Ben", "role": "member" }),
    )
    .await;
    seed(
        &pool,
        &other,
        "members",
        "u3",
        json!({ "id": "u3", "displayName": "Cho", "role": "member" }),
    )
    .await;

    let roster = store.fetch_group_members(&group).await.unwrap();
    let mut ids: Vec<&str> = roster.iter().map(|d| d.id.as_str()).collect();
    ids.sort();
    assert_eq!(ids, vec!["u1", "u2"]);

    let empty = store.fetch_group_members(&fresh_group()).await.unwrap();
    assert!(empty.is_empty());
}
