use super::{DocumentStore, FeedQuery, FilterOp, RawDocument};
use crate::error::AppResult;
use crate::infrastructure::db::DbPool;
use async_trait::async_trait;
use sqlx::{Postgres, QueryBuilder, Row};
use std::sync::Arc;

/// Document store backed by a single JSONB table.
///
/// Every group sub-collection document lives in `group_documents`; a
/// collection-group query is a filter on `collection` plus JSONB path
/// predicates. Payload timestamps are epoch-millis numbers or RFC3339
/// strings; anything else sorts and filters as epoch 0, like the
/// normalizer treats it.
pub struct PostgresDocumentStore {
    pool: Arc<DbPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: Arc<DbPool>) -> Self {
        Self { pool }
    }

    /// Create the backing table, index and timestamp helper if they do
    /// not exist yet.
    pub async fn ensure_schema(&self) -> AppResult<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS group_documents (
                group_id TEXT NOT NULL,
                collection TEXT NOT NULL,
                doc_id TEXT NOT NULL,
                payload JSONB NOT NULL,
                PRIMARY KEY (group_id, collection, doc_id)
            )
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        sqlx::query(
            r#"
            CREATE INDEX IF NOT EXISTS idx_group_documents_collection
            ON group_documents (collection)
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        // Converts a payload timestamp to epoch millis the way the
        // normalizer does: numbers pass through, RFC3339 strings convert,
        // anything absent or malformed becomes 0 instead of aborting the
        // statement with a cast error.
        sqlx::query(
            r#"
            CREATE OR REPLACE FUNCTION feed_timestamp_millis(payload JSONB, path TEXT[])
            RETURNS BIGINT AS $$
            DECLARE
                raw JSONB;
            BEGIN
                raw := payload #> path;
                IF raw IS NULL THEN
                    RETURN 0;
                ELSIF jsonb_typeof(raw) = 'number' THEN
                    RETURN trunc((raw #>> '{}')::numeric)::bigint;
                ELSIF jsonb_typeof(raw) = 'string' THEN
                    RETURN (extract(epoch FROM (raw #>> '{}')::timestamptz) * 1000)::bigint;
                ELSE
                    RETURN 0;
                END IF;
            EXCEPTION WHEN others THEN
                RETURN 0;
            END;
            $$ LANGUAGE plpgsql STABLE
            "#,
        )
        .execute(self.pool.as_ref())
        .await?;

        Ok(())
    }
}

fn path_segments(path: &str) -> Vec<String> {
    path.split('.').map(str::to_string).collect()
}

/// Push `feed_timestamp_millis(payload, <path>)` so documents with a
/// missing or malformed timestamp sort and filter as epoch 0, matching
/// the normalizer.
fn push_timestamp_expr(builder: &mut QueryBuilder<'_, Postgres>, path: &str) {
    builder.push("feed_timestamp_millis(payload, ");
    builder.push_bind(path_segments(path));
    builder.push(")");
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    async fn query_feed_documents(&self, query: &FeedQuery) -> AppResult<Vec<RawDocument>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new("SELECT doc_id, payload FROM group_documents WHERE collection = ");
        builder.push_bind(query.collection);

        builder.push(" AND payload #>> ");
        builder.push_bind(path_segments(query.group_id_field));
        builder.push(" = ANY(");
        builder.push_bind(query.group_ids.clone());
        builder.push(")");

        for filter in query.extra_filters {
            builder.push(" AND payload #>> ");
            builder.push_bind(path_segments(filter.field));
            match filter.op {
                FilterOp::Eq => builder.push(" = "),
                FilterOp::Ne => builder.push(" IS DISTINCT FROM "),
            };
            builder.push_bind(filter.value.as_text());
        }

        if let Some(before) = query.created_before {
            builder.push(" AND ");
            push_timestamp_expr(&mut builder, query.timestamp_field);
            builder.push(" < ");
            builder.push_bind(before);
        }

        builder.push(" ORDER BY ");
        push_timestamp_expr(&mut builder, query.timestamp_field);
        builder.push(" DESC LIMIT ");
        builder.push_bind(query.limit);

        let rows = builder.build().fetch_all(self.pool.as_ref()).await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(RawDocument {
                id: row.try_get("doc_id")?,
                payload: row.try_get("payload")?,
            });
        }

        Ok(documents)
    }

    async fn fetch_group_members(&self, group_id: &str) -> AppResult<Vec<RawDocument>> {
        let rows = sqlx::query(
            r#"
            SELECT doc_id, payload FROM group_documents
            WHERE group_id = $1 AND collection = 'members'
            "#,
        )
        .bind(group_id)
        .fetch_all(self.pool.as_ref())
        .await?;

        let mut documents = Vec::with_capacity(rows.len());
        for row in rows {
            documents.push(RawDocument {
                id: row.try_get("doc_id")?,
                payload: row.try_get("payload")?,
            });
        }

        Ok(documents)
    }
}
