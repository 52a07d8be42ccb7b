//! Postgres-backed document store.
//!
//! All collections share one `documents` table holding `jsonb` bodies.
//! Uniqueness is enforced by partial expression indexes named
//! `uniq_<collection>_<field>`.
//!
//! ## Error Mapping
//!
//! | SQLx Error | PostgreSQL Error Code | StoreError |
//! |------------|----------------------|------------|
//! | Database (unique violation) | `23505` | `Duplicate` |
//! | Database (other) | Any other | `Backend` |
//! | PoolTimedOut / PoolClosed / Io | N/A | `Backend` |
//!
//! Filter values that parse as numbers compare numerically against numeric
//! fields; other values compare as text. Unlike the in-memory engine, a
//! non-numeric value against a numeric field simply does not match.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use sqlx::postgres::PgPoolOptions;
use sqlx::{PgPool, Postgres, QueryBuilder, Row};
use tracing::instrument;
use uuid::Uuid;

use natours_core::{Condition, Direction, DocumentQuery, FieldFilter, StoreError};

use super::{Collection, DocumentStore, display_value, revision_of, stamp};

#[derive(Debug, Clone)]
pub struct PostgresDocumentStore {
    pool: Arc<PgPool>,
}

impl PostgresDocumentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool: Arc::new(pool) }
    }

    /// Connect, bounding how long a request may wait for a pooled connection.
    pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, StoreError> {
        let pool = PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(acquire_timeout)
            .connect(url)
            .await
            .map_err(|e| map_sqlx_error("connect", e))?;

        let store = Self::new(pool);
        store.ensure_schema().await?;
        Ok(store)
    }

    /// Create the table and unique indexes if they do not exist yet.
    pub async fn ensure_schema(&self) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS documents (
                collection TEXT NOT NULL,
                id UUID NOT NULL,
                body JSONB NOT NULL,
                created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
                PRIMARY KEY (collection, id)
            )
            "#,
        )
        .execute(&*self.pool)
        .await
        .map_err(|e| map_sqlx_error("ensure_schema", e))?;

        for collection in Collection::ALL {
            for field in collection.unique_fields() {
                let sql = format!(
                    "CREATE UNIQUE INDEX IF NOT EXISTS uniq_{name}_{field} ON documents ((body->>'{field}')) WHERE collection = '{name}'",
                    name = collection.name(),
                );
                sqlx::query(&sql)
                    .execute(&*self.pool)
                    .await
                    .map_err(|e| map_sqlx_error("ensure_schema", e))?;
            }
        }

        Ok(())
    }
}

#[async_trait]
impl DocumentStore for PostgresDocumentStore {
    #[instrument(skip(self, doc), fields(collection = %collection))]
    async fn insert(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Value, StoreError> {
        let doc = stamp(doc, id, 0)?;

        sqlx::query("INSERT INTO documents (collection, id, body) VALUES ($1, $2, $3)")
            .bind(collection.name())
            .bind(id)
            .bind(sqlx::types::Json(&doc))
            .execute(&*self.pool)
            .await
            .map_err(|e| map_write_error("insert", collection, &doc, e))?;

        Ok(doc)
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn get(&self, collection: Collection, id: Uuid) -> Result<Option<Value>, StoreError> {
        let row = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.name())
            .bind(id)
            .fetch_optional(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("get", e))?;

        row.map(|r| decode_body(&r)).transpose()
    }

    #[instrument(skip(self, doc), fields(collection = %collection))]
    async fn replace(&self, collection: Collection, id: Uuid, doc: Value) -> Result<Option<Value>, StoreError> {
        let mut tx = self
            .pool
            .begin()
            .await
            .map_err(|e| map_sqlx_error("replace", e))?;

        let current = sqlx::query("SELECT body FROM documents WHERE collection = $1 AND id = $2 FOR UPDATE")
            .bind(collection.name())
            .bind(id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| map_sqlx_error("replace", e))?;

        let Some(current) = current else {
            return Ok(None);
        };
        let doc = stamp(doc, id, revision_of(&decode_body(&current)?) + 1)?;

        sqlx::query("UPDATE documents SET body = $3 WHERE collection = $1 AND id = $2")
            .bind(collection.name())
            .bind(id)
            .bind(sqlx::types::Json(&doc))
            .execute(&mut *tx)
            .await
            .map_err(|e| map_write_error("replace", collection, &doc, e))?;

        tx.commit().await.map_err(|e| map_sqlx_error("replace", e))?;
        Ok(Some(doc))
    }

    #[instrument(skip(self), fields(collection = %collection))]
    async fn delete(&self, collection: Collection, id: Uuid) -> Result<bool, StoreError> {
        let result = sqlx::query("DELETE FROM documents WHERE collection = $1 AND id = $2")
            .bind(collection.name())
            .bind(id)
            .execute(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("delete", e))?;

        Ok(result.rows_affected() > 0)
    }

    #[instrument(skip(self, query), fields(collection = %collection))]
    async fn find(&self, collection: Collection, query: &DocumentQuery) -> Result<Vec<Value>, StoreError> {
        let mut sql: QueryBuilder<Postgres> = QueryBuilder::new("SELECT body FROM documents WHERE collection = ");
        sql.push_bind(collection.name());

        for filter in query.filters() {
            push_filter(&mut sql, filter)?;
        }

        if !query.sort_keys().is_empty() {
            sql.push(" ORDER BY ");
            let mut order = sql.separated(", ");
            for key in query.sort_keys() {
                order.push("body #> ");
                order.push_bind_unseparated(path_of(&key.field));
                order.push_unseparated(match key.direction {
                    Direction::Asc => " ASC NULLS FIRST",
                    Direction::Desc => " DESC NULLS LAST",
                });
            }
        }

        if let Some(limit) = query.limit_count() {
            sql.push(" LIMIT ");
            sql.push_bind(i64::try_from(limit).unwrap_or(i64::MAX));
        }
        sql.push(" OFFSET ");
        sql.push_bind(i64::try_from(query.skip_count()).unwrap_or(i64::MAX));

        let rows = sql
            .build()
            .fetch_all(&*self.pool)
            .await
            .map_err(|e| map_sqlx_error("find", e))?;

        let projection = query.projection();
        rows.iter()
            .map(|row| decode_body(row).map(|doc| projection.apply(doc)))
            .collect()
    }
}

fn push_filter(sql: &mut QueryBuilder<'_, Postgres>, filter: &FieldFilter) -> Result<(), StoreError> {
    let path = path_of(&filter.field);
    match &filter.condition {
        Condition::Eq(value) => push_comparison(sql, path, "=", value),
        cond @ Condition::Operators(_) => {
            for (op, value) in cond.comparisons()? {
                push_comparison(sql, path.clone(), op.as_sql(), value);
            }
        }
    }
    Ok(())
}

/// `AND <typed field> <op> <value>`; numeric when the value parses as a number.
fn push_comparison(sql: &mut QueryBuilder<'_, Postgres>, path: Vec<String>, op: &str, value: &Value) {
    let text = display_value(value);
    sql.push(" AND ");
    if let Ok(number) = text.trim().parse::<f64>() {
        sql.push("(jsonb_typeof(body #> ");
        sql.push_bind(path.clone());
        sql.push(") = 'number' AND (body #>> ");
        sql.push_bind(path);
        sql.push(format!(")::double precision {op} "));
        sql.push_bind(number);
        sql.push(")");
    } else {
        sql.push("(body #>> ");
        sql.push_bind(path);
        sql.push(format!(") {op} "));
        sql.push_bind(text);
    }
}

fn path_of(field: &str) -> Vec<String> {
    field.split('.').map(str::to_string).collect()
}

fn decode_body(row: &sqlx::postgres::PgRow) -> Result<Value, StoreError> {
    row.try_get::<sqlx::types::Json<Value>, _>("body")
        .map(|json| json.0)
        .map_err(|e| StoreError::corrupt(format!("failed to decode document body: {e}")))
}

/// Like [`map_sqlx_error`], but names the offending field on a unique violation.
fn map_write_error(operation: &str, collection: Collection, doc: &Value, err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if db_err.code().as_deref() == Some("23505") {
            let field = db_err
                .constraint()
                .and_then(|c| c.strip_prefix(&format!("uniq_{}_", collection.name())))
                .unwrap_or("id")
                .to_string();
            let value = doc.get(&field).map(display_value).unwrap_or_default();
            return StoreError::Duplicate { field, value };
        }
    }
    map_sqlx_error(operation, err)
}

fn map_sqlx_error(operation: &str, err: sqlx::Error) -> StoreError {
    match err {
        sqlx::Error::Database(db_err) => {
            StoreError::backend(format!("database error in {}: {}", operation, db_err.message()))
        }
        sqlx::Error::PoolTimedOut => StoreError::backend(format!("timed out acquiring a connection in {operation}")),
        sqlx::Error::PoolClosed => StoreError::backend(format!("connection pool closed in {operation}")),
        other => StoreError::backend(format!("sqlx error in {operation}: {other}")),
    }
}
