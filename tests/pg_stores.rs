//! Postgres store decoding. Runs only when `TEST_DATABASE_URL` is set.

use live_tally::db::{DbPool, PgResultStore, PgVoteStore, ResultStore, VoteStore};
use live_tally::error::StoreError;
use sqlx::postgres::PgPoolOptions;
use uuid::Uuid;

/// A one-connection pool pinned to a fresh schema, so the tables below
/// shadow whatever the database already holds.
async fn scratch_pool() -> Option<(DbPool, String)> {
    let url = std::env::var("TEST_DATABASE_URL").ok()?;
    let pool = PgPoolOptions::new()
        .max_connections(1)
        .connect(&url)
        .await
        .unwrap();
    let schema = format!("live_tally_{}", Uuid::new_v4().simple());
    sqlx::query(&format!("CREATE SCHEMA {schema}"))
        .execute(&pool)
        .await
        .unwrap();
    sqlx::query(&format!("SET search_path TO {schema}"))
        .execute(&pool)
        .await
        .unwrap();
    Some((pool, schema))
}

async fn drop_schema(pool: &DbPool, schema: &str) {
    sqlx::query(&format!("DROP SCHEMA {schema} CASCADE"))
        .execute(pool)
        .await
        .unwrap();
}

#[tokio::test]
async fn test_mistyped_result_column_is_an_error_not_a_panic() {
    let Some((pool, schema)) = scratch_pool().await else {
        return;
    };
    sqlx::query(
        "CREATE TABLE results (event_id TEXT PRIMARY KEY, results JSONB NOT NULL, calculated_at TEXT NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO results VALUES ('e1', '{\"red\": 1}', 'yesterday')")
        .execute(&pool)
        .await
        .unwrap();

    let store = PgResultStore::new(pool.clone());
    let err = store.find("e1").await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    drop_schema(&pool, &schema).await;
}

#[tokio::test]
async fn test_mistyped_vote_column_is_an_error_not_a_panic() {
    let Some((pool, schema)) = scratch_pool().await else {
        return;
    };
    sqlx::query(
        "CREATE TABLE votes (id UUID PRIMARY KEY, user_id UUID NOT NULL, event_id TEXT NOT NULL, vote TEXT NOT NULL, voted_at TEXT NOT NULL)",
    )
    .execute(&pool)
    .await
    .unwrap();
    sqlx::query("INSERT INTO votes VALUES ($1, $2, 'e1', 'red', 'yesterday')")
        .bind(Uuid::new_v4())
        .bind(Uuid::new_v4())
        .execute(&pool)
        .await
        .unwrap();

    let store = PgVoteStore::new(pool.clone());
    let err = store.find("e1").await.unwrap_err();
    assert!(matches!(err, StoreError::Database(_)));

    drop_schema(&pool, &schema).await;
}
