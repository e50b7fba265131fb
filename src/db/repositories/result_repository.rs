use crate::db::connection::DbPool;
use crate::db::models::{Counts, Tally};
use crate::db::store::ResultStore;
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::Row;
use sqlx::types::Json;

#[derive(Clone)]
pub struct PgResultStore {
    pool: DbPool,
}

impl PgResultStore {
    pub fn new(pool: DbPool) -> Self {
        PgResultStore { pool }
    }
}

#[async_trait]
impl ResultStore for PgResultStore {
    async fn upsert(&self, tally: &Tally) -> Result<(), StoreError> {
        sqlx::query(
            r#"
            INSERT INTO results (event_id, results, calculated_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (event_id)
            DO UPDATE SET results = EXCLUDED.results, calculated_at = EXCLUDED.calculated_at
            "#,
        )
        .bind(&tally.event_id)
        .bind(Json(&tally.counts))
        .bind(tally.computed_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<Tally>, StoreError> {
        let row =
            sqlx::query("SELECT event_id, results, calculated_at FROM results WHERE event_id = $1")
                .bind(event_id)
                .fetch_optional(&self.pool)
                .await?;

        let Some(row) = row else {
            return Ok(None);
        };

        let counts: Json<Counts> = row
            .try_get("results")
            .map_err(|_| StoreError::CorruptTally(event_id.to_string()))?;
        let computed_at: DateTime<Utc> = row.try_get("calculated_at")?;

        Ok(Some(Tally {
            event_id: row.try_get("event_id")?,
            counts: counts.0,
            computed_at,
        }))
    }
}
