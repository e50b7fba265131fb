use crate::db::connection::DbPool;
use crate::db::models::Vote;
use crate::db::store::VoteStore;
use crate::error::StoreError;
use async_trait::async_trait;
use sqlx::Row;
use uuid::Uuid;

#[derive(Clone)]
pub struct PgVoteStore {
    pool: DbPool,
}

impl PgVoteStore {
    pub fn new(pool: DbPool) -> Self {
        PgVoteStore { pool }
    }
}

#[async_trait]
impl VoteStore for PgVoteStore {
    async fn insert(&self, vote: Vote) -> Result<Uuid, StoreError> {
        sqlx::query(
            "INSERT INTO votes (id, user_id, event_id, vote, voted_at) VALUES ($1, $2, $3, $4, $5)",
        )
        .bind(vote.id)
        .bind(vote.voter_id)
        .bind(&vote.event_id)
        .bind(&vote.option)
        .bind(vote.cast_at)
        .execute(&self.pool)
        .await?;

        Ok(vote.id)
    }

    async fn find(&self, event_id: &str) -> Result<Vec<Vote>, StoreError> {
        // A single statement sees one snapshot, so no option is read torn.
        let rows = sqlx::query(
            "SELECT id, user_id, event_id, vote, voted_at FROM votes WHERE event_id = $1",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?;

        let votes = rows
            .into_iter()
            .map(|r| -> Result<Vote, sqlx::Error> {
                Ok(Vote {
                    id: r.try_get("id")?,
                    voter_id: r.try_get("user_id")?,
                    event_id: r.try_get("event_id")?,
                    option: r.try_get("vote")?,
                    cast_at: r.try_get("voted_at")?,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(votes)
    }
}
