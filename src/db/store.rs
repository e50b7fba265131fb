use crate::db::models::{NewUser, Tally, User, Vote};
use crate::error::StoreError;
use async_trait::async_trait;
use uuid::Uuid;

/// Append-only record of individual votes.
#[async_trait]
pub trait VoteStore: Send + Sync {
    async fn insert(&self, vote: Vote) -> Result<Uuid, StoreError>;

    /// Every vote recorded for `event_id`, read as one consistent snapshot.
    async fn find(&self, event_id: &str) -> Result<Vec<Vote>, StoreError>;
}

/// Latest tally per event, keyed uniquely by `event_id`.
#[async_trait]
pub trait ResultStore: Send + Sync {
    /// Replace-or-insert. Readers never observe a partially written tally.
    async fn upsert(&self, tally: &Tally) -> Result<(), StoreError>;

    async fn find(&self, event_id: &str) -> Result<Option<Tally>, StoreError>;
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Returns `Ok(None)` when the email is already registered.
    async fn create(&self, user: NewUser) -> Result<Option<User>, StoreError>;

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError>;
}
