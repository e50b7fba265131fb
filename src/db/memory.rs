//! In-process stores used when no database is configured, and by the tests.

use crate::db::models::{NewUser, Tally, User, Vote};
use crate::db::store::{ResultStore, UserStore, VoteStore};
use crate::error::StoreError;
use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

#[derive(Default)]
pub struct MemoryVoteStore {
    votes: RwLock<Vec<Vote>>,
}

impl MemoryVoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl VoteStore for MemoryVoteStore {
    async fn insert(&self, vote: Vote) -> Result<Uuid, StoreError> {
        let id = vote.id;
        self.votes.write().await.push(vote);
        Ok(id)
    }

    async fn find(&self, event_id: &str) -> Result<Vec<Vote>, StoreError> {
        let votes = self.votes.read().await;
        Ok(votes
            .iter()
            .filter(|v| v.event_id == event_id)
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct MemoryResultStore {
    results: RwLock<HashMap<String, Tally>>,
}

impl MemoryResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored tallies across all events.
    pub async fn len(&self) -> usize {
        self.results.read().await.len()
    }
}

#[async_trait]
impl ResultStore for MemoryResultStore {
    async fn upsert(&self, tally: &Tally) -> Result<(), StoreError> {
        self.results
            .write()
            .await
            .insert(tally.event_id.clone(), tally.clone());
        Ok(())
    }

    async fn find(&self, event_id: &str) -> Result<Option<Tally>, StoreError> {
        Ok(self.results.read().await.get(event_id).cloned())
    }
}

#[derive(Default)]
pub struct MemoryUserStore {
    users: RwLock<HashMap<String, User>>,
}

impl MemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl UserStore for MemoryUserStore {
    async fn create(&self, user: NewUser) -> Result<Option<User>, StoreError> {
        let mut users = self.users.write().await;
        if users.contains_key(&user.email) {
            return Ok(None);
        }

        let created = User {
            id: Uuid::new_v4(),
            username: user.username,
            email: user.email.clone(),
            password_hash: user.password_hash,
            registered_at: Utc::now(),
        };
        users.insert(user.email, created.clone());
        Ok(Some(created))
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<User>, StoreError> {
        Ok(self.users.read().await.get(email).cloned())
    }
}
