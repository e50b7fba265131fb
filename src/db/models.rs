use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Per-option vote counts, keyed by the option string exactly as submitted.
pub type Counts = BTreeMap<String, u64>;

#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct User {
    pub id: Uuid,
    pub username: String,
    pub email: String,
    #[serde(skip_serializing)]
    pub password_hash: String,
    pub registered_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Vote {
    pub id: Uuid,
    pub voter_id: Uuid,
    pub event_id: String,
    pub option: String,
    pub cast_at: DateTime<Utc>,
}

impl Vote {
    pub fn new(voter_id: Uuid, event_id: impl Into<String>, option: impl Into<String>) -> Self {
        Vote {
            id: Uuid::new_v4(),
            voter_id,
            event_id: event_id.into(),
            option: option.into(),
            cast_at: Utc::now(),
        }
    }
}

/// Latest computed result for one event. One row per `event_id`, replaced wholesale.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Tally {
    pub event_id: String,
    #[serde(rename = "results")]
    pub counts: Counts,
    #[serde(rename = "calculated_at")]
    pub computed_at: DateTime<Utc>,
}

impl Tally {
    pub fn total_votes(&self) -> u64 {
        self.counts.values().sum()
    }
}
