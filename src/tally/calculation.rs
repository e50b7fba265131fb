//! The calculation task: read every vote for an event, aggregate, upsert the
//! tally, then publish it to the event's room.
//!
//! Runs are spawned onto the runtime and never report back to whoever
//! scheduled them; the stored tally is the only record of success. Two runs
//! for the same event are not serialized, so whichever upsert lands last is
//! what the result store keeps.

use crate::db::models::Tally;
use crate::db::store::{ResultStore, VoteStore};
use crate::error::StoreError;
use crate::realtime::Broadcaster;
use crate::tally::aggregate;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{error, info};

#[derive(Clone)]
pub struct Calculator {
    votes: Arc<dyn VoteStore>,
    results: Arc<dyn ResultStore>,
    broadcaster: Broadcaster,
    auto_trigger: Option<Arc<AutoTrigger>>,
}

impl Calculator {
    pub fn new(
        votes: Arc<dyn VoteStore>,
        results: Arc<dyn ResultStore>,
        broadcaster: Broadcaster,
    ) -> Self {
        Calculator {
            votes,
            results,
            broadcaster,
            auto_trigger: None,
        }
    }

    /// Schedule a run after every `every` recorded votes for an event.
    pub fn with_auto_trigger(mut self, every: Option<u64>) -> Self {
        self.auto_trigger = every.filter(|n| *n > 0).map(|n| Arc::new(AutoTrigger::new(n)));
        self
    }

    /// Spawns one calculation for `event_id` and returns immediately.
    ///
    /// Failures are logged inside the task. The handle only tells a caller that
    /// the task finished, not whether it succeeded.
    pub fn schedule(&self, event_id: impl Into<String>) -> JoinHandle<()> {
        let calculator = self.clone();
        let event_id = event_id.into();
        tokio::spawn(async move {
            if let Err(e) = calculator.run(&event_id).await {
                error!(event_id = %event_id, error = %e, "result calculation failed");
            }
        })
    }

    /// One full read-aggregate-upsert-publish cycle, on the current task.
    pub async fn run(&self, event_id: &str) -> Result<Tally, StoreError> {
        let votes = self.votes.find(event_id).await?;
        let tally = Tally {
            event_id: event_id.to_string(),
            counts: aggregate(&votes),
            computed_at: Utc::now(),
        };

        self.results.upsert(&tally).await?;

        let delivered = self.broadcaster.publish(tally.clone()).await;
        info!(
            event_id = %event_id,
            votes = tally.total_votes(),
            observers = delivered,
            "results calculated and emitted"
        );

        Ok(tally)
    }

    /// Called after a vote is stored. Schedules a run when the auto-trigger
    /// threshold for the event is reached.
    pub fn vote_recorded(&self, event_id: &str) -> Option<JoinHandle<()>> {
        let trigger = self.auto_trigger.as_ref()?;
        if trigger.observe(event_id) {
            info!(event_id = %event_id, "vote threshold reached, scheduling calculation");
            Some(self.schedule(event_id))
        } else {
            None
        }
    }
}

/// Per-event vote counter that fires every `every` votes.
pub struct AutoTrigger {
    every: u64,
    seen: Mutex<HashMap<String, u64>>,
}

impl AutoTrigger {
    pub fn new(every: u64) -> Self {
        AutoTrigger {
            every: every.max(1),
            seen: Mutex::new(HashMap::new()),
        }
    }

    pub fn observe(&self, event_id: &str) -> bool {
        let mut seen = match self.seen.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let count = seen.entry(event_id.to_string()).or_insert(0);
        *count += 1;
        *count % self.every == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auto_trigger_fires_every_n_votes_per_event() {
        let trigger = AutoTrigger::new(3);
        let fired: Vec<bool> = (0..6).map(|_| trigger.observe("e1")).collect();
        assert_eq!(fired, vec![false, false, true, false, false, true]);

        assert!(!trigger.observe("e2"));
    }

    #[test]
    fn auto_trigger_of_one_fires_on_every_vote() {
        let trigger = AutoTrigger::new(1);
        assert!(trigger.observe("e1"));
        assert!(trigger.observe("e1"));
    }
}
