use crate::config::Config;
use crate::db::{
    self, MemoryResultStore, MemoryUserStore, MemoryVoteStore, PgResultStore, PgUserStore,
    PgVoteStore, ResultStore, UserStore, VoteStore,
};
use crate::realtime::{Broadcaster, SubscriptionRegistry};
use crate::tally::Calculator;
use std::sync::Arc;
use tracing::{info, warn};

#[derive(Clone)]
pub struct AppState {
    pub votes: Arc<dyn VoteStore>,
    pub results: Arc<dyn ResultStore>,
    pub users: Arc<dyn UserStore>,
    pub broadcaster: Broadcaster,
    pub calculator: Calculator,
    pub bcrypt_cost: u32,
}

impl AppState {
    pub fn new(
        votes: Arc<dyn VoteStore>,
        results: Arc<dyn ResultStore>,
        users: Arc<dyn UserStore>,
        config: &Config,
    ) -> Self {
        let registry = Arc::new(SubscriptionRegistry::new(config.observer_buffer));
        let broadcaster = Broadcaster::new(registry);
        let calculator = Calculator::new(votes.clone(), results.clone(), broadcaster.clone())
            .with_auto_trigger(config.auto_calculate_every);

        AppState {
            votes,
            results,
            users,
            broadcaster,
            calculator,
            bcrypt_cost: config.bcrypt_cost,
        }
    }

    pub fn in_memory(config: &Config) -> Self {
        AppState::new(
            Arc::new(MemoryVoteStore::new()),
            Arc::new(MemoryResultStore::new()),
            Arc::new(MemoryUserStore::new()),
            config,
        )
    }

    /// Builds the state on Postgres when `DATABASE_URL` is set, otherwise on
    /// in-memory stores.
    pub async fn from_config(config: &Config) -> Result<Self, sqlx::Error> {
        let Some(database_url) = config.database_url.as_deref() else {
            warn!("DATABASE_URL not set, votes and results are kept in memory only");
            return Ok(AppState::in_memory(config));
        };

        let pool = db::init_db(database_url, config.db_max_connections).await?;
        info!("{}", db::get_pool_stats(&pool));
        db::spawn_health_check(pool.clone());

        Ok(AppState::new(
            Arc::new(PgVoteStore::new(pool.clone())),
            Arc::new(PgResultStore::new(pool.clone())),
            Arc::new(PgUserStore::new(pool)),
            config,
        ))
    }
}
