use crate::error::ConfigError;
use std::net::SocketAddr;
use std::ops::RangeInclusive;
use std::str::FromStr;

/// Work factors bcrypt accepts.
const BCRYPT_COST_RANGE: RangeInclusive<u32> = 4..=31;

#[derive(Debug, Clone)]
pub struct Config {
    pub bind_addr: SocketAddr,
    /// `None` runs the service on in-memory stores.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Capacity of each observer's outbound queue.
    pub observer_buffer: usize,
    /// Schedule a calculation after every N votes for an event.
    pub auto_calculate_every: Option<u64>,
    pub bcrypt_cost: u32,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 5000)),
            database_url: None,
            db_max_connections: 20,
            observer_buffer: 32,
            auto_calculate_every: None,
            bcrypt_cost: bcrypt::DEFAULT_COST,
        }
    }
}

impl Config {
    /// Reads the configuration from the environment, loading `.env` first if present.
    pub fn from_env() -> Result<Self, ConfigError> {
        let _ = dotenvy::dotenv();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Config::default();

        let bind_addr = parse_or("BIND_ADDR", lookup("BIND_ADDR"), defaults.bind_addr)?;
        let database_url = lookup("DATABASE_URL").filter(|url| !url.trim().is_empty());
        let db_max_connections = parse_or(
            "DB_MAX_CONNECTIONS",
            lookup("DB_MAX_CONNECTIONS"),
            defaults.db_max_connections,
        )?;
        let observer_buffer =
            parse_or("OBSERVER_BUFFER", lookup("OBSERVER_BUFFER"), defaults.observer_buffer)?;
        if observer_buffer == 0 {
            return Err(ConfigError::InvalidValue {
                key: "OBSERVER_BUFFER",
                value: "0".to_string(),
            });
        }

        let auto_calculate_every =
            parse_or::<u64>("AUTO_CALCULATE_EVERY", lookup("AUTO_CALCULATE_EVERY"), 0)?;
        let auto_calculate_every = (auto_calculate_every > 0).then_some(auto_calculate_every);

        let bcrypt_cost = parse_or("BCRYPT_COST", lookup("BCRYPT_COST"), defaults.bcrypt_cost)?;
        if !BCRYPT_COST_RANGE.contains(&bcrypt_cost) {
            return Err(ConfigError::InvalidValue {
                key: "BCRYPT_COST",
                value: bcrypt_cost.to_string(),
            });
        }

        Ok(Config {
            bind_addr,
            database_url,
            db_max_connections,
            observer_buffer,
            auto_calculate_every,
            bcrypt_cost,
        })
    }
}

fn parse_or<T: FromStr>(
    key: &'static str,
    raw: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    let Some(value) = raw else {
        return Ok(default);
    };
    match value.trim().parse() {
        Ok(parsed) => Ok(parsed),
        Err(_) => Err(ConfigError::InvalidValue { key, value }),
    }
}
