use std::{env, fmt::Display, str::FromStr, time::Duration};

use log::*;
use marketplace_engine::{sqlite::db::db_url, RetryPolicy};
use mkt_common::helpers::parse_boolean_flag;

const DEFAULT_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_RECONCILE_INTERVAL: Duration = Duration::from_secs(60);
const DEFAULT_MAX_ATTEMPTS: u32 = 4;
const DEFAULT_RETRY_DELAY: Duration = Duration::from_millis(50);
const MAX_RETRY_DELAY: Duration = Duration::from_secs(2);

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WorkerConfig {
    pub database_url: String,
    pub max_connections: u32,
    /// The pause between the end of one reconciliation pass and the start of the next.
    pub reconcile_interval: Duration,
    /// Attempts per transition, including the first, before the order is flagged.
    pub max_attempts: u32,
    /// The delay before the first retry. Later retries double it, up to a cap.
    pub retry_delay: Duration,
    /// Run a single reconciliation pass and exit, e.g. from cron.
    pub run_once: bool,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            database_url: db_url(),
            max_connections: DEFAULT_MAX_CONNECTIONS,
            reconcile_interval: DEFAULT_RECONCILE_INTERVAL,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: DEFAULT_RETRY_DELAY,
            run_once: false,
        }
    }
}

impl WorkerConfig {
    pub fn from_env_or_default() -> Self {
        let database_url = db_url();
        let max_connections = parse_env("MKT_DB_MAX_CONNECTIONS", DEFAULT_MAX_CONNECTIONS);
        let interval_secs = parse_env("MKT_RECONCILE_INTERVAL_SECS", DEFAULT_RECONCILE_INTERVAL.as_secs());
        let max_attempts = parse_env("MKT_SETTLEMENT_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS);
        let retry_delay_ms = parse_env("MKT_SETTLEMENT_RETRY_DELAY_MS", DEFAULT_RETRY_DELAY.as_millis() as u64);
        Self {
            database_url,
            max_connections: nonzero("MKT_DB_MAX_CONNECTIONS", max_connections, DEFAULT_MAX_CONNECTIONS),
            reconcile_interval: Duration::from_secs(nonzero(
                "MKT_RECONCILE_INTERVAL_SECS",
                interval_secs,
                DEFAULT_RECONCILE_INTERVAL.as_secs(),
            )),
            max_attempts: nonzero("MKT_SETTLEMENT_MAX_ATTEMPTS", max_attempts, DEFAULT_MAX_ATTEMPTS),
            retry_delay: Duration::from_millis(retry_delay_ms),
            run_once: parse_boolean_flag(env::var("MKT_RUN_ONCE").ok(), false),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay, MAX_RETRY_DELAY)
    }
}

fn parse_env<T>(name: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    match env::var(name) {
        Ok(s) => parse_value(name, &s, default),
        Err(_) => {
            debug!("🪛️ {name} is not set. Using the default value of {default}.");
            default
        },
    }
}

fn parse_value<T>(name: &str, value: &str, default: T) -> T
where
    T: FromStr + Display + Copy,
    T::Err: Display,
{
    value.trim().parse::<T>().unwrap_or_else(|e| {
        warn!("🪛️ {value} is not a valid value for {name}. {e} Using the default, {default}, instead.");
        default
    })
}

fn nonzero<T>(name: &str, value: T, default: T) -> T
where T: PartialEq + Default + Display + Copy {
    if value == T::default() {
        warn!("🪛️ {name} cannot be zero. Using the default, {default}, instead.");
        default
    } else {
        value
    }
}
