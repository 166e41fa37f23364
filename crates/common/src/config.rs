use std::time::Duration;

/// All configuration loaded from environment variables at startup.
/// Missing required variables cause an immediate panic with a clear message.
#[derive(Debug, Clone)]
pub struct Config {
    // Database
    pub database_url: String,

    // Exchange hours file path
    pub exchange_config_path: String,

    /// JSON snapshot of prices and candles used by the paper market data
    /// provider. `None` starts with an empty market.
    pub market_snapshot_path: Option<String>,

    // Batch evaluation
    pub max_concurrency: usize,
    pub batch_deadline: Duration,
    pub rule_cache_ttl: Duration,
    pub tick_interval: Duration,
}

impl Config {
    /// Load all configuration from environment variables.
    /// Loads `.env` if present. Panics on any missing required variable.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv(); // ignore error if .env not present

        let max_concurrency = parsed_env("NOTIFIER_MAX_CONCURRENCY", 8usize);
        if max_concurrency == 0 {
            panic!("ERROR: NOTIFIER_MAX_CONCURRENCY must be at least 1");
        }

        let tick_interval = secs_env("NOTIFIER_TICK_SECS", 60);
        if tick_interval.is_zero() {
            panic!("ERROR: NOTIFIER_TICK_SECS must be at least 1");
        }

        Config {
            database_url: required_env("DATABASE_URL"),
            exchange_config_path: optional_env("EXCHANGE_CONFIG_PATH")
                .unwrap_or_else(|| "config/exchanges.toml".to_string()),
            market_snapshot_path: optional_env("MARKET_SNAPSHOT_PATH"),
            max_concurrency,
            batch_deadline: secs_env("NOTIFIER_BATCH_DEADLINE_SECS", 50),
            rule_cache_ttl: secs_env("RULE_CACHE_TTL_SECS", 60),
            tick_interval,
        }
    }
}

fn required_env(key: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| {
        panic!("Required environment variable '{key}' is not set. Check your .env file.")
    })
}

fn optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

fn parsed_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    optional_env(key)
        .map(|v| {
            v.trim()
                .parse::<T>()
                .unwrap_or_else(|_| panic!("{key} must be a whole number, got: '{v}'"))
        })
        .unwrap_or(default)
}

fn secs_env(key: &str, default: u64) -> Duration {
    Duration::from_secs(parsed_env(key, default))
}
