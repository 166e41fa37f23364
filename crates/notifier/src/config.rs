use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use common::{Exchange, ExchangeDirectory, Result};

/// Exchange trading hours file (TOML).
///
/// Example `config/exchanges.toml`:
/// ```toml
/// [[exchange]]
/// key = "TSE"
/// trading_start = { hour = 9, minute = 0 }
/// trading_end = { hour = 15, minute = 30 }
/// utc_offset_minutes = 540
/// ```
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ExchangeFileConfig {
    #[serde(rename = "exchange", default)]
    pub exchanges: Vec<Exchange>,
}

impl ExchangeFileConfig {
    /// Load from a TOML file. Exits process on error.
    pub fn load(path: &str) -> Self {
        let content = std::fs::read_to_string(path).unwrap_or_else(|e| {
            panic!("Failed to read exchange config at '{path}': {e}")
        });
        Self::parse(&content).unwrap_or_else(|e| {
            panic!("Failed to parse exchange config at '{path}': {e}")
        })
    }

    pub fn parse(content: &str) -> std::result::Result<Self, toml::de::Error> {
        toml::from_str(content)
    }

    /// Index by exchange key for lookups.
    pub fn into_directory(self) -> StaticExchangeDirectory {
        StaticExchangeDirectory {
            exchanges: self
                .exchanges
                .into_iter()
                .map(|ex| (ex.key.clone(), ex))
                .collect(),
        }
    }
}

/// Exchange metadata known at startup.
#[derive(Debug, Clone, Default)]
pub struct StaticExchangeDirectory {
    exchanges: HashMap<String, Exchange>,
}

impl StaticExchangeDirectory {
    pub fn len(&self) -> usize {
        self.exchanges.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exchanges.is_empty()
    }
}

#[async_trait]
impl ExchangeDirectory for StaticExchangeDirectory {
    async fn get_exchange(&self, key: &str) -> Result<Option<Exchange>> {
        Ok(self.exchanges.get(key).cloned())
    }
}

/// Batch evaluation tuning.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Rules evaluated at the same time.
    pub max_concurrency: usize,
    /// Wall-clock bound on one batch. `None` waits for every rule.
    pub batch_deadline: Option<Duration>,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 8,
            batch_deadline: Some(Duration::from_secs(50)),
        }
    }
}

impl From<&common::Config> for OrchestratorConfig {
    fn from(cfg: &common::Config) -> Self {
        Self {
            max_concurrency: cfg.max_concurrency,
            batch_deadline: Some(cfg.batch_deadline),
        }
    }
}
