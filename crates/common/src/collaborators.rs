use async_trait::async_trait;

use crate::{AlertRule, Candle, CandleQuery, Exchange, PushSubscription, Result, RulePatch, Session};

/// Source of prices and candles.
///
/// `None` / short candle lists mean "no data yet" and are not errors. An
/// `Err` is reserved for transport or upstream failures.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Latest traded price. `session = None` means the regular session.
    async fn current_price(
        &self,
        exchange_key: &str,
        ticker_key: &str,
        session: Option<Session>,
    ) -> Result<Option<f64>>;

    /// Up to `query.count` most recent candles, oldest first.
    async fn candles(
        &self,
        exchange_key: &str,
        ticker_key: &str,
        query: &CandleQuery,
    ) -> Result<Vec<Candle>>;
}

/// Keyed access to stored alert rules.
#[async_trait]
pub trait RuleStore: Send + Sync {
    async fn list(&self) -> Result<Vec<AlertRule>>;

    async fn get_by_id(&self, id: &str) -> Result<Option<AlertRule>>;

    /// Apply a partial update. Fails with `Error::RuleNotFound` for unknown ids.
    async fn update(&self, id: &str, patch: &RulePatch) -> Result<()>;
}

/// Delivers a notification to one push subscription. Retries, if any, are
/// the implementation's business.
#[async_trait]
pub trait PushDelivery: Send + Sync {
    async fn send(&self, subscription: &PushSubscription, message: &str) -> Result<()>;
}

/// Exchange metadata lookup.
#[async_trait]
pub trait ExchangeDirectory: Send + Sync {
    async fn get_exchange(&self, key: &str) -> Result<Option<Exchange>>;
}
