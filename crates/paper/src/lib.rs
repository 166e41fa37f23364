use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use common::{
    AlertRule, Candle, CandleQuery, Error, MarketDataProvider, PushDelivery, PushSubscription,
    Result, RulePatch, RuleStore, Session, Timeframe,
};

/// One quote in a market snapshot file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotQuote {
    pub exchange: String,
    pub ticker: String,
    pub price: f64,
    #[serde(default)]
    pub session: Session,
}

/// A candle series in a market snapshot file. Bars are oldest first.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotSeries {
    pub exchange: String,
    pub ticker: String,
    pub timeframe: Timeframe,
    pub bars: Vec<Candle>,
}

/// JSON file format for seeding `PaperMarketData`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MarketSnapshot {
    #[serde(default)]
    pub quotes: Vec<SnapshotQuote>,
    #[serde(default)]
    pub candles: Vec<SnapshotSeries>,
}

type QuoteKey = (String, String, Session);
type SeriesKey = (String, String, Timeframe);

/// In-memory market data for dry runs.
///
/// Prices and candles are whatever was last written. Nothing is fetched.
#[derive(Default)]
pub struct PaperMarketData {
    prices: RwLock<HashMap<QuoteKey, f64>>,
    candles: RwLock<HashMap<SeriesKey, Vec<Candle>>>,
}

impl PaperMarketData {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: MarketSnapshot) -> Self {
        let prices = snapshot
            .quotes
            .into_iter()
            .map(|q| ((q.exchange, q.ticker, q.session), q.price))
            .collect();
        let candles = snapshot
            .candles
            .into_iter()
            .map(|s| ((s.exchange, s.ticker, s.timeframe), s.bars))
            .collect();
        Self {
            prices: RwLock::new(prices),
            candles: RwLock::new(candles),
        }
    }

    /// Load a JSON `MarketSnapshot` from disk.
    pub fn load_snapshot(path: &str) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let snapshot: MarketSnapshot = serde_json::from_str(&content)?;
        info!(
            path,
            quotes = snapshot.quotes.len(),
            series = snapshot.candles.len(),
            "Loaded market snapshot"
        );
        Ok(Self::from_snapshot(snapshot))
    }

    /// Set the regular-session price.
    pub async fn set_price(&self, exchange: &str, ticker: &str, price: f64) {
        self.set_session_price(exchange, ticker, Session::Regular, price).await;
    }

    pub async fn set_session_price(&self, exchange: &str, ticker: &str, session: Session, price: f64) {
        self.prices
            .write()
            .await
            .insert((exchange.to_string(), ticker.to_string(), session), price);
    }

    /// Replace the series for `timeframe`. `bars` must be oldest first.
    pub async fn set_candles(&self, exchange: &str, ticker: &str, timeframe: Timeframe, bars: Vec<Candle>) {
        self.candles
            .write()
            .await
            .insert((exchange.to_string(), ticker.to_string(), timeframe), bars);
    }
}

#[async_trait]
impl MarketDataProvider for PaperMarketData {
    async fn current_price(
        &self,
        exchange_key: &str,
        ticker_key: &str,
        session: Option<Session>,
    ) -> Result<Option<f64>> {
        let key = (
            exchange_key.to_string(),
            ticker_key.to_string(),
            session.unwrap_or_default(),
        );
        Ok(self.prices.read().await.get(&key).copied())
    }

    async fn candles(
        &self,
        exchange_key: &str,
        ticker_key: &str,
        query: &CandleQuery,
    ) -> Result<Vec<Candle>> {
        let key = (
            exchange_key.to_string(),
            ticker_key.to_string(),
            query.timeframe.unwrap_or(Timeframe::Day),
        );
        let series = self.candles.read().await;
        let bars = series.get(&key).map(Vec::as_slice).unwrap_or_default();
        let start = bars.len().saturating_sub(query.count);
        Ok(bars[start..].to_vec())
    }
}

/// Rule store backed by a `Vec`.
#[derive(Default)]
pub struct MemoryRuleStore {
    rules: RwLock<Vec<AlertRule>>,
    list_calls: AtomicUsize,
}

impl MemoryRuleStore {
    pub fn new(rules: Vec<AlertRule>) -> Self {
        Self {
            rules: RwLock::new(rules),
            list_calls: AtomicUsize::new(0),
        }
    }

    pub async fn insert(&self, rule: AlertRule) {
        let mut rules = self.rules.write().await;
        rules.retain(|r| r.id != rule.id);
        rules.push(rule);
    }

    /// How many times `list` has been called.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RuleStore for MemoryRuleStore {
    async fn list(&self) -> Result<Vec<AlertRule>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        Ok(self.rules.read().await.clone())
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AlertRule>> {
        Ok(self.rules.read().await.iter().find(|r| r.id == id).cloned())
    }

    async fn update(&self, id: &str, patch: &RulePatch) -> Result<()> {
        let mut rules = self.rules.write().await;
        let rule = rules
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or_else(|| Error::RuleNotFound(id.to_string()))?;
        patch.apply(rule);
        debug!(rule_id = id, ?patch, "Rule updated");
        Ok(())
    }
}

/// A notification recorded by `PaperPush`.
#[derive(Debug, Clone, PartialEq)]
pub struct SentNotification {
    pub endpoint: String,
    pub message: String,
    pub sent_at: DateTime<Utc>,
}

/// Push delivery that logs and records notifications instead of sending them.
#[derive(Default)]
pub struct PaperPush {
    sent: RwLock<Vec<SentNotification>>,
}

impl PaperPush {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn sent(&self) -> Vec<SentNotification> {
        self.sent.read().await.clone()
    }
}

#[async_trait]
impl PushDelivery for PaperPush {
    async fn send(&self, subscription: &PushSubscription, message: &str) -> Result<()> {
        info!(endpoint = %subscription.endpoint, text = message, "Paper push notification");
        self.sent.write().await.push(SentNotification {
            endpoint: subscription.endpoint.clone(),
            message: message.to_string(),
            sent_at: Utc::now(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::Frequency;

    fn bar(day: u32, close: f64) -> Candle {
        let ts = Utc.with_ymd_and_hms(2024, 1, day, 0, 0, 0).unwrap();
        Candle::from_row(ts, [close - 1.0, close, close - 2.0, close + 1.0])
    }

    fn rule(id: &str) -> AlertRule {
        AlertRule {
            id: id.into(),
            owner_id: "u".into(),
            active: true,
            conditions: Vec::new(),
            condition: None,
            condition_value: None,
            exchange_key: Some("TSE".into()),
            ticker_key: Some("7203".into()),
            target: None,
            session: None,
            frequency: Frequency::MinuteLevel,
            first_notification_sent: false,
            last_notified_at: None,
            subscription: PushSubscription {
                endpoint: format!("https://push.example/{id}"),
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }
    }

    #[tokio::test]
    async fn price_lookup_is_session_aware() {
        let market = PaperMarketData::new();
        market.set_price("NYSE", "IBM", 100.0).await;
        market.set_session_price("NYSE", "IBM", Session::Extended, 101.5).await;

        assert_eq!(market.current_price("NYSE", "IBM", None).await.unwrap(), Some(100.0));
        assert_eq!(
            market.current_price("NYSE", "IBM", Some(Session::Extended)).await.unwrap(),
            Some(101.5)
        );
        assert_eq!(market.current_price("NYSE", "MSFT", None).await.unwrap(), None);
    }

    #[tokio::test]
    async fn candles_returns_most_recent_window_oldest_first() {
        let market = PaperMarketData::new();
        let bars: Vec<Candle> = (1..=6).map(|d| bar(d, 100.0 + d as f64)).collect();
        market.set_candles("TSE", "7203", Timeframe::Day, bars.clone()).await;

        let query = CandleQuery { count: 3, session: None, timeframe: Some(Timeframe::Day) };
        let got = market.candles("TSE", "7203", &query).await.unwrap();
        assert_eq!(got, bars[3..].to_vec());

        let query = CandleQuery { count: 10, session: None, timeframe: Some(Timeframe::Day) };
        assert_eq!(market.candles("TSE", "7203", &query).await.unwrap().len(), 6);

        let query = CandleQuery { count: 2, session: None, timeframe: Some(Timeframe::Hour) };
        assert!(market.candles("TSE", "7203", &query).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn snapshot_json_round_trips_into_provider() {
        let json = r#"{
            "quotes": [{"exchange": "TSE", "ticker": "7203", "price": 2500.0}],
            "candles": [{
                "exchange": "TSE", "ticker": "7203", "timeframe": "day",
                "bars": [{"timestamp": "2024-01-02T00:00:00Z", "open": 1, "close": 2, "low": 0.5, "high": 2.5}]
            }]
        }"#;
        let snapshot: MarketSnapshot = serde_json::from_str(json).unwrap();
        let market = PaperMarketData::from_snapshot(snapshot);
        assert_eq!(market.current_price("TSE", "7203", None).await.unwrap(), Some(2500.0));
        let query = CandleQuery { count: 1, session: None, timeframe: None };
        assert_eq!(market.candles("TSE", "7203", &query).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn memory_store_applies_patches() {
        let store = MemoryRuleStore::new(vec![rule("a"), rule("b")]);
        store.update("b", &RulePatch::first_notification_sent(true)).await.unwrap();

        let b = store.get_by_id("b").await.unwrap().unwrap();
        assert!(b.first_notification_sent);
        assert!(!store.get_by_id("a").await.unwrap().unwrap().first_notification_sent);
        assert_eq!(store.list().await.unwrap().len(), 2);
        assert_eq!(store.list_calls(), 1);
    }

    #[tokio::test]
    async fn memory_store_rejects_unknown_id() {
        let store = MemoryRuleStore::new(Vec::new());
        let err = store.update("nope", &RulePatch::default()).await.unwrap_err();
        assert!(matches!(err, Error::RuleNotFound(id) if id == "nope"));
    }

    #[tokio::test]
    async fn paper_push_records_notifications() {
        let push = PaperPush::new();
        let sub = rule("x").subscription;
        push.send(&sub, "hello").await.unwrap();

        let sent = push.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].endpoint, "https://push.example/x");
        assert_eq!(sent[0].message, "hello");
    }
}
