use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tokio::time::Instant;
use tracing::debug;

use common::{AlertRule, Result, RulePatch, RuleStore};

struct Snapshot {
    fetched_at: Instant,
    rules: Vec<AlertRule>,
}

/// TTL cache in front of a `RuleStore`.
///
/// Only `list` is cached. Every `update` goes to the inner store and drops
/// the cached list.
pub struct CachedRuleStore<S> {
    inner: S,
    ttl: Duration,
    snapshot: RwLock<Option<Snapshot>>,
}

impl<S: RuleStore> CachedRuleStore<S> {
    pub fn new(inner: S, ttl: Duration) -> Self {
        Self {
            inner,
            ttl,
            snapshot: RwLock::new(None),
        }
    }

    pub async fn invalidate(&self) {
        *self.snapshot.write().await = None;
    }

    pub fn inner(&self) -> &S {
        &self.inner
    }
}

#[async_trait]
impl<S: RuleStore> RuleStore for CachedRuleStore<S> {
    async fn list(&self) -> Result<Vec<AlertRule>> {
        if let Some(snapshot) = self.snapshot.read().await.as_ref() {
            if snapshot.fetched_at.elapsed() < self.ttl {
                return Ok(snapshot.rules.clone());
            }
        }

        let rules = self.inner.list().await?;
        debug!(count = rules.len(), "Rule cache refreshed");
        *self.snapshot.write().await = Some(Snapshot {
            fetched_at: Instant::now(),
            rules: rules.clone(),
        });
        Ok(rules)
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AlertRule>> {
        self.inner.get_by_id(id).await
    }

    async fn update(&self, id: &str, patch: &RulePatch) -> Result<()> {
        let result = self.inner.update(id, patch).await;
        self.invalidate().await;
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::{Frequency, PushSubscription};
    use paper::MemoryRuleStore;

    fn rule(id: &str) -> AlertRule {
        AlertRule {
            id: id.into(),
            owner_id: String::new(),
            active: true,
            conditions: Vec::new(),
            condition: None,
            condition_value: None,
            exchange_key: Some("X".into()),
            ticker_key: Some("Y".into()),
            target: None,
            session: None,
            frequency: Frequency::MinuteLevel,
            first_notification_sent: false,
            last_notified_at: None,
            subscription: PushSubscription {
                endpoint: "e".into(),
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }
    }

    #[tokio::test(start_paused = true)]
    async fn list_is_served_from_cache_until_ttl() {
        let cache = CachedRuleStore::new(MemoryRuleStore::new(vec![rule("a")]), Duration::from_secs(60));

        cache.list().await.unwrap();
        cache.list().await.unwrap();
        assert_eq!(cache.inner().list_calls(), 1);

        tokio::time::advance(Duration::from_secs(61)).await;
        cache.list().await.unwrap();
        assert_eq!(cache.inner().list_calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn update_invalidates_cached_list() {
        let cache = CachedRuleStore::new(MemoryRuleStore::new(vec![rule("a")]), Duration::from_secs(60));
        assert!(!cache.list().await.unwrap()[0].first_notification_sent);

        cache.update("a", &RulePatch::first_notification_sent(true)).await.unwrap();
        let rules = cache.list().await.unwrap();
        assert!(rules[0].first_notification_sent);
        assert_eq!(cache.inner().list_calls(), 2);
    }

    #[tokio::test]
    async fn failed_update_still_invalidates() {
        let cache = CachedRuleStore::new(MemoryRuleStore::new(vec![rule("a")]), Duration::from_secs(60));
        cache.list().await.unwrap();
        assert!(cache.update("missing", &RulePatch::default()).await.is_err());
        cache.list().await.unwrap();
        assert_eq!(cache.inner().list_calls(), 2);
    }
}
