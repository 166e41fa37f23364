use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};

use common::{CheckParams, ConditionResult, ConditionType, MarketDataProvider, Result};

use crate::patterns::default_pattern_checkers;
use crate::threshold::PriceThresholdChecker;
use crate::ConditionChecker;

/// Receives condition identifiers that have no registered checker, e.g. to
/// route retired condition types to a legacy evaluator during a migration.
#[async_trait]
pub trait FallbackChecker: Send + Sync {
    async fn check(&self, condition_type: &str, params: &CheckParams) -> Result<ConditionResult>;
}

/// Maps condition identifiers to their checkers.
pub struct ConditionCheckerRegistry {
    checkers: HashMap<ConditionType, Arc<dyn ConditionChecker>>,
    fallback: Option<Arc<dyn FallbackChecker>>,
}

impl ConditionCheckerRegistry {
    pub fn new() -> Self {
        Self {
            checkers: HashMap::new(),
            fallback: None,
        }
    }

    pub fn with_fallback(fallback: Arc<dyn FallbackChecker>) -> Self {
        Self {
            checkers: HashMap::new(),
            fallback: Some(fallback),
        }
    }

    /// Registry with the two threshold checkers and every built-in pattern.
    pub fn with_defaults(market: Arc<dyn MarketDataProvider>) -> Self {
        let mut registry = Self::new();
        registry.register_defaults(market);
        registry
    }

    pub fn register_defaults(&mut self, market: Arc<dyn MarketDataProvider>) {
        self.register(
            ConditionType::GreaterThan,
            Arc::new(PriceThresholdChecker::greater_than(market.clone())),
        );
        self.register(
            ConditionType::LessThan,
            Arc::new(PriceThresholdChecker::less_than(market.clone())),
        );
        for checker in default_pattern_checkers(market) {
            self.register(checker.condition_type(), checker);
        }
        info!(count = self.checkers.len(), "Registered condition checkers");
    }

    /// Register `checker` under `condition_type`, replacing any previous one.
    pub fn register(&mut self, condition_type: ConditionType, checker: Arc<dyn ConditionChecker>) {
        if self.checkers.insert(condition_type, checker).is_some() {
            debug!(condition = %condition_type, "Replaced condition checker");
        }
    }

    pub fn get(&self, condition_type: ConditionType) -> Option<Arc<dyn ConditionChecker>> {
        self.checkers.get(&condition_type).cloned()
    }

    /// Evaluate one condition by identifier.
    ///
    /// Unknown or unregistered identifiers go to the fallback; without one
    /// they produce an unmet result rather than an error.
    pub async fn check(&self, condition_type: &str, params: &CheckParams) -> Result<ConditionResult> {
        let checker = condition_type
            .parse::<ConditionType>()
            .ok()
            .and_then(|ty| self.checkers.get(&ty));

        match (checker, &self.fallback) {
            (Some(checker), _) => {
                debug!(condition = condition_type, ticker = %params.ticker_key, "Checking condition");
                checker.check(params).await
            }
            (None, Some(fallback)) => {
                debug!(condition = condition_type, "Routing condition to fallback checker");
                fallback.check(condition_type, params).await
            }
            (None, None) => {
                warn!(condition = condition_type, "No checker registered for condition type");
                Ok(ConditionResult::not_met(format!(
                    "checker not implemented for {condition_type}"
                )))
            }
        }
    }

    /// Registered condition types in declaration order.
    pub fn supported_types(&self) -> Vec<ConditionType> {
        let mut types: Vec<ConditionType> = self.checkers.keys().copied().collect();
        types.sort();
        types
    }
}

impl Default for ConditionCheckerRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
