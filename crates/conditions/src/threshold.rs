use std::sync::Arc;

use async_trait::async_trait;
use tracing::debug;

use common::{CheckParams, ConditionResult, ConditionType, MarketDataProvider, Result};

use crate::ConditionChecker;

/// Which side of the target price triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Direction {
    Above,
    Below,
}

impl Direction {
    fn word(&self) -> &'static str {
        match self {
            Direction::Above => "above",
            Direction::Below => "below",
        }
    }

    fn crosses(&self, price: f64, target: f64) -> bool {
        match self {
            Direction::Above => price > target,
            Direction::Below => price < target,
        }
    }
}

/// Compare a current price against a rule's target.
///
/// Missing inputs are "no data yet" states and produce an unmet result.
pub fn evaluate_threshold(
    direction: Direction,
    target: &str,
    current_price: Option<f64>,
    condition_value: Option<f64>,
) -> ConditionResult {
    let Some(value) = condition_value else {
        return ConditionResult::not_met(format!("{target}: no target price configured"));
    };
    let Some(price) = current_price else {
        return ConditionResult::not_met(format!("{target}: no current price available"));
    };

    if direction.crosses(price, value) {
        ConditionResult::met(format!(
            "{target} price {price} is {} your target of {value}",
            direction.word()
        ))
    } else {
        ConditionResult::not_met(format!(
            "{target} price {price} is not {} your target of {value}",
            direction.word()
        ))
    }
}

/// `GreaterThan` / `LessThan` checker backed by the current price.
pub struct PriceThresholdChecker {
    direction: Direction,
    market: Arc<dyn MarketDataProvider>,
}

impl PriceThresholdChecker {
    pub fn greater_than(market: Arc<dyn MarketDataProvider>) -> Self {
        Self { direction: Direction::Above, market }
    }

    pub fn less_than(market: Arc<dyn MarketDataProvider>) -> Self {
        Self { direction: Direction::Below, market }
    }
}

#[async_trait]
impl ConditionChecker for PriceThresholdChecker {
    fn condition_type(&self) -> ConditionType {
        match self.direction {
            Direction::Above => ConditionType::GreaterThan,
            Direction::Below => ConditionType::LessThan,
        }
    }

    async fn check(&self, params: &CheckParams) -> Result<ConditionResult> {
        // No target means nothing to compare; skip the price lookup.
        if params.condition_value.is_none() {
            return Ok(evaluate_threshold(self.direction, &params.target, None, None));
        }

        let price = self
            .market
            .current_price(&params.exchange_key, &params.ticker_key, params.session)
            .await?;
        debug!(ticker = %params.ticker_key, price = ?price, target = ?params.condition_value, "Price fetched");

        Ok(evaluate_threshold(
            self.direction,
            &params.target,
            price,
            params.condition_value,
        ))
    }
}
