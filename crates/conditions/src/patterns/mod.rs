pub mod geometry;
pub mod long_window;
pub mod one_candle;
pub mod three_candle;
pub mod two_candle;

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, warn};

use common::{
    Candle, CandleQuery, CheckParams, ConditionResult, ConditionType, MarketDataProvider, Result,
    Timeframe,
};

use crate::ConditionChecker;

pub use geometry::GapRule;
pub use long_window::{FallingStones, SwallowReturn};
pub use one_candle::{Fireworks, ShootingStar};
pub use three_candle::{OkajiThreeCrows, SansenAkenomyojo, ThreeDarkStars, ThreeRedSoldiers};
pub use two_candle::{BearishHaramiCross, BullishHaramiCross, HawkReversal, TwoTakuriLines};

/// A fixed-window candlestick pattern.
///
/// `matches` receives exactly `window()` candles, oldest first.
pub trait CandlePattern: Send + Sync {
    fn condition_type(&self) -> ConditionType;

    /// Human-readable pattern name used in notification text.
    fn name(&self) -> &'static str;

    /// What the pattern signals, e.g. "bullish reversal signal".
    fn signal(&self) -> &'static str;

    /// Number of candles the pattern spans.
    fn window(&self) -> usize;

    fn matches(&self, window: &[Candle]) -> bool;
}

/// Evaluate `pattern` against the most recent candles of `candles`.
///
/// Pure: the result depends only on the arguments.
pub fn evaluate_pattern(pattern: &dyn CandlePattern, target: &str, candles: &[Candle]) -> ConditionResult {
    let needed = pattern.window();
    if candles.len() < needed {
        return ConditionResult::not_met(format!(
            "insufficient data for {}: need {needed} candles, got {}",
            pattern.name(),
            candles.len()
        ));
    }

    let window = &candles[candles.len() - needed..];
    if let Some(bad) = window
        .iter()
        .find(|c| ![c.open, c.close, c.low, c.high].iter().all(|v| v.is_finite()))
    {
        return ConditionResult::not_met(format!(
            "error checking pattern {} for {target}: non-finite price in candle at {}",
            pattern.name(),
            bad.timestamp
        ));
    }

    if pattern.matches(window) {
        ConditionResult::met(format!("{target} shows {} - {}", pattern.name(), pattern.signal()))
    } else {
        ConditionResult::not_met(format!("{target} does not show {}", pattern.name()))
    }
}

/// Adapts a `CandlePattern` to the `ConditionChecker` interface by fetching
/// the pattern's window of candles from the market data provider.
pub struct PatternChecker<P> {
    pattern: P,
    market: Arc<dyn MarketDataProvider>,
    timeframe: Timeframe,
}

impl<P: CandlePattern> PatternChecker<P> {
    /// Pattern over daily candles.
    pub fn new(pattern: P, market: Arc<dyn MarketDataProvider>) -> Self {
        Self {
            pattern,
            market,
            timeframe: Timeframe::Day,
        }
    }

    pub fn with_timeframe(mut self, timeframe: Timeframe) -> Self {
        self.timeframe = timeframe;
        self
    }

    pub fn pattern(&self) -> &P {
        &self.pattern
    }
}

#[async_trait]
impl<P: CandlePattern + 'static> ConditionChecker for PatternChecker<P> {
    fn condition_type(&self) -> ConditionType {
        self.pattern.condition_type()
    }

    /// Never fails: provider errors become an unmet result.
    async fn check(&self, params: &CheckParams) -> Result<ConditionResult> {
        let query = CandleQuery {
            count: self.pattern.window(),
            session: params.session,
            timeframe: Some(self.timeframe),
        };

        let candles = match self
            .market
            .candles(&params.exchange_key, &params.ticker_key, &query)
            .await
        {
            Ok(candles) => candles,
            Err(e) => {
                warn!(
                    pattern = self.pattern.name(),
                    ticker = %params.ticker_key,
                    error = %e,
                    "Candle fetch failed"
                );
                return Ok(ConditionResult::not_met(format!(
                    "error checking pattern {} for {}: {e}",
                    self.pattern.name(),
                    params.target
                )));
            }
        };

        let result = evaluate_pattern(&self.pattern, &params.target, &candles);
        debug!(
            pattern = self.pattern.name(),
            ticker = %params.ticker_key,
            candles = candles.len(),
            met = result.met,
            "Pattern evaluated"
        );
        Ok(result)
    }
}

/// Checkers for every built-in pattern, with the canonical gap rule.
pub fn default_pattern_checkers(market: Arc<dyn MarketDataProvider>) -> Vec<Arc<dyn ConditionChecker>> {
    vec![
        Arc::new(PatternChecker::new(ThreeRedSoldiers, market.clone())),
        Arc::new(PatternChecker::new(SansenAkenomyojo::default(), market.clone())),
        Arc::new(PatternChecker::new(Fireworks, market.clone())),
        Arc::new(PatternChecker::new(ShootingStar, market.clone())),
        Arc::new(PatternChecker::new(BearishHaramiCross, market.clone())),
        Arc::new(PatternChecker::new(BullishHaramiCross, market.clone())),
        Arc::new(PatternChecker::new(HawkReversal, market.clone())),
        Arc::new(PatternChecker::new(OkajiThreeCrows, market.clone())),
        Arc::new(PatternChecker::new(FallingStones, market.clone())),
        Arc::new(PatternChecker::new(TwoTakuriLines, market.clone())),
        Arc::new(PatternChecker::new(SwallowReturn, market.clone())),
        Arc::new(PatternChecker::new(ThreeDarkStars, market)),
    ]
}
