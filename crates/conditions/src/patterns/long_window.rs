use common::{Candle, ConditionType};

use super::geometry::{is_small_relative_to, CandleGeometry, VERY_LONG_BODY_RATIO};
use super::CandlePattern;

/// Large bullish candle followed by four small candles with falling lows.
#[derive(Debug, Clone, Copy, Default)]
pub struct FallingStones;

impl CandlePattern for FallingStones {
    fn condition_type(&self) -> ConditionType {
        ConditionType::FallingStones
    }

    fn name(&self) -> &'static str {
        "Falling Stones"
    }

    fn signal(&self) -> &'static str {
        "weakening uptrend signal"
    }

    fn window(&self) -> usize {
        5
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let (first, rest) = (&window[0], &window[1..]);
        if !(first.is_bullish() && first.body_size() > VERY_LONG_BODY_RATIO * first.range()) {
            return false;
        }
        let small_bodies = rest.iter().all(|c| is_small_relative_to(c, first));
        let falling_lows = rest.windows(2).all(|pair| pair[1].low < pair[0].low);
        small_bodies && falling_lows
    }
}

/// Two bearish candles that each open above the prior close, then a bullish candle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SwallowReturn;

impl CandlePattern for SwallowReturn {
    fn condition_type(&self) -> ConditionType {
        ConditionType::SwallowReturn
    }

    fn name(&self) -> &'static str {
        "Swallow Return"
    }

    fn signal(&self) -> &'static str {
        "bullish reversal signal"
    }

    fn window(&self) -> usize {
        4
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let gapped_bearish = |prior: &Candle, c: &Candle| c.open > prior.close && c.is_bearish();
        gapped_bearish(&window[0], &window[1])
            && gapped_bearish(&window[1], &window[2])
            && window[3].is_bullish()
    }
}
