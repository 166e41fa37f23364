use common::{Candle, ConditionType};

use super::geometry::{engulfs, is_contained_within, CandleGeometry};
use super::CandlePattern;

/// Long bearish candle followed by a smaller bearish candle inside its body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BearishHaramiCross;

impl CandlePattern for BearishHaramiCross {
    fn condition_type(&self) -> ConditionType {
        ConditionType::BearishHaramiCross
    }

    fn name(&self) -> &'static str {
        "Bearish Harami Cross"
    }

    fn signal(&self) -> &'static str {
        "bearish reversal signal"
    }

    fn window(&self) -> usize {
        2
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let (first, second) = (&window[0], &window[1]);
        first.is_bearish()
            && first.has_long_body()
            && second.is_bearish()
            && is_contained_within(first, second)
    }
}

/// Long bullish candle followed by a smaller bullish candle inside its body.
#[derive(Debug, Clone, Copy, Default)]
pub struct BullishHaramiCross;

impl CandlePattern for BullishHaramiCross {
    fn condition_type(&self) -> ConditionType {
        ConditionType::BullishHaramiCross
    }

    fn name(&self) -> &'static str {
        "Bullish Harami Cross"
    }

    fn signal(&self) -> &'static str {
        "bullish reversal signal"
    }

    fn window(&self) -> usize {
        2
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let (first, second) = (&window[0], &window[1]);
        first.is_bullish()
            && first.has_long_body()
            && second.is_bullish()
            && is_contained_within(first, second)
    }
}

/// Bearish candle whose body engulfs the previous body.
#[derive(Debug, Clone, Copy, Default)]
pub struct HawkReversal;

impl CandlePattern for HawkReversal {
    fn condition_type(&self) -> ConditionType {
        ConditionType::HawkReversal
    }

    fn name(&self) -> &'static str {
        "Hawk Reversal"
    }

    fn signal(&self) -> &'static str {
        "bearish reversal signal"
    }

    fn window(&self) -> usize {
        2
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let (first, second) = (&window[0], &window[1]);
        second.is_bearish() && engulfs(first, second)
    }
}

/// Two consecutive hammers: long lower shadows, short upper shadows.
#[derive(Debug, Clone, Copy, Default)]
pub struct TwoTakuriLines;

impl TwoTakuriLines {
    fn is_takuri(c: &Candle) -> bool {
        c.lower_shadow() > 2.0 * c.body_size() && c.upper_shadow() < c.body_size()
    }
}

impl CandlePattern for TwoTakuriLines {
    fn condition_type(&self) -> ConditionType {
        ConditionType::TwoTakuriLines
    }

    fn name(&self) -> &'static str {
        "Two Takuri Lines"
    }

    fn signal(&self) -> &'static str {
        "bullish bottoming signal"
    }

    fn window(&self) -> usize {
        2
    }

    fn matches(&self, window: &[Candle]) -> bool {
        window.iter().all(Self::is_takuri)
    }
}
