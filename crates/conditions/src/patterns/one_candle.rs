use common::{Candle, ConditionType};

use super::geometry::{CandleGeometry, SHORT_BODY_RANGE_RATIO};
use super::CandlePattern;

/// Fireworks lower shadow must stay under this share of the body.
const TINY_SHADOW_RATIO: f64 = 0.1;

/// Long upper shadow and short body shared by both single-candle top signals.
fn long_upper_shadow_short_body(c: &Candle) -> bool {
    c.upper_shadow() > 2.0 * c.body_size() && c.body_below_range_share(SHORT_BODY_RANGE_RATIO)
}

/// Long upper shadow, short body and almost no lower shadow.
#[derive(Debug, Clone, Copy, Default)]
pub struct Fireworks;

impl CandlePattern for Fireworks {
    fn condition_type(&self) -> ConditionType {
        ConditionType::Fireworks
    }

    fn name(&self) -> &'static str {
        "Fireworks"
    }

    fn signal(&self) -> &'static str {
        "bearish reversal signal"
    }

    fn window(&self) -> usize {
        1
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let c = &window[0];
        long_upper_shadow_short_body(c) && c.lower_shadow() < TINY_SHADOW_RATIO * c.body_size()
    }
}

/// Bearish candle with a long upper shadow and a lower shadow shorter than its body.
#[derive(Debug, Clone, Copy, Default)]
pub struct ShootingStar;

impl CandlePattern for ShootingStar {
    fn condition_type(&self) -> ConditionType {
        ConditionType::ShootingStar
    }

    fn name(&self) -> &'static str {
        "Shooting Star"
    }

    fn signal(&self) -> &'static str {
        "bearish reversal signal"
    }

    fn window(&self) -> usize {
        1
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let c = &window[0];
        c.is_bearish() && long_upper_shadow_short_body(c) && c.lower_shadow() < c.body_size()
    }
}
