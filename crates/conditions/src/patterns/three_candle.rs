use common::{Candle, ConditionType};

use super::geometry::{
    approx_price_eq, has_gap, is_small_relative_to, opens_within_range, CandleGeometry, GapRule,
    SHORT_BODY_RANGE_RATIO,
};
use super::CandlePattern;

/// Three bullish candles, each opening inside the previous candle's range.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeRedSoldiers;

impl CandlePattern for ThreeRedSoldiers {
    fn condition_type(&self) -> ConditionType {
        ConditionType::ThreeRedSoldiers
    }

    fn name(&self) -> &'static str {
        "Three Red Soldiers"
    }

    fn signal(&self) -> &'static str {
        "bullish continuation signal"
    }

    fn window(&self) -> usize {
        3
    }

    fn matches(&self, window: &[Candle]) -> bool {
        window.iter().all(CandleGeometry::is_bullish)
            && opens_within_range(&window[0], &window[1])
            && opens_within_range(&window[1], &window[2])
    }
}

/// Long bearish candle, a small bullish candle that gaps away from it, then
/// a bullish candle.
#[derive(Debug, Clone, Copy, Default)]
pub struct SansenAkenomyojo {
    pub gap: GapRule,
}

impl SansenAkenomyojo {
    pub fn with_gap(gap: GapRule) -> Self {
        Self { gap }
    }
}

impl CandlePattern for SansenAkenomyojo {
    fn condition_type(&self) -> ConditionType {
        ConditionType::SansenAkenomyojo
    }

    fn name(&self) -> &'static str {
        "Sansen Akenomyojo (Three River Evening Star)"
    }

    fn signal(&self) -> &'static str {
        "bullish reversal signal"
    }

    fn window(&self) -> usize {
        3
    }

    fn matches(&self, window: &[Candle]) -> bool {
        let (first, second, third) = (&window[0], &window[1], &window[2]);
        first.is_bearish()
            && first.has_long_body()
            && second.is_bullish()
            && is_small_relative_to(second, first)
            && has_gap(first, second, self.gap)
            && third.is_bullish()
    }
}

/// Three bearish candles, each opening at the previous close.
#[derive(Debug, Clone, Copy, Default)]
pub struct OkajiThreeCrows;

impl CandlePattern for OkajiThreeCrows {
    fn condition_type(&self) -> ConditionType {
        ConditionType::OkajiThreeCrows
    }

    fn name(&self) -> &'static str {
        "Okaji Three Crows"
    }

    fn signal(&self) -> &'static str {
        "bearish continuation signal"
    }

    fn window(&self) -> usize {
        3
    }

    fn matches(&self, window: &[Candle]) -> bool {
        window.iter().all(CandleGeometry::is_bearish)
            && window
                .windows(2)
                .all(|pair| approx_price_eq(pair[1].open, pair[0].close))
    }
}

/// Three small bearish candles.
#[derive(Debug, Clone, Copy, Default)]
pub struct ThreeDarkStars;

impl CandlePattern for ThreeDarkStars {
    fn condition_type(&self) -> ConditionType {
        ConditionType::ThreeDarkStars
    }

    fn name(&self) -> &'static str {
        "Three Dark Stars"
    }

    fn signal(&self) -> &'static str {
        "bottoming signal"
    }

    fn window(&self) -> usize {
        3
    }

    fn matches(&self, window: &[Candle]) -> bool {
        window
            .iter()
            .all(|c| c.is_bearish() && c.body_below_range_share(SHORT_BODY_RANGE_RATIO))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::test_support::candle;

    #[test]
    fn three_red_soldiers() {
        let first = candle(10.0, 12.0, 9.5, 12.5);
        let second = candle(11.5, 13.5, 11.0, 14.0);
        assert!(ThreeRedSoldiers.matches(&[first, second, candle(13.0, 15.0, 12.5, 15.5)]));
        // Third opens above the second candle's high.
        assert!(!ThreeRedSoldiers.matches(&[first, second, candle(14.5, 16.0, 14.2, 16.5)]));
        // Bearish middle candle.
        assert!(!ThreeRedSoldiers.matches(&[first, candle(13.5, 11.5, 11.0, 14.0), candle(13.0, 15.0, 12.5, 15.5)]));
    }

    #[test]
    fn sansen_akenomyojo_with_open_below_prior_low() {
        let window = [
            candle(1000.0, 960.0, 950.0, 1010.0),
            candle(940.0, 950.0, 930.0, 960.0),
            candle(970.0, 1010.0, 970.0, 1020.0),
        ];
        assert!(SansenAkenomyojo::default().matches(&window));
        assert!(!SansenAkenomyojo::with_gap(GapRule::NonOverlapping).matches(&window));
    }

    #[test]
    fn sansen_akenomyojo_with_non_overlapping_gap() {
        let window = [
            candle(1000.0, 960.0, 950.0, 1010.0),
            candle(1015.0, 1025.0, 1012.0, 1030.0),
            candle(1020.0, 1040.0, 1015.0, 1045.0),
        ];
        assert!(SansenAkenomyojo::with_gap(GapRule::NonOverlapping).matches(&window));
        assert!(!SansenAkenomyojo::default().matches(&window));
    }

    #[test]
    fn sansen_akenomyojo_rejects_large_middle_body() {
        let window = [
            candle(1000.0, 960.0, 950.0, 1010.0),
            candle(900.0, 940.0, 895.0, 945.0),
            candle(970.0, 1010.0, 970.0, 1020.0),
        ];
        assert!(!SansenAkenomyojo::default().matches(&window));
    }

    #[test]
    fn okaji_three_crows() {
        let first = candle(100.0, 95.0, 94.0, 101.0);
        let third = candle(90.0, 85.0, 84.0, 91.0);
        assert!(OkajiThreeCrows.matches(&[first, candle(95.05, 90.0, 89.0, 96.0), third]));
        assert!(!OkajiThreeCrows.matches(&[first, candle(96.0, 90.0, 89.0, 96.5), third]));
    }

    #[test]
    fn three_dark_stars() {
        let star = candle(10.0, 9.8, 9.0, 11.0);
        assert!(ThreeDarkStars.matches(&[star, star, star]));
        assert!(!ThreeDarkStars.matches(&[star, candle(10.0, 9.0, 8.9, 10.1), star]));
    }
}
