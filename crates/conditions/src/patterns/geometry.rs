//! Shared candlestick vocabulary.
//!
//! Every pattern predicate is written in terms of these measurements so the
//! thresholds below are the only tuning knobs.

use common::Candle;

/// A body longer than this share of the candle's own range is "long".
pub const LONG_BODY_RATIO: f64 = 0.6;

/// A body longer than this share of its range dominates the candle.
pub const VERY_LONG_BODY_RATIO: f64 = 0.7;

/// A body shorter than this share of a reference body is "small".
pub const SMALL_BODY_RATIO: f64 = 0.5;

/// A body under this share of its own range is "short".
pub const SHORT_BODY_RANGE_RATIO: f64 = 0.3;

/// Relative tolerance for "opens at the previous close".
pub const PRICE_MATCH_TOLERANCE: f64 = 0.001;

pub trait CandleGeometry {
    fn body_top(&self) -> f64;
    fn body_bottom(&self) -> f64;
    fn body_size(&self) -> f64;
    fn range(&self) -> f64;
    fn upper_shadow(&self) -> f64;
    fn lower_shadow(&self) -> f64;
    fn is_bullish(&self) -> bool;
    fn is_bearish(&self) -> bool;

    /// `body_size > LONG_BODY_RATIO * range`.
    fn has_long_body(&self) -> bool {
        self.body_size() > LONG_BODY_RATIO * self.range()
    }

    /// Body is under `ratio` of this candle's range.
    fn body_below_range_share(&self, ratio: f64) -> bool {
        self.body_size() < ratio * self.range()
    }
}

impl CandleGeometry for Candle {
    fn body_top(&self) -> f64 {
        self.open.max(self.close)
    }

    fn body_bottom(&self) -> f64 {
        self.open.min(self.close)
    }

    fn body_size(&self) -> f64 {
        (self.close - self.open).abs()
    }

    fn range(&self) -> f64 {
        self.high - self.low
    }

    fn upper_shadow(&self) -> f64 {
        self.high - self.body_top()
    }

    fn lower_shadow(&self) -> f64 {
        self.body_bottom() - self.low
    }

    fn is_bullish(&self) -> bool {
        self.close > self.open
    }

    fn is_bearish(&self) -> bool {
        self.close < self.open
    }
}

/// `candle` body is under `SMALL_BODY_RATIO` of `reference`'s body.
pub fn is_small_relative_to(candle: &Candle, reference: &Candle) -> bool {
    candle.body_size() < SMALL_BODY_RATIO * reference.body_size()
}

/// Which discontinuity between two consecutive candles counts as a gap.
///
/// The two rules are not equivalent: `NonOverlapping` only accepts gaps where
/// the ranges do not touch at all.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum GapRule {
    /// `earlier.low > later.open`.
    #[default]
    OpenBelowPriorLow,
    /// `later.low > earlier.high`.
    NonOverlapping,
}

pub fn has_gap(earlier: &Candle, later: &Candle, rule: GapRule) -> bool {
    match rule {
        GapRule::OpenBelowPriorLow => earlier.low > later.open,
        GapRule::NonOverlapping => later.low > earlier.high,
    }
}

/// `later` body strictly contains `earlier` body.
pub fn engulfs(earlier: &Candle, later: &Candle) -> bool {
    later.body_top() > earlier.body_top() && later.body_bottom() < earlier.body_bottom()
}

/// `later` body lies inside `earlier` body and is strictly smaller.
pub fn is_contained_within(earlier: &Candle, later: &Candle) -> bool {
    later.body_top() <= earlier.body_top()
        && later.body_bottom() >= earlier.body_bottom()
        && later.body_size() < earlier.body_size()
}

/// `later.open` lies within `earlier`'s full range.
pub fn opens_within_range(earlier: &Candle, later: &Candle) -> bool {
    later.open >= earlier.low && later.open <= earlier.high
}

/// `value` is within `PRICE_MATCH_TOLERANCE` of `reference`.
pub fn approx_price_eq(value: f64, reference: f64) -> bool {
    (value - reference).abs() <= PRICE_MATCH_TOLERANCE * reference.abs()
}
