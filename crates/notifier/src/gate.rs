//! Timing rules deciding whether a rule may be evaluated right now.
//!
//! Exchange hours always apply. Rules that may only run at the session open
//! (an `ExchangeStartOnly` frequency or any daily condition) also notify at
//! most once per session.

use std::fmt;

use chrono::{DateTime, Utc};

use common::{AlertRule, ConditionSpec, Exchange, Frequency, TimeOfDay};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    OutsideTradingHours,
    /// The rule may only run at the session open minute.
    NotSessionStart,
    /// Already notified during the current session.
    AlreadyNotified,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::OutsideTradingHours => write!(f, "outside trading hours"),
            SkipReason::NotSessionStart => write!(f, "not session start"),
            SkipReason::AlreadyNotified => write!(f, "already notified this session"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateDecision {
    Allow,
    Skip(SkipReason),
}

impl GateDecision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, GateDecision::Allow)
    }
}

/// `now` inside `[start, end]`. A window with `start > end` wraps past midnight.
pub fn within_trading_hours(start: TimeOfDay, end: TimeOfDay, now: TimeOfDay) -> bool {
    if start > end {
        now >= start || now <= end
    } else {
        start <= now && now <= end
    }
}

/// The exchange's local clock reads exactly its trading start minute.
pub fn is_session_start(exchange: &Exchange, now: DateTime<Utc>) -> bool {
    exchange.local_time_of_day(now) == exchange.trading_start
}

/// A set notification flag that dates from before the current session.
/// A flag without a timestamp counts as stale.
pub fn notified_in_earlier_session(rule: &AlertRule, exchange: &Exchange, now: DateTime<Utc>) -> bool {
    rule.first_notification_sent
        && rule
            .last_notified_at
            .map_or(true, |at| at < exchange.current_session_start(now))
}

/// Whether any condition only makes sense once per session.
pub fn has_daily_condition(conditions: &[ConditionSpec]) -> bool {
    conditions
        .iter()
        .filter_map(ConditionSpec::kind)
        .any(|ty| ty.is_daily())
}

/// Decide whether `rule` may be evaluated at `now`.
pub fn decide(
    rule: &AlertRule,
    conditions: &[ConditionSpec],
    exchange: &Exchange,
    now: DateTime<Utc>,
) -> GateDecision {
    let local = exchange.local_time_of_day(now);
    if !within_trading_hours(exchange.trading_start, exchange.trading_end, local) {
        return GateDecision::Skip(SkipReason::OutsideTradingHours);
    }

    let start_only = match rule.frequency {
        Frequency::ExchangeStartOnly => true,
        Frequency::MinuteLevel | Frequency::TenMinuteLevel | Frequency::HourlyLevel => {
            has_daily_condition(conditions)
        }
    };
    if !start_only {
        return GateDecision::Allow;
    }

    if rule.first_notification_sent {
        return GateDecision::Skip(SkipReason::AlreadyNotified);
    }
    if !is_session_start(exchange, now) {
        return GateDecision::Skip(SkipReason::NotSessionStart);
    }
    GateDecision::Allow
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use common::{ConditionType, PushSubscription};

    fn t(hour: u8, minute: u8) -> TimeOfDay {
        TimeOfDay::new(hour, minute)
    }

    fn at(hour: u32, minute: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 3, hour, minute, 0).unwrap()
    }

    fn exchange(start: TimeOfDay, end: TimeOfDay) -> Exchange {
        Exchange {
            key: "X".into(),
            trading_start: start,
            trading_end: end,
            utc_offset_minutes: 0,
        }
    }

    fn rule(frequency: Frequency) -> AlertRule {
        AlertRule {
            id: "r".into(),
            owner_id: String::new(),
            active: true,
            conditions: Vec::new(),
            condition: None,
            condition_value: None,
            exchange_key: Some("X".into()),
            ticker_key: Some("Y".into()),
            target: None,
            session: None,
            frequency,
            first_notification_sent: false,
            last_notified_at: None,
            subscription: PushSubscription {
                endpoint: "e".into(),
                p256dh: "p".into(),
                auth: "a".into(),
            },
        }
    }

    fn threshold() -> Vec<ConditionSpec> {
        vec![ConditionSpec::new(ConditionType::GreaterThan, Some(1.0))]
    }

    #[test]
    fn regular_window_is_inclusive() {
        let (start, end) = (t(9, 0), t(15, 30));
        assert!(within_trading_hours(start, end, t(9, 0)));
        assert!(within_trading_hours(start, end, t(12, 0)));
        assert!(within_trading_hours(start, end, t(15, 30)));
        assert!(!within_trading_hours(start, end, t(8, 59)));
        assert!(!within_trading_hours(start, end, t(15, 31)));
    }

    #[test]
    fn window_wrapping_midnight() {
        let (start, end) = (t(23, 0), t(1, 0));
        assert!(within_trading_hours(start, end, t(23, 30)));
        assert!(within_trading_hours(start, end, t(0, 15)));
        assert!(within_trading_hours(start, end, t(0, 59)));
        assert!(!within_trading_hours(start, end, t(12, 0)));
    }

    #[test]
    fn outside_hours_skips() {
        let ex = exchange(t(9, 0), t(15, 0));
        let decision = decide(&rule(Frequency::MinuteLevel), &threshold(), &ex, at(16, 0));
        assert_eq!(decision, GateDecision::Skip(SkipReason::OutsideTradingHours));
    }

    #[test]
    fn exchange_start_only_needs_exact_minute() {
        let ex = exchange(t(9, 0), t(15, 0));
        let r = rule(Frequency::ExchangeStartOnly);
        assert_eq!(decide(&r, &threshold(), &ex, at(9, 0)), GateDecision::Allow);
        assert_eq!(
            decide(&r, &threshold(), &ex, at(9, 1)),
            GateDecision::Skip(SkipReason::NotSessionStart)
        );
    }

    #[test]
    fn minute_level_thresholds_pass_all_session() {
        let ex = exchange(t(9, 0), t(15, 0));
        for freq in [Frequency::MinuteLevel, Frequency::TenMinuteLevel, Frequency::HourlyLevel] {
            assert!(decide(&rule(freq), &threshold(), &ex, at(11, 37)).is_allowed());
        }
    }

    #[test]
    fn daily_condition_forces_start_minute() {
        let ex = exchange(t(9, 0), t(15, 0));
        let conditions = vec![
            ConditionSpec::new(ConditionType::GreaterThan, Some(1.0)),
            ConditionSpec::new(ConditionType::HawkReversal, None),
        ];
        let r = rule(Frequency::MinuteLevel);
        assert_eq!(
            decide(&r, &conditions, &ex, at(11, 37)),
            GateDecision::Skip(SkipReason::NotSessionStart)
        );
        assert!(decide(&r, &conditions, &ex, at(9, 0)).is_allowed());
    }

    #[test]
    fn unknown_condition_types_count_as_minute_level() {
        let conditions = vec![ConditionSpec {
            condition_type: "RetiredPattern".into(),
            target_price: None,
        }];
        assert!(!has_daily_condition(&conditions));
    }

    #[test]
    fn notified_start_only_rules_wait_for_next_session() {
        let ex = exchange(t(9, 0), t(15, 0));
        let mut r = rule(Frequency::ExchangeStartOnly);
        r.first_notification_sent = true;
        assert_eq!(
            decide(&r, &threshold(), &ex, at(9, 0)),
            GateDecision::Skip(SkipReason::AlreadyNotified)
        );

        let mut r = rule(Frequency::MinuteLevel);
        r.first_notification_sent = true;
        let daily = vec![ConditionSpec::new(ConditionType::ThreeDarkStars, None)];
        assert_eq!(
            decide(&r, &daily, &ex, at(9, 0)),
            GateDecision::Skip(SkipReason::AlreadyNotified)
        );
    }

    #[test]
    fn notification_flag_ignored_for_minute_level_thresholds() {
        let ex = exchange(t(9, 0), t(15, 0));
        let mut r = rule(Frequency::MinuteLevel);
        r.first_notification_sent = true;
        r.last_notified_at = Some(at(12, 0));
        assert!(decide(&r, &threshold(), &ex, at(12, 1)).is_allowed());
    }

    #[test]
    fn stale_flag_detected_after_missed_open() {
        let ex = exchange(t(9, 0), t(15, 0));
        let mut r = rule(Frequency::ExchangeStartOnly);
        assert!(!notified_in_earlier_session(&r, &ex, at(10, 0)));

        r.first_notification_sent = true;
        r.last_notified_at = Some(at(9, 0));
        assert!(!notified_in_earlier_session(&r, &ex, at(9, 0)));
        assert!(!notified_in_earlier_session(&r, &ex, at(14, 0)));

        let next_day_late = Utc.with_ymd_and_hms(2024, 6, 4, 9, 31, 0).unwrap();
        assert!(notified_in_earlier_session(&r, &ex, next_day_late));

        r.last_notified_at = None;
        assert!(notified_in_earlier_session(&r, &ex, at(10, 0)));
    }

    #[test]
    fn session_start_uses_exchange_clock() {
        let mut ex = exchange(t(9, 0), t(15, 0));
        ex.utc_offset_minutes = 540;
        assert!(is_session_start(&ex, at(0, 0)));
        assert!(!is_session_start(&ex, at(9, 0)));
    }
}
