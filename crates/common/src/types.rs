use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::{Error, ParseConditionTypeError, Result};

/// One OHLC price bar.
///
/// Series handed to condition checkers are ordered oldest first, most recent last.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub close: f64,
    pub low: f64,
    pub high: f64,
}

impl Candle {
    /// Build a candle from the positional `[open, close, low, high]` row
    /// format used by upstream chart feeds.
    pub fn from_row(timestamp: DateTime<Utc>, row: [f64; 4]) -> Self {
        let [open, close, low, high] = row;
        Self { timestamp, open, close, low, high }
    }

    /// `low <= min(open, close)` and `high >= max(open, close)`.
    pub fn is_well_formed(&self) -> bool {
        self.low <= self.open.min(self.close) && self.high >= self.open.max(self.close)
    }
}

/// Reorder a newest-first upstream feed into the oldest-first order checkers expect.
pub fn candles_oldest_first(mut newest_first: Vec<Candle>) -> Vec<Candle> {
    newest_first.reverse();
    newest_first
}

/// Trading-hours filter applied when requesting market data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Session {
    #[default]
    Regular,
    Extended,
}

impl fmt::Display for Session {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Session::Regular => write!(f, "regular"),
            Session::Extended => write!(f, "extended"),
        }
    }
}

/// Candle interval requested from the market data provider.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    Minute,
    TenMinute,
    Hour,
    Day,
}

/// Parameters of a candle request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CandleQuery {
    pub count: usize,
    pub session: Option<Session>,
    pub timeframe: Option<Timeframe>,
}

/// Closed set of condition identifiers understood by the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum ConditionType {
    GreaterThan,
    LessThan,
    ThreeRedSoldiers,
    SansenAkenomyojo,
    Fireworks,
    ShootingStar,
    BearishHaramiCross,
    BullishHaramiCross,
    HawkReversal,
    OkajiThreeCrows,
    FallingStones,
    TwoTakuriLines,
    SwallowReturn,
    ThreeDarkStars,
}

impl ConditionType {
    pub const ALL: [ConditionType; 14] = [
        ConditionType::GreaterThan,
        ConditionType::LessThan,
        ConditionType::ThreeRedSoldiers,
        ConditionType::SansenAkenomyojo,
        ConditionType::Fireworks,
        ConditionType::ShootingStar,
        ConditionType::BearishHaramiCross,
        ConditionType::BullishHaramiCross,
        ConditionType::HawkReversal,
        ConditionType::OkajiThreeCrows,
        ConditionType::FallingStones,
        ConditionType::TwoTakuriLines,
        ConditionType::SwallowReturn,
        ConditionType::ThreeDarkStars,
    ];

    /// Canonical identifier as stored on alert rules.
    pub fn as_str(&self) -> &'static str {
        match self {
            ConditionType::GreaterThan => "GreaterThan",
            ConditionType::LessThan => "LessThan",
            ConditionType::ThreeRedSoldiers => "ThreeRedSoldiers",
            ConditionType::SansenAkenomyojo => "SansenAkenomyojo",
            ConditionType::Fireworks => "Fireworks",
            ConditionType::ShootingStar => "ShootingStar",
            ConditionType::BearishHaramiCross => "BearishHaramiCross",
            ConditionType::BullishHaramiCross => "BullishHaramiCross",
            ConditionType::HawkReversal => "HawkReversal",
            ConditionType::OkajiThreeCrows => "OkajiThreeCrows",
            ConditionType::FallingStones => "FallingStones",
            ConditionType::TwoTakuriLines => "TwoTakuriLines",
            ConditionType::SwallowReturn => "SwallowReturn",
            ConditionType::ThreeDarkStars => "ThreeDarkStars",
        }
    }

    /// Pattern conditions are evaluated on daily candles and only make sense
    /// once per session. Threshold conditions are minute-level.
    pub fn is_daily(&self) -> bool {
        !matches!(self, ConditionType::GreaterThan | ConditionType::LessThan)
    }
}

impl fmt::Display for ConditionType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ConditionType {
    type Err = ParseConditionTypeError;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        if let Some(ty) = ConditionType::ALL.iter().find(|ty| ty.as_str() == s) {
            return Ok(*ty);
        }
        // Identifiers written by older rule editors.
        match s {
            "ThreeRiverEveningStar" => Ok(ConditionType::SansenAkenomyojo),
            "Akasanpei" => Ok(ConditionType::ThreeRedSoldiers),
            _ => Err(ParseConditionTypeError(s.to_string())),
        }
    }
}

/// One condition attached to an alert rule.
///
/// The identifier is kept as text so rules referencing retired condition
/// types still load and can be reported on by the registry.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConditionSpec {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub target_price: Option<f64>,
}

impl ConditionSpec {
    pub fn new(condition_type: ConditionType, target_price: Option<f64>) -> Self {
        Self {
            condition_type: condition_type.as_str().to_string(),
            target_price,
        }
    }

    /// `None` when the identifier is not one of the known condition types.
    pub fn kind(&self) -> Option<ConditionType> {
        self.condition_type.parse().ok()
    }
}

/// How often a rule may be re-checked and notify.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum Frequency {
    ExchangeStartOnly,
    #[default]
    MinuteLevel,
    TenMinuteLevel,
    HourlyLevel,
}

impl fmt::Display for Frequency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Frequency::ExchangeStartOnly => write!(f, "exchange-start-only"),
            Frequency::MinuteLevel => write!(f, "minute"),
            Frequency::TenMinuteLevel => write!(f, "ten-minute"),
            Frequency::HourlyLevel => write!(f, "hourly"),
        }
    }
}

/// Web push subscription the notification is delivered to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PushSubscription {
    pub endpoint: String,
    pub p256dh: String,
    pub auth: String,
}

fn default_active() -> bool {
    true
}

/// A user-configured alert rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AlertRule {
    pub id: String,
    #[serde(default)]
    pub owner_id: String,
    #[serde(default = "default_active")]
    pub active: bool,
    #[serde(default)]
    pub conditions: Vec<ConditionSpec>,
    /// Single-condition field from before multi-condition rules existed.
    #[serde(default)]
    pub condition: Option<String>,
    #[serde(default)]
    pub condition_value: Option<f64>,
    #[serde(default)]
    pub exchange_key: Option<String>,
    #[serde(default)]
    pub ticker_key: Option<String>,
    /// Display name used in notification text. Falls back to the ticker key.
    #[serde(default)]
    pub target: Option<String>,
    #[serde(default)]
    pub session: Option<Session>,
    #[serde(default)]
    pub frequency: Frequency,
    #[serde(default)]
    pub first_notification_sent: bool,
    /// When the last notification for this rule went out.
    #[serde(default)]
    pub last_notified_at: Option<DateTime<Utc>>,
    pub subscription: PushSubscription,
}

impl AlertRule {
    /// The conditions to evaluate, in order. The multi-condition list wins;
    /// otherwise the legacy single condition is used.
    pub fn effective_conditions(&self) -> Vec<ConditionSpec> {
        if !self.conditions.is_empty() {
            return self.conditions.clone();
        }
        match &self.condition {
            Some(ty) if !ty.is_empty() => vec![ConditionSpec {
                condition_type: ty.clone(),
                target_price: self.condition_value,
            }],
            _ => Vec::new(),
        }
    }

    pub fn exchange_key(&self) -> Result<&str> {
        self.exchange_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingExchange(self.id.clone()))
    }

    pub fn ticker_key(&self) -> Result<&str> {
        self.ticker_key
            .as_deref()
            .filter(|k| !k.is_empty())
            .ok_or_else(|| Error::MissingTicker(self.id.clone()))
    }

    pub fn display_target(&self) -> &str {
        self.target
            .as_deref()
            .or(self.ticker_key.as_deref())
            .unwrap_or(&self.id)
    }
}

/// Partial update applied through the rule store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RulePatch {
    pub first_notification_sent: Option<bool>,
    pub last_notified_at: Option<DateTime<Utc>>,
    pub active: Option<bool>,
}

impl RulePatch {
    pub fn first_notification_sent(sent: bool) -> Self {
        Self {
            first_notification_sent: Some(sent),
            ..Self::default()
        }
    }

    /// Record a notification sent at `at`.
    pub fn notified_at(at: DateTime<Utc>) -> Self {
        Self {
            first_notification_sent: Some(true),
            last_notified_at: Some(at),
            ..Self::default()
        }
    }

    pub fn apply(&self, rule: &mut AlertRule) {
        if let Some(sent) = self.first_notification_sent {
            rule.first_notification_sent = sent;
        }
        if let Some(at) = self.last_notified_at {
            rule.last_notified_at = Some(at);
        }
        if let Some(active) = self.active {
            rule.active = active;
        }
    }
}

/// Wall-clock time of day at minute precision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct TimeOfDay {
    pub hour: u8,
    pub minute: u8,
}

impl TimeOfDay {
    pub const fn new(hour: u8, minute: u8) -> Self {
        Self { hour, minute }
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:02}:{:02}", self.hour, self.minute)
    }
}

/// Trading hours of an exchange. The window may wrap past midnight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Exchange {
    pub key: String,
    pub trading_start: TimeOfDay,
    pub trading_end: TimeOfDay,
    /// Offset of the exchange's wall clock from UTC.
    ///
    /// Fixed for the process lifetime: exchanges that observe daylight saving
    /// time (NYSE, LSE) are an hour off for part of the year unless the
    /// config is updated when their clocks change.
    #[serde(default)]
    pub utc_offset_minutes: i32,
}

impl Exchange {
    /// Current time of day on the exchange's wall clock.
    pub fn local_time_of_day(&self, now: DateTime<Utc>) -> TimeOfDay {
        let local = now + Duration::minutes(i64::from(self.utc_offset_minutes));
        TimeOfDay::new(local.hour() as u8, local.minute() as u8)
    }

    /// The most recent trading start at or before `now`, in UTC.
    pub fn current_session_start(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        let offset = Duration::minutes(i64::from(self.utc_offset_minutes));
        let local = now + offset;
        let since_midnight = Duration::seconds(i64::from(local.num_seconds_from_midnight()))
            + Duration::nanoseconds(i64::from(local.nanosecond()));
        let start_minutes =
            i64::from(self.trading_start.hour) * 60 + i64::from(self.trading_start.minute);

        let mut start = local - since_midnight + Duration::minutes(start_minutes);
        if start > local {
            start = start - Duration::days(1);
        }
        start - offset
    }
}

/// Outcome of evaluating one condition.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConditionResult {
    pub met: bool,
    pub message: String,
}

impl ConditionResult {
    pub fn met(message: impl Into<String>) -> Self {
        Self { met: true, message: message.into() }
    }

    pub fn not_met(message: impl Into<String>) -> Self {
        Self { met: false, message: message.into() }
    }
}

/// Everything a checker needs to evaluate one condition for one rule.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckParams {
    /// Display name used in messages.
    pub target: String,
    pub exchange_key: String,
    pub ticker_key: String,
    pub condition_value: Option<f64>,
    pub session: Option<Session>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn rule() -> AlertRule {
        AlertRule {
            id: "r1".into(),
            owner_id: "u1".into(),
            active: true,
            conditions: Vec::new(),
            condition: None,
            condition_value: None,
            exchange_key: Some("TSE".into()),
            ticker_key: Some("7203".into()),
            target: None,
            session: None,
            frequency: Frequency::MinuteLevel,
            first_notification_sent: false,
            last_notified_at: None,
            subscription: PushSubscription {
                endpoint: "https://push.example/abc".into(),
                p256dh: "key".into(),
                auth: "auth".into(),
            },
        }
    }

    #[test]
    fn condition_type_parses_canonical_and_legacy_names() {
        for ty in ConditionType::ALL {
            assert_eq!(ty.as_str().parse::<ConditionType>().unwrap(), ty);
        }
        assert_eq!(
            "ThreeRiverEveningStar".parse::<ConditionType>().unwrap(),
            ConditionType::SansenAkenomyojo
        );
        assert!("greaterthan".parse::<ConditionType>().is_err());
    }

    #[test]
    fn only_thresholds_are_minute_level() {
        let minute: Vec<_> = ConditionType::ALL.iter().filter(|t| !t.is_daily()).collect();
        assert_eq!(minute, vec![&ConditionType::GreaterThan, &ConditionType::LessThan]);
    }

    #[test]
    fn legacy_single_condition_is_used_when_list_is_empty() {
        let mut r = rule();
        r.condition = Some("GreaterThan".into());
        r.condition_value = Some(950.0);
        let conds = r.effective_conditions();
        assert_eq!(conds, vec![ConditionSpec::new(ConditionType::GreaterThan, Some(950.0))]);

        r.conditions = vec![ConditionSpec::new(ConditionType::Fireworks, None)];
        assert_eq!(r.effective_conditions()[0].kind(), Some(ConditionType::Fireworks));
    }

    #[test]
    fn missing_keys_are_errors() {
        let mut r = rule();
        r.exchange_key = Some(String::new());
        r.ticker_key = None;
        assert!(matches!(r.exchange_key(), Err(Error::MissingExchange(id)) if id == "r1"));
        assert!(matches!(r.ticker_key(), Err(Error::MissingTicker(_))));
    }

    #[test]
    fn rule_deserializes_with_defaults() {
        let json = r#"{
            "id": "r9",
            "conditions": [{"type": "LessThan", "targetPrice": 12.5}],
            "exchangeKey": "NYSE",
            "tickerKey": "IBM",
            "frequency": "ExchangeStartOnly",
            "subscription": {"endpoint": "e", "p256dh": "p", "auth": "a"}
        }"#;
        let r: AlertRule = serde_json::from_str(json).unwrap();
        assert!(r.active);
        assert!(!r.first_notification_sent);
        assert_eq!(r.last_notified_at, None);
        assert_eq!(r.frequency, Frequency::ExchangeStartOnly);
        assert_eq!(r.conditions[0].target_price, Some(12.5));
        assert_eq!(r.display_target(), "IBM");
    }

    #[test]
    fn local_time_applies_offset() {
        let ex = Exchange {
            key: "TSE".into(),
            trading_start: TimeOfDay::new(9, 0),
            trading_end: TimeOfDay::new(15, 0),
            utc_offset_minutes: 540,
        };
        let now = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(ex.local_time_of_day(now), TimeOfDay::new(8, 30));
    }

    #[test]
    fn session_start_is_most_recent_open() {
        let tse = Exchange {
            key: "TSE".into(),
            trading_start: TimeOfDay::new(9, 0),
            trading_end: TimeOfDay::new(15, 0),
            utc_offset_minutes: 540,
        };
        // 08:30 Tokyo: the latest open was yesterday's.
        let before_open = Utc.with_ymd_and_hms(2024, 3, 1, 23, 30, 0).unwrap();
        assert_eq!(
            tse.current_session_start(before_open),
            Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()
        );
        // 09:30 Tokyo.
        let after_open = Utc.with_ymd_and_hms(2024, 3, 2, 0, 30, 0).unwrap();
        assert_eq!(
            tse.current_session_start(after_open),
            Utc.with_ymd_and_hms(2024, 3, 2, 0, 0, 0).unwrap()
        );

        let overnight = Exchange {
            key: "CME".into(),
            trading_start: TimeOfDay::new(18, 0),
            trading_end: TimeOfDay::new(17, 0),
            utc_offset_minutes: -240,
        };
        let morning = Utc.with_ymd_and_hms(2024, 6, 4, 14, 0, 0).unwrap();
        assert_eq!(
            overnight.current_session_start(morning),
            Utc.with_ymd_and_hms(2024, 6, 3, 22, 0, 0).unwrap()
        );
        let exact = Utc.with_ymd_and_hms(2024, 6, 4, 22, 0, 0).unwrap();
        assert_eq!(overnight.current_session_start(exact), exact);
    }

    #[test]
    fn notified_patch_sets_flag_and_time() {
        let mut r = rule();
        let at = Utc.with_ymd_and_hms(2024, 6, 3, 12, 0, 0).unwrap();
        RulePatch::notified_at(at).apply(&mut r);
        assert!(r.first_notification_sent);
        assert_eq!(r.last_notified_at, Some(at));

        RulePatch::first_notification_sent(false).apply(&mut r);
        assert!(!r.first_notification_sent);
        assert_eq!(r.last_notified_at, Some(at));
    }

    #[test]
    fn reversing_newest_first_feed() {
        let t = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let newer = Candle::from_row(t + Duration::days(1), [2.0, 3.0, 1.0, 4.0]);
        let older = Candle::from_row(t, [1.0, 2.0, 0.5, 2.5]);
        let ordered = candles_oldest_first(vec![newer, older]);
        assert_eq!(ordered, vec![older, newer]);
        assert!(ordered.iter().all(Candle::is_well_formed));
    }
}
