use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{de::DeserializeOwned, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::{debug, info};

use common::{AlertRule, Error, Result, RulePatch, RuleStore};

const SELECT_RULES: &str = r#"
    SELECT id, owner_id, active, conditions, condition, condition_value,
           exchange_key, ticker_key, target, session, frequency,
           first_notification_sent, last_notified_at, subscription
    FROM alert_rules
"#;

/// Apply the bundled schema migrations.
pub async fn migrate(db: &SqlitePool) -> Result<()> {
    sqlx::migrate!("../../migrations")
        .run(db)
        .await
        .map_err(|e| Error::Database(e.into()))?;
    info!("Database migrations applied");
    Ok(())
}

/// Alert rules persisted in SQLite.
///
/// The condition list and the push subscription are stored as JSON text.
#[derive(Clone)]
pub struct SqliteRuleStore {
    db: SqlitePool,
}

impl SqliteRuleStore {
    pub fn new(db: SqlitePool) -> Self {
        Self { db }
    }

    /// Insert or replace a rule. An empty id gets a fresh UUID, which is returned.
    pub async fn upsert(&self, rule: &AlertRule) -> Result<String> {
        let id = if rule.id.is_empty() {
            uuid::Uuid::new_v4().to_string()
        } else {
            rule.id.clone()
        };
        let now = Utc::now().to_rfc3339();
        let conditions = serde_json::to_string(&rule.conditions)?;
        let subscription = serde_json::to_string(&rule.subscription)?;
        let session = rule.session.map(|s| enum_text(&s)).transpose()?;
        let frequency = enum_text(&rule.frequency)?;

        sqlx::query(
            r#"
            INSERT INTO alert_rules (
                id, owner_id, active, conditions, condition, condition_value,
                exchange_key, ticker_key, target, session, frequency,
                first_notification_sent, last_notified_at, subscription, created_at, updated_at
            )
            VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?15)
            ON CONFLICT(id) DO UPDATE SET
                owner_id = excluded.owner_id,
                active = excluded.active,
                conditions = excluded.conditions,
                condition = excluded.condition,
                condition_value = excluded.condition_value,
                exchange_key = excluded.exchange_key,
                ticker_key = excluded.ticker_key,
                target = excluded.target,
                session = excluded.session,
                frequency = excluded.frequency,
                first_notification_sent = excluded.first_notification_sent,
                last_notified_at = excluded.last_notified_at,
                subscription = excluded.subscription,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(&id)
        .bind(&rule.owner_id)
        .bind(rule.active)
        .bind(conditions)
        .bind(rule.condition.as_deref())
        .bind(rule.condition_value)
        .bind(rule.exchange_key.as_deref())
        .bind(rule.ticker_key.as_deref())
        .bind(rule.target.as_deref())
        .bind(session)
        .bind(frequency)
        .bind(rule.first_notification_sent)
        .bind(rule.last_notified_at.map(|at| at.to_rfc3339()))
        .bind(subscription)
        .bind(now)
        .execute(&self.db)
        .await?;

        debug!(rule_id = %id, "Rule saved");
        Ok(id)
    }

    pub async fn delete(&self, id: &str) -> Result<bool> {
        let done = sqlx::query("DELETE FROM alert_rules WHERE id = ?1")
            .bind(id)
            .execute(&self.db)
            .await?;
        Ok(done.rows_affected() > 0)
    }
}

#[async_trait]
impl RuleStore for SqliteRuleStore {
    async fn list(&self) -> Result<Vec<AlertRule>> {
        let rows = sqlx::query(&format!("{SELECT_RULES} ORDER BY created_at, id"))
            .fetch_all(&self.db)
            .await?;
        rows.iter().map(rule_from_row).collect()
    }

    async fn get_by_id(&self, id: &str) -> Result<Option<AlertRule>> {
        let row = sqlx::query(&format!("{SELECT_RULES} WHERE id = ?1"))
            .bind(id)
            .fetch_optional(&self.db)
            .await?;
        row.as_ref().map(rule_from_row).transpose()
    }

    async fn update(&self, id: &str, patch: &RulePatch) -> Result<()> {
        let done = sqlx::query(
            r#"
            UPDATE alert_rules SET
                first_notification_sent = COALESCE(?2, first_notification_sent),
                last_notified_at = COALESCE(?3, last_notified_at),
                active = COALESCE(?4, active),
                updated_at = ?5
            WHERE id = ?1
            "#,
        )
        .bind(id)
        .bind(patch.first_notification_sent)
        .bind(patch.last_notified_at.map(|at| at.to_rfc3339()))
        .bind(patch.active)
        .bind(Utc::now().to_rfc3339())
        .execute(&self.db)
        .await?;

        if done.rows_affected() == 0 {
            return Err(Error::RuleNotFound(id.to_string()));
        }
        debug!(rule_id = id, ?patch, "Rule updated");
        Ok(())
    }
}

fn rule_from_row(row: &SqliteRow) -> Result<AlertRule> {
    let conditions: String = row.try_get("conditions")?;
    let subscription: String = row.try_get("subscription")?;
    let session: Option<String> = row.try_get("session")?;
    let frequency: String = row.try_get("frequency")?;
    let last_notified_at: Option<String> = row.try_get("last_notified_at")?;

    Ok(AlertRule {
        id: row.try_get("id")?,
        owner_id: row.try_get("owner_id")?,
        active: row.try_get("active")?,
        conditions: serde_json::from_str(&conditions)?,
        condition: row.try_get("condition")?,
        condition_value: row.try_get("condition_value")?,
        exchange_key: row.try_get("exchange_key")?,
        ticker_key: row.try_get("ticker_key")?,
        target: row.try_get("target")?,
        session: session.map(parse_enum_text).transpose()?,
        frequency: parse_enum_text(frequency)?,
        first_notification_sent: row.try_get("first_notification_sent")?,
        last_notified_at: last_notified_at.as_deref().map(parse_timestamp).transpose()?,
        subscription: serde_json::from_str(&subscription)?,
    })
}

/// Unit enum variant as its bare serde name, e.g. `MinuteLevel`.
fn enum_text<T: Serialize>(value: &T) -> Result<String> {
    match serde_json::to_value(value)? {
        serde_json::Value::String(s) => Ok(s),
        other => Err(Error::Other(format!("expected a string variant, got {other}"))),
    }
}

fn parse_timestamp(text: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text)
        .map(|at| at.with_timezone(&Utc))
        .map_err(|e| Error::Other(format!("invalid timestamp '{text}': {e}")))
}

fn parse_enum_text<T: DeserializeOwned>(text: String) -> Result<T> {
    Ok(serde_json::from_value(serde_json::Value::String(text))?)
}
