use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use futures_util::stream::{self, StreamExt};
use futures_util::FutureExt;
use thiserror::Error;
use tracing::{debug, error, info, warn};

use common::{
    AlertRule, CheckParams, Error, ExchangeDirectory, PushDelivery, Result, RulePatch, RuleStore,
};
use conditions::ConditionCheckerRegistry;

use crate::config::OrchestratorConfig;
use crate::gate::{self, GateDecision, SkipReason};

/// Counts for one batch run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BatchReport {
    /// Active rules considered.
    pub total: usize,
    /// Refused by the gate.
    pub skipped: usize,
    /// Conditions evaluated (with or without a match).
    pub evaluated: usize,
    pub notified: usize,
    pub failed: usize,
}

/// A rule whose processing failed.
#[derive(Debug)]
pub struct RuleFailure {
    pub rule_id: String,
    pub error: Error,
}

impl std::fmt::Display for RuleFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "rule {}: {}", self.rule_id, self.error)
    }
}

fn join_failures(failures: &[RuleFailure]) -> String {
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

#[derive(Debug, Error)]
pub enum BatchError {
    #[error("failed to list alert rules: {0}")]
    ListRules(#[source] Error),

    /// Some rules failed. Notifications for the other rules were still sent;
    /// `report` has the counts.
    #[error("{} of {} alert rules failed: {}", .failures.len(), .report.total, join_failures(.failures))]
    RuleFailures {
        report: BatchReport,
        failures: Vec<RuleFailure>,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum RuleOutcome {
    Skipped(SkipReason),
    NoMatch,
    Notified { condition: String },
}

/// Runs every active alert rule through the gate and the condition registry
/// and sends a push notification for each rule with a met condition.
///
/// Rules are independent: a failing rule is recorded and the batch moves on.
pub struct NotificationOrchestrator {
    rules: Arc<dyn RuleStore>,
    exchanges: Arc<dyn ExchangeDirectory>,
    registry: Arc<ConditionCheckerRegistry>,
    push: Arc<dyn PushDelivery>,
    config: OrchestratorConfig,
}

impl NotificationOrchestrator {
    pub fn new(
        rules: Arc<dyn RuleStore>,
        exchanges: Arc<dyn ExchangeDirectory>,
        registry: Arc<ConditionCheckerRegistry>,
        push: Arc<dyn PushDelivery>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            rules,
            exchanges,
            registry,
            push,
            config,
        }
    }

    pub async fn run_batch(&self) -> std::result::Result<BatchReport, BatchError> {
        self.run_batch_at(Utc::now()).await
    }

    /// Run one batch as if the current time were `now`.
    pub async fn run_batch_at(&self, now: DateTime<Utc>) -> std::result::Result<BatchReport, BatchError> {
        let rules: Vec<AlertRule> = self
            .rules
            .list()
            .await
            .map_err(BatchError::ListRules)?
            .into_iter()
            .filter(|r| r.active)
            .collect();

        let mut report = BatchReport {
            total: rules.len(),
            ..BatchReport::default()
        };
        info!(rules = report.total, at = %now, "Notification batch starting");

        let deadline = self
            .config
            .batch_deadline
            .map(|d| tokio::time::Instant::now() + d);

        let outcomes: Vec<(String, Result<RuleOutcome>)> = stream::iter(rules)
            .map(|rule| async move {
                let rule_id = rule.id.clone();
                let work = AssertUnwindSafe(self.process_rule(rule, now))
                    .catch_unwind()
                    .map(|res| {
                        res.unwrap_or_else(|_| {
                            Err(Error::Other("panicked while evaluating rule".to_string()))
                        })
                    });
                let outcome = match deadline {
                    Some(deadline) => tokio::time::timeout_at(deadline, work)
                        .await
                        .unwrap_or(Err(Error::DeadlineExceeded)),
                    None => work.await,
                };
                (rule_id, outcome)
            })
            .buffered(self.config.max_concurrency.max(1))
            .collect()
            .await;

        let mut failures = Vec::new();
        for (rule_id, outcome) in outcomes {
            match outcome {
                Ok(RuleOutcome::Skipped(reason)) => {
                    debug!(rule_id = %rule_id, reason = %reason, "Rule skipped by gate");
                    report.skipped += 1;
                }
                Ok(RuleOutcome::NoMatch) => {
                    report.evaluated += 1;
                }
                Ok(RuleOutcome::Notified { condition }) => {
                    info!(rule_id = %rule_id, condition = %condition, "Notification sent");
                    report.evaluated += 1;
                    report.notified += 1;
                }
                Err(error) => {
                    warn!(rule_id = %rule_id, error = %error, "Alert rule failed");
                    report.failed += 1;
                    failures.push(RuleFailure { rule_id, error });
                }
            }
        }

        info!(
            total = report.total,
            skipped = report.skipped,
            evaluated = report.evaluated,
            notified = report.notified,
            failed = report.failed,
            "Notification batch finished"
        );

        if failures.is_empty() {
            Ok(report)
        } else {
            error!(failed = failures.len(), "Notification batch completed with failures");
            Err(BatchError::RuleFailures { report, failures })
        }
    }

    async fn process_rule(&self, mut rule: AlertRule, now: DateTime<Utc>) -> Result<RuleOutcome> {
        let exchange_key = rule.exchange_key()?.to_string();
        let ticker_key = rule.ticker_key()?.to_string();
        let exchange = self
            .exchanges
            .get_exchange(&exchange_key)
            .await?
            .ok_or_else(|| Error::UnknownExchange(exchange_key.clone()))?;

        let conditions = rule.effective_conditions();
        if conditions.is_empty() {
            debug!(rule_id = %rule.id, "Rule has no conditions");
            return Ok(RuleOutcome::NoMatch);
        }

        // A new session clears last session's notification.
        if gate::notified_in_earlier_session(&rule, &exchange, now) {
            self.rules
                .update(&rule.id, &RulePatch::first_notification_sent(false))
                .await?;
            rule.first_notification_sent = false;
        }

        if let GateDecision::Skip(reason) = gate::decide(&rule, &conditions, &exchange, now) {
            return Ok(RuleOutcome::Skipped(reason));
        }

        let base = CheckParams {
            target: rule.display_target().to_string(),
            exchange_key,
            ticker_key,
            condition_value: None,
            session: rule.session,
        };

        for spec in &conditions {
            let params = CheckParams {
                condition_value: spec.target_price,
                ..base.clone()
            };
            let result = self.registry.check(&spec.condition_type, &params).await?;
            debug!(
                rule_id = %rule.id,
                condition = %spec.condition_type,
                met = result.met,
                message = %result.message,
                "Condition checked"
            );
            if !result.met {
                continue;
            }

            self.push.send(&rule.subscription, &result.message).await?;
            self.rules
                .update(&rule.id, &RulePatch::notified_at(now))
                .await?;
            return Ok(RuleOutcome::Notified {
                condition: spec.condition_type.clone(),
            });
        }

        Ok(RuleOutcome::NoMatch)
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
