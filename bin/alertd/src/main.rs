use std::sync::Arc;

use anyhow::Context;
use sqlx::SqlitePool;
use tokio::time::MissedTickBehavior;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use common::{Config, MarketDataProvider};
use conditions::ConditionCheckerRegistry;
use notifier::{
    BatchError, CachedRuleStore, ExchangeFileConfig, NotificationOrchestrator, OrchestratorConfig,
};
use paper::{PaperMarketData, PaperPush};
use store::SqliteRuleStore;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── Logging ──────────────────────────────────────────────────────────────
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive("info".parse()?))
        .init();

    // ── Config ────────────────────────────────────────────────────────────────
    let cfg = Config::from_env();
    info!(
        tick_secs = cfg.tick_interval.as_secs(),
        max_concurrency = cfg.max_concurrency,
        "alertd starting"
    );

    // ── Database ──────────────────────────────────────────────────────────────
    let db = SqlitePool::connect(&cfg.database_url)
        .await
        .context("failed to connect to database")?;
    store::migrate(&db).await.context("database migration failed")?;
    info!("Database ready");

    let rules = Arc::new(CachedRuleStore::new(SqliteRuleStore::new(db), cfg.rule_cache_ttl));

    // ── Exchanges ─────────────────────────────────────────────────────────────
    let exchanges = ExchangeFileConfig::load(&cfg.exchange_config_path).into_directory();
    if exchanges.is_empty() {
        warn!(path = %cfg.exchange_config_path, "No exchanges configured; every rule will fail");
    } else {
        info!(count = exchanges.len(), "Exchange hours loaded");
    }

    // ── Market data ───────────────────────────────────────────────────────────
    let market: Arc<dyn MarketDataProvider> = match &cfg.market_snapshot_path {
        Some(path) => Arc::new(
            PaperMarketData::load_snapshot(path)
                .with_context(|| format!("failed to load market snapshot '{path}'"))?,
        ),
        None => {
            info!("No market snapshot configured, starting with an empty paper market");
            Arc::new(PaperMarketData::new())
        }
    };

    // ── Orchestrator ──────────────────────────────────────────────────────────
    let registry = ConditionCheckerRegistry::with_defaults(market);
    info!(checkers = registry.supported_types().len(), "Condition checkers registered");

    let orchestrator = NotificationOrchestrator::new(
        rules,
        Arc::new(exchanges),
        Arc::new(registry),
        Arc::new(PaperPush::new()),
        OrchestratorConfig::from(&cfg),
    );

    let mut ticker = tokio::time::interval(cfg.tick_interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    info!("Notifier running. Waiting for shutdown signal.");
    loop {
        tokio::select! {
            _ = ticker.tick() => run_once(&orchestrator).await,
            _ = tokio::signal::ctrl_c() => break,
        }
    }
    info!("Shutdown signal received. Exiting.");
    Ok(())
}

async fn run_once(orchestrator: &NotificationOrchestrator) {
    match orchestrator.run_batch().await {
        Ok(report) => {
            info!(notified = report.notified, skipped = report.skipped, "Batch complete");
        }
        Err(e @ BatchError::ListRules(_)) => {
            error!(error = %e, "Batch aborted");
        }
        Err(e @ BatchError::RuleFailures { .. }) => {
            error!(error = %e, "Batch completed with failures");
        }
    }
}
