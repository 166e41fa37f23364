pub mod cache;
pub mod config;
pub mod gate;
pub mod orchestrator;

pub use cache::CachedRuleStore;
pub use config::{ExchangeFileConfig, OrchestratorConfig, StaticExchangeDirectory};
pub use gate::{GateDecision, SkipReason};
pub use orchestrator::{BatchError, BatchReport, NotificationOrchestrator, RuleFailure};
