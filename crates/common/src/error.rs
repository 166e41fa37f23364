use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("rule {0} has no exchange key")]
    MissingExchange(String),

    #[error("rule {0} has no ticker key")]
    MissingTicker(String),

    #[error("unknown exchange '{0}'")]
    UnknownExchange(String),

    #[error("rule not found: {0}")]
    RuleNotFound(String),

    #[error("Market data error: {0}")]
    MarketData(String),

    #[error("Push delivery failed: {0}")]
    Delivery(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("deadline exceeded")]
    DeadlineExceeded,

    #[error("{0}")]
    Other(String),
}

/// A condition identifier that is not part of the known set.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown condition type '{0}'")]
pub struct ParseConditionTypeError(pub String);

pub type Result<T, E = Error> = std::result::Result<T, E>;
