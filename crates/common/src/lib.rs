pub mod collaborators;
pub mod config;
pub mod error;
pub mod types;

pub use collaborators::{ExchangeDirectory, MarketDataProvider, PushDelivery, RuleStore};
pub use config::Config;
pub use error::{Error, ParseConditionTypeError, Result};
pub use types::*;
