pub mod patterns;
pub mod registry;
pub mod threshold;

pub use patterns::{evaluate_pattern, CandlePattern, GapRule, PatternChecker};
pub use registry::{ConditionCheckerRegistry, FallbackChecker};
pub use threshold::{evaluate_threshold, Direction, PriceThresholdChecker};

use async_trait::async_trait;

use common::{CheckParams, ConditionResult, ConditionType, Result};

/// All condition checker implementations must satisfy this trait.
#[async_trait]
pub trait ConditionChecker: Send + Sync {
    /// The condition identifier this checker answers for.
    fn condition_type(&self) -> ConditionType;

    /// Decide whether the condition currently holds for `params`.
    ///
    /// Missing market data is reported as an unmet result. `Err` is reserved
    /// for failures the caller should record against the rule.
    async fn check(&self, params: &CheckParams) -> Result<ConditionResult>;
}
