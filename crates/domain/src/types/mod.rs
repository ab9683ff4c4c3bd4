//! Domain value types for flags, rules and evaluation

pub mod context;
pub mod evaluation;
pub mod flags;

pub use context::FeatureContext;
pub use evaluation::{EvaluationReason, FeatureFlagEvaluation};
pub use flags::{FeatureFlag, FeatureFlagRule, NewFeatureFlag, NewFeatureFlagRule, RuleOperator};
