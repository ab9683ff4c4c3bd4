//! Outcome of a single flag decision.

use serde::{Deserialize, Serialize};

use crate::impl_domain_enum_conversions;

/// Which step of the decision order produced the result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EvaluationReason {
    NotFound,
    Disabled,
    NoRuleMatched,
    FullRollout,
    InBucket,
    OutOfBucket,
    /// No `userId`/`sessionId` present and percentage above zero.
    AnonymousDefault,
    ZeroPercent,
}

impl_domain_enum_conversions!(EvaluationReason {
    NotFound => "not_found",
    Disabled => "disabled",
    NoRuleMatched => "no_rule_matched",
    FullRollout => "full_rollout",
    InBucket => "in_bucket",
    OutOfBucket => "out_of_bucket",
    AnonymousDefault => "anonymous_default",
    ZeroPercent => "zero_percent",
});

/// Decision plus the reason behind it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagEvaluation {
    /// Identifier the caller asked about
    pub feature: String,
    pub enabled: bool,
    pub reason: EvaluationReason,
}

impl FeatureFlagEvaluation {
    pub fn new(feature: impl Into<String>, enabled: bool, reason: EvaluationReason) -> Self {
        Self { feature: feature.into(), enabled, reason }
    }
}
