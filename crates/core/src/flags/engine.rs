//! Feature flag decision engine.
//!
//! Decision order, first applicable step wins:
//!
//! 1. Unknown id/name → off
//! 2. `enabled == false` → off
//! 3. Rules present and none match → off
//! 4. `percentage == 100` → on
//! 5. `percentage > 0` → bucket on `userId`, else `sessionId`; with neither
//!    the flag is on. `percentage == 0` → off
//!
//! Evaluation is infallible. Storage problems are absorbed by the cache and
//! at worst make every flag read as off.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cortex_core::{FeatureFlagEngine, FeatureFlagRepository, FlagCache};
//! use cortex_domain::{FeatureContext, FlagCacheConfig};
//!
//! # async fn example(repo: Arc<dyn FeatureFlagRepository>) {
//! let cache = Arc::new(FlagCache::new(repo, FlagCacheConfig::default()));
//! let engine = FeatureFlagEngine::new(cache);
//!
//! let ctx = FeatureContext::new().with_user_id("patient-42");
//! if engine.is_enabled("adaptive_difficulty", &ctx).await {
//!     // serve the new game flow
//! }
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use cortex_domain::{EvaluationReason, FeatureContext, FeatureFlag, FeatureFlagEvaluation};
use tracing::{debug, warn};

use super::cache::{CachedFlags, FlagCache, SnapshotState};
use super::{rollout, rules};
use crate::clock::{Clock, SystemClock};

/// Answers "is this feature on for this caller".
pub struct FeatureFlagEngine<C: Clock = SystemClock> {
    cache: Arc<FlagCache<C>>,
}

impl<C: Clock> Clone for FeatureFlagEngine<C> {
    fn clone(&self) -> Self {
        Self { cache: Arc::clone(&self.cache) }
    }
}

impl<C: Clock> FeatureFlagEngine<C> {
    /// Engine evaluating against `cache`.
    pub fn new(cache: Arc<FlagCache<C>>) -> Self {
        Self { cache }
    }

    /// The shared snapshot cache.
    pub fn cache(&self) -> &Arc<FlagCache<C>> {
        &self.cache
    }

    /// Whether `feature_id` (flag id or name) is active for `context`.
    pub async fn is_enabled(&self, feature_id: &str, context: &FeatureContext) -> bool {
        self.evaluate(feature_id, context).await.enabled
    }

    /// Decision plus the step that produced it.
    pub async fn evaluate(&self, feature_id: &str, context: &FeatureContext) -> FeatureFlagEvaluation {
        let snapshot = self.snapshot().await;
        let (enabled, reason) = match snapshot.find(feature_id) {
            Some(flag) => decide(flag, context),
            None => (false, EvaluationReason::NotFound),
        };

        debug!(feature = feature_id, enabled, reason = %reason, "feature_flag_evaluated");
        FeatureFlagEvaluation::new(feature_id, enabled, reason)
    }

    /// Evaluate every known flag against one snapshot, keyed by flag name.
    pub async fn evaluate_all(&self, context: &FeatureContext) -> BTreeMap<String, bool> {
        let snapshot = self.snapshot().await;
        snapshot.flags.iter().map(|flag| (flag.name.clone(), decide(flag, context).0)).collect()
    }

    async fn snapshot(&self) -> CachedFlags {
        let snapshot = self.cache.get_all().await;
        if snapshot.state == SnapshotState::Unavailable {
            warn!("no feature flag snapshot available, evaluating all flags as off");
        }
        snapshot
    }
}

/// Apply the decision order to a single flag.
///
/// The rollout hash is keyed on the flag id, so renaming a flag does not
/// reshuffle its audience.
pub fn decide(flag: &FeatureFlag, context: &FeatureContext) -> (bool, EvaluationReason) {
    if !flag.enabled {
        return (false, EvaluationReason::Disabled);
    }

    if !rules::any_match(&flag.rules, context) {
        return (false, EvaluationReason::NoRuleMatched);
    }

    match flag.percentage {
        p if p >= 100 => (true, EvaluationReason::FullRollout),
        0 => (false, EvaluationReason::ZeroPercent),
        p => match context.rollout_identity() {
            Some(identity) if rollout::in_bucket(identity, &flag.id, p) => {
                (true, EvaluationReason::InBucket)
            }
            Some(_) => (false, EvaluationReason::OutOfBucket),
            // TODO: anonymous traffic is admitted at any non-zero percentage; needs a product
            // decision before it can be excluded.
            None => (true, EvaluationReason::AnonymousDefault),
        },
    }
}

#[cfg(test)]
mod tests {
    use cortex_domain::{FlagCacheConfig, NewFeatureFlag, NewFeatureFlagRule, RuleOperator};

    use super::*;
    use crate::testing::InMemoryFlagRepository;

    async fn engine_with(
        flags: Vec<NewFeatureFlag>,
    ) -> (FeatureFlagEngine, Arc<InMemoryFlagRepository>) {
        let repo = Arc::new(InMemoryFlagRepository::new());
        for flag in flags {
            repo.upsert(flag).await;
        }
        let cache = Arc::new(FlagCache::new(repo.clone(), FlagCacheConfig::default()));
        (FeatureFlagEngine::new(cache), repo)
    }

    fn flag(name: &str, enabled: bool, percentage: u8) -> NewFeatureFlag {
        NewFeatureFlag { id: Some(name.to_string()), enabled, ..NewFeatureFlag::new(name, percentage) }
    }

    #[tokio::test]
    async fn full_rollout_without_rules_is_on_for_empty_context() {
        let (engine, _) = engine_with(vec![flag("f", true, 100)]).await;
        assert!(engine.is_enabled("f", &FeatureContext::new()).await);
    }

    #[tokio::test]
    async fn zero_percent_is_off() {
        let (engine, _) = engine_with(vec![flag("f", true, 0)]).await;
        let eval = engine.evaluate("f", &FeatureContext::new().with_user_id("u1")).await;
        assert!(!eval.enabled);
        assert_eq!(eval.reason, EvaluationReason::ZeroPercent);
    }

    #[tokio::test]
    async fn half_rollout_admits_about_half_of_users() {
        let (engine, _) = engine_with(vec![flag("f", true, 50)]).await;

        let mut admitted = 0;
        for i in 0..10_000 {
            let ctx = FeatureContext::new().with_user_id(format!("user-{i}"));
            if engine.is_enabled("f", &ctx).await {
                admitted += 1;
            }
        }
        assert!((4_500..=5_500).contains(&admitted), "admitted {admitted}");
    }

    #[tokio::test]
    async fn role_rule_gates_full_rollout() {
        let (engine, repo) = engine_with(vec![flag("f", true, 100)]).await;
        repo.add("f", NewFeatureFlagRule::new("role", RuleOperator::Equals, "beta")).await;

        assert!(!engine.is_enabled("f", &FeatureContext::new().with_role("ga")).await);
        assert!(engine.is_enabled("f", &FeatureContext::new().with_role("beta")).await);
    }

    #[tokio::test]
    async fn disabled_flag_is_off_whatever_the_context() {
        let (engine, repo) = engine_with(vec![flag("f", false, 100)]).await;
        repo.add("f", NewFeatureFlagRule::new("role", RuleOperator::Equals, "beta")).await;

        let contexts = [
            FeatureContext::new(),
            FeatureContext::new().with_role("beta"),
            FeatureContext::new().with_user_id("u1").with_role("beta"),
        ];
        for ctx in &contexts {
            let eval = engine.evaluate("f", ctx).await;
            assert!(!eval.enabled);
            assert_eq!(eval.reason, EvaluationReason::Disabled);
        }
    }

    #[tokio::test]
    async fn one_matching_rule_is_enough() {
        let (engine, repo) = engine_with(vec![flag("f", true, 100)]).await;
        repo.add("f", NewFeatureFlagRule::new("role", RuleOperator::Equals, "clinician")).await;
        repo.add("f", NewFeatureFlagRule::new("country", RuleOperator::In, "NL, BE")).await;

        let ctx = FeatureContext::new().with_role("patient").with("country", "BE");
        assert!(engine.is_enabled("f", &ctx).await);

        let eval = engine.evaluate("f", &FeatureContext::new().with_role("patient")).await;
        assert_eq!(eval.reason, EvaluationReason::NoRuleMatched);
    }

    #[tokio::test]
    async fn unknown_feature_is_off() {
        let (engine, _) = engine_with(vec![flag("f", true, 100)]).await;
        let eval = engine.evaluate("missing", &FeatureContext::new()).await;
        assert!(!eval.enabled);
        assert_eq!(eval.reason, EvaluationReason::NotFound);
    }

    #[tokio::test]
    async fn lookup_by_name_matches_lookup_by_id() {
        let repo = Arc::new(InMemoryFlagRepository::new());
        let stored = repo.upsert(NewFeatureFlag::new("symptom_tracker", 30)).await;
        let cache = Arc::new(FlagCache::new(repo.clone(), FlagCacheConfig::default()));
        let engine = FeatureFlagEngine::new(cache);

        for i in 0..200 {
            let ctx = FeatureContext::new().with_user_id(format!("user-{i}"));
            assert_eq!(
                engine.is_enabled(&stored.id, &ctx).await,
                engine.is_enabled("symptom_tracker", &ctx).await
            );
        }
    }

    #[tokio::test]
    async fn anonymous_caller_is_admitted_at_partial_rollout() {
        let (engine, _) = engine_with(vec![flag("f", true, 1)]).await;
        let eval = engine.evaluate("f", &FeatureContext::new().with_role("guest")).await;
        assert!(eval.enabled);
        assert_eq!(eval.reason, EvaluationReason::AnonymousDefault);
    }

    #[tokio::test]
    async fn session_id_is_used_when_user_id_is_absent() {
        let (engine, _) = engine_with(vec![flag("f", true, 40)]).await;
        for i in 0..100 {
            let session = format!("sess-{i}");
            let eval = engine.evaluate("f", &FeatureContext::new().with_session_id(&session)).await;
            assert_eq!(eval.enabled, rollout::in_bucket(&session, "f", 40));
            assert_ne!(eval.reason, EvaluationReason::AnonymousDefault);
        }
    }

    #[tokio::test]
    async fn repository_outage_without_snapshot_turns_everything_off() {
        let (engine, repo) = engine_with(vec![flag("f", true, 100)]).await;
        repo.set_fail_reads(true);

        assert!(!engine.is_enabled("f", &FeatureContext::new()).await);
    }

    #[tokio::test]
    async fn evaluate_all_uses_flag_names() {
        let (engine, _) =
            engine_with(vec![flag("on_flag", true, 100), flag("off_flag", false, 100)]).await;

        let all = engine.evaluate_all(&FeatureContext::new()).await;
        assert_eq!(all.len(), 2);
        assert_eq!(all.get("on_flag"), Some(&true));
        assert_eq!(all.get("off_flag"), Some(&false));
    }
}
