//! Feature flag service backed by SQLite.
//!
//! Owns one [`FlagCache`] shared by the decision engine and the
//! administration surface, so every successful mutation is visible to the
//! next evaluation in this process.
//!
//! # Caching Strategy
//!
//! - **Snapshot**: the whole flag set is loaded at once and reused until the
//!   TTL expires
//! - **Stale fallback**: a failed or slow refresh keeps serving the previous
//!   snapshot
//! - **Write-through invalidation**: update DB, then drop the snapshot
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cortex_domain::{FeatureContext, FlagCacheConfig, NewFeatureFlag};
//! use cortex_infra::database::DbManager;
//! use cortex_infra::services::FeatureFlagService;
//!
//! # async fn example() -> cortex_domain::Result<()> {
//! let db = Arc::new(DbManager::new("cortex.db", 4, None)?);
//! db.run_migrations()?;
//! let service = FeatureFlagService::new(db, FlagCacheConfig::default());
//!
//! service.upsert(NewFeatureFlag::new("brain_games", 25)).await?;
//!
//! let ctx = FeatureContext::new().with_user_id("patient-42");
//! if service.is_enabled("brain_games", &ctx).await {
//!     // serve the new game flow
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::BTreeMap;
use std::sync::Arc;

use cortex_core::{CacheStats, FeatureFlagAdmin, FeatureFlagEngine, FeatureFlagRepository, FlagCache};
use cortex_domain::{
    Config, FeatureContext, FeatureFlag, FeatureFlagEvaluation, FeatureFlagRule, FlagCacheConfig,
    NewFeatureFlag, NewFeatureFlagRule, Result,
};
use tracing::info;

use crate::database::{DbManager, SqliteFeatureFlagRepository};

/// Application-facing handle for evaluating and managing feature flags.
///
/// Cheap to share behind an `Arc`; the engine and admin halves hold the same
/// cache.
pub struct FeatureFlagService {
    cache: Arc<FlagCache>,
    engine: FeatureFlagEngine,
    admin: FeatureFlagAdmin,
}

impl FeatureFlagService {
    /// Create a service over an already-migrated database.
    pub fn new(db: Arc<DbManager>, config: FlagCacheConfig) -> Self {
        Self::with_repository(Arc::new(SqliteFeatureFlagRepository::new(db)), config)
    }

    /// Create a service over any repository implementation.
    pub fn with_repository(repository: Arc<dyn FeatureFlagRepository>, config: FlagCacheConfig) -> Self {
        let cache = Arc::new(FlagCache::new(Arc::clone(&repository), config));
        Self {
            engine: FeatureFlagEngine::new(Arc::clone(&cache)),
            admin: FeatureFlagAdmin::new(repository, Arc::clone(&cache)),
            cache,
        }
    }

    /// Open the configured database, apply migrations and build the service.
    ///
    /// # Errors
    /// Returns an error if the pool cannot be created or migrations fail.
    pub fn from_config(config: &Config) -> Result<Self> {
        let db = Arc::new(DbManager::from_config(&config.database)?);
        db.run_migrations()?;

        info!(
            db_path = %db.path().display(),
            ttl_secs = config.flags.ttl_seconds,
            refresh_timeout_ms = config.flags.refresh_timeout_ms,
            "feature flag service ready"
        );
        Ok(Self::new(db, config.flags))
    }

    /// The underlying engine, for callers that only evaluate.
    pub fn engine(&self) -> &FeatureFlagEngine {
        &self.engine
    }

    /// Whether the flag is on for `context`; never fails.
    pub async fn is_enabled(&self, feature_id: &str, context: &FeatureContext) -> bool {
        self.engine.is_enabled(feature_id, context).await
    }

    /// Decision plus the step that produced it.
    pub async fn evaluate(&self, feature_id: &str, context: &FeatureContext) -> FeatureFlagEvaluation {
        self.engine.evaluate(feature_id, context).await
    }

    /// Every known flag against one snapshot, keyed by name.
    pub async fn evaluate_all(&self, context: &FeatureContext) -> BTreeMap<String, bool> {
        self.engine.evaluate_all(context).await
    }

    /// Create or update a flag, then invalidate the cache.
    pub async fn upsert(&self, flag: NewFeatureFlag) -> Result<FeatureFlag> {
        self.admin.upsert(flag).await
    }

    /// Attach a rule to a flag, then invalidate the cache.
    pub async fn add_rule(&self, flag_key: &str, rule: NewFeatureFlagRule) -> Result<FeatureFlagRule> {
        self.admin.add_rule(flag_key, rule).await
    }

    /// Delete a flag and its rules, then invalidate the cache.
    pub async fn delete(&self, flag_key: &str) -> Result<()> {
        self.admin.delete(flag_key).await
    }

    /// Remove one rule, then invalidate the cache.
    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        self.admin.delete_rule(rule_id).await
    }

    /// Stored state of one flag, bypassing the cache.
    pub async fn get(&self, flag_key: &str) -> Result<Option<FeatureFlag>> {
        self.admin.get(flag_key).await
    }

    /// Every stored flag, bypassing the cache.
    pub async fn list(&self) -> Result<Vec<FeatureFlag>> {
        self.admin.list().await
    }

    /// Drop the cached snapshot so the next evaluation reloads from storage.
    ///
    /// Needed after out-of-band writes (another process, manual SQL).
    pub fn invalidate_cache(&self) {
        self.cache.invalidate();
    }

    /// Cache counters since construction.
    pub fn cache_stats(&self) -> CacheStats {
        self.cache.stats()
    }
}

#[cfg(test)]
mod tests {
    use cortex_core::testing::InMemoryFlagRepository;
    use cortex_domain::{EvaluationReason, RuleOperator};
    use tempfile::TempDir;

    use super::*;

    fn sqlite_service() -> (FeatureFlagService, TempDir) {
        let dir = TempDir::new().expect("temp dir");
        let db = Arc::new(DbManager::new(dir.path().join("flags.db"), 2, None).expect("pool"));
        db.run_migrations().expect("migrations");
        (FeatureFlagService::new(db, FlagCacheConfig::default()), dir)
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn evaluates_flags_stored_in_sqlite() {
        let (service, _dir) = sqlite_service();
        service.upsert(NewFeatureFlag::new("caregiver_view", 100)).await.unwrap();
        service
            .add_rule("caregiver_view", NewFeatureFlagRule::new("role", RuleOperator::Equals, "caregiver"))
            .await
            .unwrap();

        let caregiver = FeatureContext::new().with_role("caregiver");
        let eval = service.evaluate("caregiver_view", &caregiver).await;
        assert!(eval.enabled);
        assert_eq!(eval.reason, EvaluationReason::FullRollout);
        assert!(!service.is_enabled("caregiver_view", &FeatureContext::new()).await);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn out_of_band_write_needs_invalidation() {
        let repo = Arc::new(InMemoryFlagRepository::new());
        let service = FeatureFlagService::with_repository(repo.clone(), FlagCacheConfig::default());
        let ctx = FeatureContext::new();

        repo.upsert(NewFeatureFlag::new("sleep_diary", 100)).await;
        assert!(service.is_enabled("sleep_diary", &ctx).await);

        let mut off = NewFeatureFlag::new("sleep_diary", 100);
        off.enabled = false;
        repo.upsert(off).await;
        assert!(service.is_enabled("sleep_diary", &ctx).await);

        service.invalidate_cache();
        assert!(!service.is_enabled("sleep_diary", &ctx).await);
        assert_eq!(service.cache_stats().invalidations, 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn from_config_creates_schema() {
        let dir = TempDir::new().expect("temp dir");
        let mut config = Config::default();
        config.database.path = dir.path().join("cortex.db").to_string_lossy().into_owned();

        let service = FeatureFlagService::from_config(&config).expect("service");
        assert!(service.list().await.unwrap().is_empty());
        assert_eq!(service.evaluate_all(&FeatureContext::new()).await.len(), 0);
    }
}
