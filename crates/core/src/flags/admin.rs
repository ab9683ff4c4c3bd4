//! Flag administration with write-through cache invalidation.
//!
//! Every successful mutation writes to the repository first and then drops
//! the cache snapshot, so the next evaluation observes the change. Failed
//! writes leave the cache untouched and return the repository error.
//! Reads (`get`, `list`) bypass the cache so administrators always see the
//! stored state.

use std::sync::Arc;

use cortex_domain::{FeatureFlag, FeatureFlagRule, NewFeatureFlag, NewFeatureFlagRule, Result};
use tracing::info;

use super::cache::FlagCache;
use crate::clock::{Clock, SystemClock};
use crate::feature_flags_ports::FeatureFlagRepository;

/// Mutations and uncached reads over the flag store.
pub struct FeatureFlagAdmin<C: Clock = SystemClock> {
    repository: Arc<dyn FeatureFlagRepository>,
    cache: Arc<FlagCache<C>>,
}

impl<C: Clock> FeatureFlagAdmin<C> {
    /// Admin surface writing to `repository` and invalidating `cache`.
    pub fn new(repository: Arc<dyn FeatureFlagRepository>, cache: Arc<FlagCache<C>>) -> Self {
        Self { repository, cache }
    }

    /// Create or update a flag.
    pub async fn upsert(&self, flag: NewFeatureFlag) -> Result<FeatureFlag> {
        flag.validate()?;
        let stored = self.repository.upsert_flag(flag).await?;
        self.cache.invalidate();

        info!(
            flag_id = %stored.id,
            flag_name = %stored.name,
            enabled = stored.enabled,
            percentage = stored.percentage,
            "feature flag upserted"
        );
        Ok(stored)
    }

    /// Attach a targeting rule to a flag (by id or name).
    pub async fn add_rule(&self, flag_key: &str, rule: NewFeatureFlagRule) -> Result<FeatureFlagRule> {
        rule.validate()?;
        let stored = self.repository.add_rule(flag_key, rule).await?;
        self.cache.invalidate();

        info!(
            flag_id = %stored.feature_flag_id,
            rule_id = %stored.id,
            attribute = %stored.attribute,
            operator = %stored.operator,
            "feature flag rule added"
        );
        Ok(stored)
    }

    /// Delete a flag and all of its rules.
    pub async fn delete(&self, flag_key: &str) -> Result<()> {
        self.repository.delete_flag(flag_key).await?;
        self.cache.invalidate();

        info!(flag = flag_key, "feature flag deleted");
        Ok(())
    }

    /// Remove a single rule.
    pub async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        self.repository.delete_rule(rule_id).await?;
        self.cache.invalidate();

        info!(rule_id, "feature flag rule deleted");
        Ok(())
    }

    /// Stored flag by id or name, bypassing the cache.
    pub async fn get(&self, flag_key: &str) -> Result<Option<FeatureFlag>> {
        self.repository.get_flag(flag_key).await
    }

    /// Every stored flag, bypassing the cache.
    pub async fn list(&self) -> Result<Vec<FeatureFlag>> {
        self.repository.list_flags().await
    }
}
