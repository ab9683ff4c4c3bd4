//! Feature flag storage port.
//!
//! The decision engine only ever calls [`FeatureFlagRepository::list_flags`]
//! (through the cache). Everything else is used by the administration
//! service.
//!
//! # Example
//!
//! ```no_run
//! use cortex_core::FeatureFlagRepository;
//!
//! async fn count_flags(repo: &dyn FeatureFlagRepository) -> usize {
//!     repo.list_flags().await.map(|flags| flags.len()).unwrap_or(0)
//! }
//! ```

use async_trait::async_trait;
use cortex_domain::{FeatureFlag, FeatureFlagRule, NewFeatureFlag, NewFeatureFlagRule, Result};

/// Persistent store of flag and rule definitions.
///
/// Lookups by `key` accept either the flag id or its name.
#[async_trait]
pub trait FeatureFlagRepository: Send + Sync {
    /// List every flag with its rules, rules in insertion order.
    async fn list_flags(&self) -> Result<Vec<FeatureFlag>>;

    /// Fetch a single flag by id or name.
    async fn get_flag(&self, key: &str) -> Result<Option<FeatureFlag>>;

    /// Create or update a flag. Existing rules are preserved.
    async fn upsert_flag(&self, flag: NewFeatureFlag) -> Result<FeatureFlag>;

    /// Attach a rule to the flag identified by `flag_key`.
    ///
    /// Returns `CortexError::NotFound` if the flag does not exist.
    async fn add_rule(&self, flag_key: &str, rule: NewFeatureFlagRule) -> Result<FeatureFlagRule>;

    /// Delete a flag and its rules.
    ///
    /// Returns `CortexError::NotFound` if the flag does not exist.
    async fn delete_flag(&self, flag_key: &str) -> Result<()>;

    /// Delete a single rule.
    ///
    /// Returns `CortexError::NotFound` if the rule does not exist.
    async fn delete_rule(&self, rule_id: &str) -> Result<()>;
}
