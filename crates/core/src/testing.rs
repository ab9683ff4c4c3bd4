//! In-memory repository for tests.
//!
//! Supports failure injection and artificial latency so cache fallback and
//! timeout paths can be exercised without a database.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use cortex_domain::{
    CortexError, FeatureFlag, FeatureFlagRule, NewFeatureFlag, NewFeatureFlagRule, Result,
};
use parking_lot::{Mutex, RwLock};
use uuid::Uuid;

use crate::feature_flags_ports::FeatureFlagRepository;

/// Vec-backed [`FeatureFlagRepository`].
#[derive(Debug, Default)]
pub struct InMemoryFlagRepository {
    flags: RwLock<Vec<FeatureFlag>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    read_delay: Mutex<Option<Duration>>,
    list_calls: AtomicUsize,
}

impl InMemoryFlagRepository {
    /// Empty repository with no injected faults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or update a flag directly, bypassing failure injection.
    pub async fn upsert(&self, flag: NewFeatureFlag) -> FeatureFlag {
        self.apply_upsert(flag)
    }

    /// Attach a rule directly, bypassing failure injection.
    pub async fn add(&self, flag_key: &str, rule: NewFeatureFlagRule) -> Option<FeatureFlagRule> {
        self.apply_add_rule(flag_key, rule).ok()
    }

    /// Make every read return a database error.
    pub fn set_fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    /// Make every mutation return a database error.
    pub fn set_fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Sleep before answering `list_flags`.
    pub fn set_read_delay(&self, delay: Duration) {
        *self.read_delay.lock() = Some(delay);
    }

    /// Number of `list_flags` calls made so far.
    pub fn list_calls(&self) -> usize {
        self.list_calls.load(Ordering::SeqCst)
    }

    fn check_writes(&self) -> Result<()> {
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(CortexError::Database("injected write failure".into()));
        }
        Ok(())
    }

    fn apply_upsert(&self, input: NewFeatureFlag) -> FeatureFlag {
        let now = Utc::now();
        let mut flags = self.flags.write();
        let existing = flags.iter_mut().find(|flag| match &input.id {
            Some(id) => &flag.id == id,
            None => flag.name == input.name,
        });

        if let Some(flag) = existing {
            flag.name = input.name;
            flag.description = input.description;
            flag.enabled = input.enabled;
            flag.percentage = input.percentage;
            flag.updated_at = now;
            return flag.clone();
        }

        let flag = FeatureFlag {
            id: input.id.unwrap_or_else(|| Uuid::now_v7().to_string()),
            name: input.name,
            description: input.description,
            enabled: input.enabled,
            percentage: input.percentage,
            rules: Vec::new(),
            created_at: now,
            updated_at: now,
        };
        flags.push(flag.clone());
        flag
    }

    fn apply_add_rule(&self, flag_key: &str, input: NewFeatureFlagRule) -> Result<FeatureFlagRule> {
        let mut flags = self.flags.write();
        let index = FeatureFlag::position_in(&flags, flag_key)
            .ok_or_else(|| CortexError::NotFound(format!("feature flag '{flag_key}'")))?;
        let flag = &mut flags[index];

        let rule = FeatureFlagRule {
            id: Uuid::now_v7().to_string(),
            feature_flag_id: flag.id.clone(),
            attribute: input.attribute,
            operator: input.operator,
            value: input.value,
        };
        flag.rules.push(rule.clone());
        flag.updated_at = Utc::now();
        Ok(rule)
    }
}

#[async_trait]
impl FeatureFlagRepository for InMemoryFlagRepository {
    async fn list_flags(&self) -> Result<Vec<FeatureFlag>> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.read_delay.lock();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CortexError::Database("injected read failure".into()));
        }
        let mut flags = self.flags.read().clone();
        flags.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(flags)
    }

    async fn get_flag(&self, key: &str) -> Result<Option<FeatureFlag>> {
        if self.fail_reads.load(Ordering::SeqCst) {
            return Err(CortexError::Database("injected read failure".into()));
        }
        Ok(FeatureFlag::find_in(&self.flags.read(), key).cloned())
    }

    async fn upsert_flag(&self, flag: NewFeatureFlag) -> Result<FeatureFlag> {
        self.check_writes()?;
        Ok(self.apply_upsert(flag))
    }

    async fn add_rule(&self, flag_key: &str, rule: NewFeatureFlagRule) -> Result<FeatureFlagRule> {
        self.check_writes()?;
        self.apply_add_rule(flag_key, rule)
    }

    async fn delete_flag(&self, flag_key: &str) -> Result<()> {
        self.check_writes()?;
        let mut flags = self.flags.write();
        let index = FeatureFlag::position_in(&flags, flag_key)
            .ok_or_else(|| CortexError::NotFound(format!("feature flag '{flag_key}'")))?;
        flags.remove(index);
        Ok(())
    }

    async fn delete_rule(&self, rule_id: &str) -> Result<()> {
        self.check_writes()?;
        let mut flags = self.flags.write();
        for flag in flags.iter_mut() {
            if let Some(index) = flag.rules.iter().position(|rule| rule.id == rule_id) {
                flag.rules.remove(index);
                return Ok(());
            }
        }
        Err(CortexError::NotFound(format!("feature flag rule '{rule_id}'")))
    }
}
