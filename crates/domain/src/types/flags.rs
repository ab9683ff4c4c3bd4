//! Feature flag and targeting rule definitions.
//!
//! Values of these types are immutable once they are part of a cache
//! snapshot; changes go through the administration inputs at the bottom of
//! this module.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::MAX_ROLLOUT_PERCENTAGE;
use crate::errors::{CortexError, Result};
use crate::impl_domain_enum_conversions;

/// A named, independently toggleable unit of behaviour.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlag {
    /// Stable identifier
    pub id: String,
    /// Human-readable unique name, also accepted as a lookup key
    pub name: String,
    pub description: String,
    /// Master switch; `false` wins over rules and percentage
    pub enabled: bool,
    /// Share of eligible traffic admitted, `0..=100`
    pub percentage: u8,
    /// Targeting rules, OR-ed together
    #[serde(default)]
    pub rules: Vec<FeatureFlagRule>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl FeatureFlag {
    /// Position of the flag `key` refers to. An id match wins over a name
    /// match, so a name that equals another flag's id never shadows it.
    pub fn position_in(flags: &[Self], key: &str) -> Option<usize> {
        flags
            .iter()
            .position(|flag| flag.id == key)
            .or_else(|| flags.iter().position(|flag| flag.name == key))
    }

    /// The flag `key` refers to, resolved as in [`position_in`](Self::position_in).
    pub fn find_in<'a>(flags: &'a [Self], key: &str) -> Option<&'a Self> {
        Self::position_in(flags, key).and_then(|index| flags.get(index))
    }
}

/// Attribute-based targeting predicate attached to a flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureFlagRule {
    pub id: String,
    pub feature_flag_id: String,
    /// Context key to read, e.g. `role`
    pub attribute: String,
    pub operator: RuleOperator,
    /// Operand. Comma-separated for `in`/`not_in`, numeric for comparisons.
    pub value: String,
}

/// Comparison applied between a context value and a rule operand.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOperator {
    Equals,
    NotEquals,
    Contains,
    NotContains,
    In,
    NotIn,
    GreaterThan,
    LessThan,
}

impl_domain_enum_conversions!(RuleOperator {
    Equals => "equals",
    NotEquals => "not_equals",
    Contains => "contains",
    NotContains => "not_contains",
    In => "in",
    NotIn => "not_in",
    GreaterThan => "greater_than",
    LessThan => "less_than",
});

/// Input for creating or replacing a flag.
///
/// When `id` is set the flag with that id is updated; otherwise the flag is
/// matched by `name`, and a new one is created if none exists. Rules are
/// managed separately and survive an upsert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeatureFlag {
    #[serde(default)]
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub enabled: bool,
    pub percentage: u8,
}

impl NewFeatureFlag {
    /// Convenience constructor for an enabled flag.
    pub fn new(name: impl Into<String>, percentage: u8) -> Self {
        Self { id: None, name: name.into(), description: String::new(), enabled: true, percentage }
    }

    /// Check invariants before anything is written.
    pub fn validate(&self) -> Result<()> {
        if self.name.trim().is_empty() {
            return Err(CortexError::InvalidInput("flag name must not be empty".into()));
        }
        if self.percentage > MAX_ROLLOUT_PERCENTAGE {
            return Err(CortexError::InvalidInput(format!(
                "percentage must be within 0..={MAX_ROLLOUT_PERCENTAGE}, got {}",
                self.percentage
            )));
        }
        Ok(())
    }
}

/// Input for attaching a rule to an existing flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewFeatureFlagRule {
    pub attribute: String,
    pub operator: RuleOperator,
    pub value: String,
}

impl NewFeatureFlagRule {
    pub fn new(attribute: impl Into<String>, operator: RuleOperator, value: impl Into<String>) -> Self {
        Self { attribute: attribute.into(), operator, value: value.into() }
    }

    pub fn validate(&self) -> Result<()> {
        if self.attribute.trim().is_empty() {
            return Err(CortexError::InvalidInput("rule attribute must not be empty".into()));
        }
        Ok(())
    }
}
