//! Targeting rule evaluation.
//!
//! Evaluation never fails outward: a missing attribute or a malformed
//! operand is a non-match for that rule only.

use cortex_domain::{FeatureContext, FeatureFlagRule, RuleOperator};
use thiserror::Error;
use tracing::debug;

/// Reasons a rule could not be evaluated.
#[derive(Debug, Error, PartialEq)]
pub enum RuleError {
    /// Operand or context value of a numeric comparison did not parse
    #[error("'{0}' is not a number")]
    NotNumeric(String),
}

/// Whether a single rule matches the context.
pub fn matches(rule: &FeatureFlagRule, context: &FeatureContext) -> bool {
    let Some(actual) = context.get(&rule.attribute) else {
        return false;
    };

    match compare(rule.operator, actual, &rule.value) {
        Ok(matched) => matched,
        Err(err) => {
            debug!(
                rule_id = %rule.id,
                attribute = %rule.attribute,
                operator = %rule.operator,
                error = %err,
                "rule evaluation failed, treating as non-match"
            );
            false
        }
    }
}

/// OR across `rules`. An empty rule list imposes no constraint.
pub fn any_match(rules: &[FeatureFlagRule], context: &FeatureContext) -> bool {
    rules.is_empty() || rules.iter().any(|rule| matches(rule, context))
}

/// Apply `operator` to a context value and a rule operand.
pub fn compare(operator: RuleOperator, actual: &str, operand: &str) -> Result<bool, RuleError> {
    let matched = match operator {
        RuleOperator::Equals => actual == operand,
        RuleOperator::NotEquals => actual != operand,
        RuleOperator::Contains => actual.contains(operand),
        RuleOperator::NotContains => !actual.contains(operand),
        RuleOperator::In => in_list(actual, operand),
        RuleOperator::NotIn => !in_list(actual, operand),
        RuleOperator::GreaterThan => parse_number(actual)? > parse_number(operand)?,
        RuleOperator::LessThan => parse_number(actual)? < parse_number(operand)?,
    };
    Ok(matched)
}

fn in_list(actual: &str, list: &str) -> bool {
    list.split(',').map(str::trim).any(|candidate| candidate == actual)
}

fn parse_number(raw: &str) -> Result<f64, RuleError> {
    raw.trim().parse::<f64>().map_err(|_| RuleError::NotNumeric(raw.to_string()))
}
