//! Per-evaluation request context.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::constants::{
    ATTR_APP_VERSION, ATTR_COUNTRY, ATTR_DEVICE_TYPE, ATTR_ROLE, ATTR_SESSION_ID, ATTR_USER_ID,
};

/// String-keyed attributes describing the caller of a flag check.
///
/// Any attribute name is accepted; the well-known ones have typed
/// accessors. Lives for a single evaluation and is never persisted.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureContext {
    attributes: HashMap<String, String>,
}

impl FeatureContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    #[must_use]
    pub fn with(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.insert(key, value);
        self
    }

    #[must_use]
    pub fn with_user_id(self, user_id: impl Into<String>) -> Self {
        self.with(ATTR_USER_ID, user_id)
    }

    #[must_use]
    pub fn with_session_id(self, session_id: impl Into<String>) -> Self {
        self.with(ATTR_SESSION_ID, session_id)
    }

    #[must_use]
    pub fn with_role(self, role: impl Into<String>) -> Self {
        self.with(ATTR_ROLE, role)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) -> Option<String> {
        self.attributes.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.attributes.get(key).map(String::as_str)
    }

    pub fn user_id(&self) -> Option<&str> {
        self.get(ATTR_USER_ID)
    }

    pub fn session_id(&self) -> Option<&str> {
        self.get(ATTR_SESSION_ID)
    }

    pub fn role(&self) -> Option<&str> {
        self.get(ATTR_ROLE)
    }

    pub fn country(&self) -> Option<&str> {
        self.get(ATTR_COUNTRY)
    }

    pub fn device_type(&self) -> Option<&str> {
        self.get(ATTR_DEVICE_TYPE)
    }

    pub fn app_version(&self) -> Option<&str> {
        self.get(ATTR_APP_VERSION)
    }

    /// Identity used for rollout bucketing: `userId`, else `sessionId`.
    pub fn rollout_identity(&self) -> Option<&str> {
        self.user_id().or_else(|| self.session_id())
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

impl<K, V> FromIterator<(K, V)> for FeatureContext
where
    K: Into<String>,
    V: Into<String>,
{
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self { attributes: iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect() }
    }
}

impl From<HashMap<String, String>> for FeatureContext {
    fn from(attributes: HashMap<String, String>) -> Self {
        Self { attributes }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rollout_identity_prefers_user_over_session() {
        let ctx = FeatureContext::new().with_session_id("s-1").with_user_id("u-1");
        assert_eq!(ctx.rollout_identity(), Some("u-1"));

        let anonymous = FeatureContext::new().with_session_id("s-1");
        assert_eq!(anonymous.rollout_identity(), Some("s-1"));

        assert_eq!(FeatureContext::new().rollout_identity(), None);
    }

    #[test]
    fn arbitrary_attributes_are_kept() {
        let ctx: FeatureContext = [("clinic", "north"), ("country", "NL")].into_iter().collect();
        assert_eq!(ctx.get("clinic"), Some("north"));
        assert_eq!(ctx.country(), Some("NL"));
        assert_eq!(ctx.get("missing"), None);
        assert_eq!(ctx.len(), 2);
    }

    #[test]
    fn deserializes_from_plain_object() {
        let ctx: FeatureContext =
            serde_json::from_str(r#"{"userId":"u-9","deviceType":"tablet"}"#).unwrap();
        assert_eq!(ctx.user_id(), Some("u-9"));
        assert_eq!(ctx.device_type(), Some("tablet"));
    }
}
