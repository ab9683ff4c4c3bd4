//! Feature flag targeting and rollout.
//!
//! Data flow: caller → [`FeatureFlagEngine`] → [`FlagCache`] (fetch or
//! refresh) → [`rules`] → [`rollout`] → boolean. Administration writes go
//! through [`FeatureFlagAdmin`], which invalidates the cache after every
//! successful mutation.

pub mod admin;
pub mod cache;
pub mod engine;
pub mod rollout;
pub mod rules;

pub use admin::FeatureFlagAdmin;
pub use cache::{CacheStats, CachedFlags, FlagCache, SnapshotState};
pub use engine::FeatureFlagEngine;
