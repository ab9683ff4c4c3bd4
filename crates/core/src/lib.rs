//! # Cortex Core
//!
//! Pure decision logic for feature flags - no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces (traits) for flag storage and time
//! - Rule evaluation and rollout bucketing
//! - The snapshot cache, decision engine and administration service
//!
//! ## Architecture Principles
//! - Only depends on `cortex-domain`
//! - No database, HTTP, or platform code
//! - All external dependencies via traits
//! - Pure, testable business logic

pub mod clock;
pub mod feature_flags_ports;
pub mod flags;

#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

pub use clock::{Clock, MockClock, SystemClock};
pub use feature_flags_ports::FeatureFlagRepository;
pub use flags::{
    CacheStats, CachedFlags, FeatureFlagAdmin, FeatureFlagEngine, FlagCache, SnapshotState,
};
