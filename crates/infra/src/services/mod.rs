//! Service layer implementations.
//!
//! Services wire repositories, the flag cache and the decision engine into
//! a single application-facing handle.

pub mod feature_flag_service;

pub use feature_flag_service::FeatureFlagService;
