//! Database implementations

pub mod feature_flags_repository;
pub mod manager;

pub use feature_flags_repository::*;
pub use manager::*;
