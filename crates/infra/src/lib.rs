//! # Cortex Infrastructure
//!
//! Infrastructure implementations of core domain ports.
//!
//! This crate contains:
//! - SQLite/SQLCipher flag repository and connection pool
//! - Configuration loading from environment and files
//! - Logging initialisation
//! - The application-facing feature flag service
//!
//! ## Architecture
//! - Implements traits defined in `cortex-core`
//! - Contains all "impure" code (I/O, process-wide subscribers)

pub mod config;
pub mod database;
pub mod errors;
pub mod logging;
pub mod services;

// Re-export commonly used items
pub use database::*;
pub use errors::InfraError;
pub use services::FeatureFlagService;
