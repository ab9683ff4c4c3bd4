//! Application constants
//!
//! Centralized location for domain-level constants used by the flag engine.

// Flag cache configuration
pub const DEFAULT_FLAG_CACHE_TTL_SECS: u64 = 300;
pub const DEFAULT_FLAG_REFRESH_TIMEOUT_MS: u64 = 2_000;

// Rollout
pub const MAX_ROLLOUT_PERCENTAGE: u8 = 100;
pub const ROLLOUT_BUCKETS: u32 = 100;

// Well-known context attributes
pub const ATTR_USER_ID: &str = "userId";
pub const ATTR_SESSION_ID: &str = "sessionId";
pub const ATTR_ROLE: &str = "role";
pub const ATTR_COUNTRY: &str = "country";
pub const ATTR_DEVICE_TYPE: &str = "deviceType";
pub const ATTR_APP_VERSION: &str = "appVersion";

// Database defaults
pub const DEFAULT_DB_PATH: &str = "cortex.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 4;
