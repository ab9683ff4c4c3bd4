use std::sync::Arc;

use cortex_domain::FlagCacheConfig;
use cortex_infra::database::DbManager;
use cortex_infra::FeatureFlagService;
use tempfile::TempDir;

pub const TEST_DB_KEY: &str = "test_key_64_chars_long_aaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaaa";

/// Temporary encrypted database that keeps the underlying file alive for
/// the duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new migrated database keyed with [`TEST_DB_KEY`].
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("flags.db");

        let manager =
            DbManager::new(&db_path, 4, Some(TEST_DB_KEY)).expect("db manager should be created");
        manager.run_migrations().expect("migrations should succeed");

        Self { manager: Arc::new(manager), temp_dir }
    }

    pub fn path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("flags.db")
    }

    /// Service over this database with the default cache settings.
    pub fn service(&self) -> FeatureFlagService {
        FeatureFlagService::new(Arc::clone(&self.manager), FlagCacheConfig::default())
    }

    /// Execute a batch of SQL statements against the database.
    pub fn execute_batch(&self, sql: &str) {
        let conn = self
            .manager
            .get_connection()
            .expect("connection should be available for execute_batch");
        conn.execute_batch(sql).expect("SQL batch execution should succeed");
    }
}

impl Default for TestDatabase {
    fn default() -> Self {
        Self::new()
    }
}
