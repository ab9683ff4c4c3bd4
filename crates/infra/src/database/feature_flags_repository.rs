//! SQLite-backed feature flag repository.
//!
//! Implements the `FeatureFlagRepository` port. All database operations run
//! in `spawn_blocking` to avoid blocking the async runtime.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use cortex_core::FeatureFlagRepository;
use cortex_domain::{
    CortexError, FeatureFlag, FeatureFlagRule, NewFeatureFlag, NewFeatureFlagRule,
    Result as DomainResult, RuleOperator,
};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;
use tracing::warn;
use uuid::Uuid;

use super::manager::{map_sql_error, DbManager};

/// SQLite-backed feature flag repository.
pub struct SqliteFeatureFlagRepository {
    db: Arc<DbManager>,
}

impl SqliteFeatureFlagRepository {
    /// Create a new repository with the given database manager.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Run `op` on a pooled connection inside `spawn_blocking`.
    async fn with_connection<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&mut Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || {
            let mut conn = db.get_connection()?;
            op(&mut conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl FeatureFlagRepository for SqliteFeatureFlagRepository {
    async fn list_flags(&self) -> DomainResult<Vec<FeatureFlag>> {
        self.with_connection(|conn| query_all_flags(conn)).await
    }

    async fn get_flag(&self, key: &str) -> DomainResult<Option<FeatureFlag>> {
        let key = key.to_string();
        self.with_connection(move |conn| query_flag(conn, &key)).await
    }

    async fn upsert_flag(&self, flag: NewFeatureFlag) -> DomainResult<FeatureFlag> {
        self.with_connection(move |conn| upsert_flag(conn, flag)).await
    }

    async fn add_rule(
        &self,
        flag_key: &str,
        rule: NewFeatureFlagRule,
    ) -> DomainResult<FeatureFlagRule> {
        let flag_key = flag_key.to_string();
        self.with_connection(move |conn| insert_rule(conn, &flag_key, rule)).await
    }

    async fn delete_flag(&self, flag_key: &str) -> DomainResult<()> {
        let flag_key = flag_key.to_string();
        self.with_connection(move |conn| delete_flag(conn, &flag_key)).await
    }

    async fn delete_rule(&self, rule_id: &str) -> DomainResult<()> {
        let rule_id = rule_id.to_string();
        self.with_connection(move |conn| delete_rule(conn, &rule_id)).await
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

const FLAG_COLUMNS: &str =
    "id, name, description, enabled, percentage, created_at, updated_at";
const RULE_COLUMNS: &str = "id, feature_flag_id, attribute, operator, value";

/// All flags ordered by name, rules in insertion order.
fn query_all_flags(conn: &Connection) -> DomainResult<Vec<FeatureFlag>> {
    let mut stmt = conn
        .prepare(&format!("SELECT {FLAG_COLUMNS} FROM feature_flags ORDER BY name"))
        .map_err(map_sql_error)?;
    let mut flags = stmt
        .query_map(params![], flag_from_row)
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(map_sql_error)?;

    let mut rules_by_flag = query_rules(conn, None)?.into_iter().fold(
        HashMap::<String, Vec<FeatureFlagRule>>::new(),
        |mut acc, rule| {
            acc.entry(rule.feature_flag_id.clone()).or_default().push(rule);
            acc
        },
    );
    for flag in &mut flags {
        flag.rules = rules_by_flag.remove(&flag.id).unwrap_or_default();
    }
    Ok(flags)
}

/// Id of the flag `key` refers to. An id match wins over a name match.
fn resolve_flag_id(conn: &Connection, key: &str) -> DomainResult<Option<String>> {
    conn.query_row(
        "SELECT id FROM feature_flags WHERE id = ?1 OR name = ?1
         ORDER BY (id = ?1) DESC LIMIT 1",
        params![key],
        |row| row.get(0),
    )
    .optional()
    .map_err(map_sql_error)
}

/// A single flag looked up by id, falling back to name.
fn query_flag(conn: &Connection, key: &str) -> DomainResult<Option<FeatureFlag>> {
    let Some(id) = resolve_flag_id(conn, key)? else {
        return Ok(None);
    };
    let flag = conn
        .query_row(
            &format!("SELECT {FLAG_COLUMNS} FROM feature_flags WHERE id = ?1"),
            params![id],
            flag_from_row,
        )
        .optional()
        .map_err(map_sql_error)?;

    match flag {
        Some(mut flag) => {
            flag.rules = query_rules(conn, Some(flag.id.as_str()))?;
            Ok(Some(flag))
        }
        None => Ok(None),
    }
}

/// Rules for one flag, or for all flags when `flag_id` is `None`.
///
/// Rows with an operator this build does not know are skipped.
fn query_rules(conn: &Connection, flag_id: Option<&str>) -> DomainResult<Vec<FeatureFlagRule>> {
    let sql = format!(
        "SELECT {RULE_COLUMNS} FROM feature_flag_rules
         WHERE ?1 IS NULL OR feature_flag_id = ?1
         ORDER BY feature_flag_id, position"
    );
    let mut stmt = conn.prepare(&sql).map_err(map_sql_error)?;
    let rows = stmt
        .query_map(params![flag_id], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, String>(4)?,
            ))
        })
        .and_then(|rows| rows.collect::<rusqlite::Result<Vec<_>>>())
        .map_err(map_sql_error)?;

    let rules = rows
        .into_iter()
        .filter_map(|(id, feature_flag_id, attribute, operator, value)| {
            match operator.parse::<RuleOperator>() {
                Ok(operator) => Some(FeatureFlagRule { id, feature_flag_id, attribute, operator, value }),
                Err(err) => {
                    warn!(rule_id = %id, flag_id = %feature_flag_id, error = %err, "skipping rule with unknown operator");
                    None
                }
            }
        })
        .collect();
    Ok(rules)
}

/// Update the flag matched by id (or name when no id is given), inserting it
/// when nothing matches.
fn upsert_flag(conn: &mut Connection, input: NewFeatureFlag) -> DomainResult<FeatureFlag> {
    let now = Utc::now().timestamp_millis();
    let tx = conn.transaction().map_err(map_sql_error)?;

    let existing: Option<String> = match &input.id {
        Some(id) => tx.query_row("SELECT id FROM feature_flags WHERE id = ?1", params![id], |row| row.get(0)),
        None => tx.query_row("SELECT id FROM feature_flags WHERE name = ?1", params![input.name], |row| {
            row.get(0)
        }),
    }
    .optional()
    .map_err(map_sql_error)?;

    let id = match existing {
        Some(id) => {
            tx.execute(
                "UPDATE feature_flags
                 SET name = ?2, description = ?3, enabled = ?4, percentage = ?5, updated_at = ?6
                 WHERE id = ?1",
                params![id, input.name, input.description, input.enabled, input.percentage, now],
            )
            .map_err(map_sql_error)?;
            id
        }
        None => {
            let id = input.id.unwrap_or_else(|| Uuid::now_v7().to_string());
            tx.execute(
                "INSERT INTO feature_flags
                     (id, name, description, enabled, percentage, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                params![id, input.name, input.description, input.enabled, input.percentage, now],
            )
            .map_err(map_sql_error)?;
            id
        }
    };

    let flag = query_flag(&tx, &id)?
        .ok_or_else(|| CortexError::Internal(format!("feature flag '{id}' vanished after upsert")))?;
    tx.commit().map_err(map_sql_error)?;
    Ok(flag)
}

fn insert_rule(
    conn: &mut Connection,
    flag_key: &str,
    input: NewFeatureFlagRule,
) -> DomainResult<FeatureFlagRule> {
    let tx = conn.transaction().map_err(map_sql_error)?;

    let flag_id = resolve_flag_id(&tx, flag_key)?
        .ok_or_else(|| CortexError::NotFound(format!("feature flag '{flag_key}'")))?;

    let position: i64 = tx
        .query_row(
            "SELECT COALESCE(MAX(position) + 1, 0) FROM feature_flag_rules WHERE feature_flag_id = ?1",
            params![flag_id],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;

    let rule = FeatureFlagRule {
        id: Uuid::now_v7().to_string(),
        feature_flag_id: flag_id,
        attribute: input.attribute,
        operator: input.operator,
        value: input.value,
    };

    tx.execute(
        "INSERT INTO feature_flag_rules (id, feature_flag_id, attribute, operator, value, position)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![rule.id, rule.feature_flag_id, rule.attribute, rule.operator.as_str(), rule.value, position],
    )
    .map_err(map_sql_error)?;
    tx.execute(
        "UPDATE feature_flags SET updated_at = ?2 WHERE id = ?1",
        params![rule.feature_flag_id, Utc::now().timestamp_millis()],
    )
    .map_err(map_sql_error)?;

    tx.commit().map_err(map_sql_error)?;
    Ok(rule)
}

fn delete_flag(conn: &mut Connection, flag_key: &str) -> DomainResult<()> {
    let tx = conn.transaction().map_err(map_sql_error)?;
    let flag_id = resolve_flag_id(&tx, flag_key)?
        .ok_or_else(|| CortexError::NotFound(format!("feature flag '{flag_key}'")))?;

    tx.execute("DELETE FROM feature_flag_rules WHERE feature_flag_id = ?1", params![flag_id])
        .map_err(map_sql_error)?;
    tx.execute("DELETE FROM feature_flags WHERE id = ?1", params![flag_id])
        .map_err(map_sql_error)?;
    tx.commit().map_err(map_sql_error)
}

fn delete_rule(conn: &Connection, rule_id: &str) -> DomainResult<()> {
    let deleted = conn
        .execute("DELETE FROM feature_flag_rules WHERE id = ?1", params![rule_id])
        .map_err(map_sql_error)?;
    if deleted == 0 {
        return Err(CortexError::NotFound(format!("feature flag rule '{rule_id}'")));
    }
    Ok(())
}

fn flag_from_row(row: &Row<'_>) -> rusqlite::Result<FeatureFlag> {
    Ok(FeatureFlag {
        id: row.get(0)?,
        name: row.get(1)?,
        description: row.get(2)?,
        enabled: row.get(3)?,
        percentage: row.get(4)?,
        rules: Vec::new(),
        created_at: timestamp_at(row, 5)?,
        updated_at: timestamp_at(row, 6)?,
    })
}

/// Millisecond timestamp column; values chrono cannot represent are a
/// conversion failure rather than a silent epoch.
fn timestamp_at(row: &Row<'_>, index: usize) -> rusqlite::Result<DateTime<Utc>> {
    let millis: i64 = row.get(index)?;
    DateTime::from_timestamp_millis(millis).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            index,
            Type::Integer,
            format!("timestamp {millis}ms is out of range").into(),
        )
    })
}

// ============================================================================
// Error Mapping
// ============================================================================

/// Map JoinError from spawn_blocking to CortexError.
fn map_join_error(err: task::JoinError) -> CortexError {
    if err.is_cancelled() {
        CortexError::Internal("blocking task cancelled".into())
    } else {
        CortexError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
