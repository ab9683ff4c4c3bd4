//! Conversions from external infrastructure errors into domain errors.

use cortex_domain::CortexError;
use rusqlite::Error as SqlError;

/// Error newtype that keeps conversions on the infrastructure side and can be
/// converted back into the domain error.
#[derive(Debug)]
pub struct InfraError(pub CortexError);

impl From<InfraError> for CortexError {
    fn from(value: InfraError) -> Self {
        value.0
    }
}

impl From<CortexError> for InfraError {
    fn from(value: CortexError) -> Self {
        InfraError(value)
    }
}

/* -------------------------------------------------------------------------- */
/* rusqlite::Error → CortexError */
/* -------------------------------------------------------------------------- */

impl From<SqlError> for InfraError {
    fn from(value: SqlError) -> Self {
        use rusqlite::ffi::ErrorCode;
        use rusqlite::Error as RE;

        fn looks_like_wrong_key(message: &str) -> bool {
            let lower = message.to_ascii_lowercase();
            lower.contains("not a database") || lower.contains("encrypted")
        }

        let mapped = match value {
            RE::SqliteFailure(err, maybe_message) => {
                let message = maybe_message.unwrap_or_default();
                match (err.code, err.extended_code) {
                    (ErrorCode::DatabaseBusy, _) => CortexError::Database("database is busy".into()),
                    (ErrorCode::DatabaseLocked, _) => {
                        CortexError::Database("database is locked".into())
                    }
                    (ErrorCode::ConstraintViolation, 2067) => {
                        CortexError::InvalidInput("unique constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 275) => {
                        CortexError::InvalidInput("check constraint violation".into())
                    }
                    (ErrorCode::ConstraintViolation, 787) => {
                        CortexError::InvalidInput("foreign key constraint violation".into())
                    }
                    (_, _) if looks_like_wrong_key(&message) => CortexError::Config(
                        "SQLCipher key rejected or database not encrypted".into(),
                    ),
                    _ => CortexError::Database(format!(
                        "sqlite failure {:?} (code {}): {}",
                        err.code, err.extended_code, message
                    )),
                }
            }
            RE::QueryReturnedNoRows => CortexError::NotFound("no rows returned by query".into()),
            RE::FromSqlConversionFailure(_, _, cause) => {
                CortexError::Database(format!("failed to convert sqlite value: {cause}"))
            }
            RE::InvalidColumnType(_, _, ty) => {
                CortexError::Database(format!("invalid column type: {ty}"))
            }
            RE::InvalidPath(path) => {
                CortexError::Config(format!("invalid database path: {}", path.to_string_lossy()))
            }
            other => CortexError::Database(other.to_string()),
        };
        InfraError(mapped)
    }
}

/* -------------------------------------------------------------------------- */
/* r2d2::Error → CortexError */
/* -------------------------------------------------------------------------- */

impl From<r2d2::Error> for InfraError {
    fn from(value: r2d2::Error) -> Self {
        let message = value.to_string();
        if message.to_ascii_lowercase().contains("timed out") {
            InfraError(CortexError::Timeout(format!("connection pool: {message}")))
        } else {
            InfraError(CortexError::Database(format!("connection pool: {message}")))
        }
    }
}
