use crate::application::repos::RepoError;

/// Translate driver errors into repository errors, keyed on Postgres error class.
pub fn map_sqlx_error(err: sqlx::Error) -> RepoError {
    match err {
        sqlx::Error::RowNotFound => RepoError::NotFound,
        sqlx::Error::PoolTimedOut => RepoError::Timeout,
        sqlx::Error::Database(db) if db.is_unique_violation() => RepoError::Duplicate {
            constraint: db.constraint().unwrap_or("unknown").to_string(),
        },
        sqlx::Error::Database(db)
            if db.is_foreign_key_violation() || db.code().as_deref() == Some("22P02") =>
        {
            RepoError::InvalidInput {
                message: db.message().to_string(),
            }
        }
        sqlx::Error::Database(db) if db.is_check_violation() => RepoError::Integrity {
            message: db.message().to_string(),
        },
        // query_canceled, raised by statement_timeout
        sqlx::Error::Database(db) if db.code().as_deref() == Some("57014") => RepoError::Timeout,
        other => RepoError::from_persistence(other),
    }
}
