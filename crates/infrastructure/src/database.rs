use std::str::FromStr;

use caseforge_core::{AppError, AppResult};
use sqlx::SqlitePool;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Opens the SQLite store and brings the schema up to date.
///
/// The pool holds a single connection: the store is an embedded
/// single-process database and SQLite serializes writers anyway, so one
/// scoped connection per operation matches the storage engine's locking.
pub async fn connect_and_migrate(database_url: &str) -> AppResult<SqlitePool> {
    let options = SqliteConnectOptions::from_str(database_url)
        .map_err(|error| AppError::Storage(format!("invalid database url: {error}")))?
        .create_if_missing(true)
        .foreign_keys(true);

    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .map_err(|error| AppError::Storage(format!("failed to connect to database: {error}")))?;

    MIGRATOR
        .run(&pool)
        .await
        .map_err(|error| AppError::Storage(format!("failed to run migrations: {error}")))?;

    Ok(pool)
}
