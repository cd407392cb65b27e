//! SQLite connection pool and `users` schema.
use std::str::FromStr;

use sqlx::SqlitePool;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};

use crate::config;

const CREATE_USERS_TABLE: &str = r#"CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email VARCHAR(250) NOT NULL,
        hashed_password VARCHAR(250) NOT NULL,
        session_id VARCHAR(250),
        reset_token VARCHAR(250)
    )"#;
const DROP_USERS_TABLE: &str = "DROP TABLE IF EXISTS users";

/// Open a pool on the configured database and make sure the `users` table
/// exists.
pub async fn connect(config: &config::Database) -> Result<SqlitePool, sqlx::Error> {
    let options = if config.in_memory() {
        SqliteConnectOptions::from_str("sqlite::memory:")?
    } else {
        SqliteConnectOptions::new()
            .filename(&config.path)
            .create_if_missing(true)
    };
    // the store keeps a single session connection for its whole life, and
    // every connection to `:memory:` is a distinct database.
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .idle_timeout(None)
        .max_lifetime(None);

    let pool = pool.connect_with(options).await?;
    tracing::info!(path = %config.path, "sqlite connected");

    if config.reset_schema_on_start {
        tracing::warn!(path = %config.path, "dropping `users` table on start");
        sqlx::query(DROP_USERS_TABLE).execute(&pool).await?;
    }
    sqlx::query(CREATE_USERS_TABLE).execute(&pool).await?;

    Ok(pool)
}
