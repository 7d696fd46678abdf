//! Idempotent schema setup, safe to run on every startup.

use anyhow::Context;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use tracing::{debug, info};

use crate::config::DatabaseConfig;

const CREATE_USERS: &str = r#"
CREATE TABLE IF NOT EXISTS users (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    username TEXT UNIQUE NOT NULL,
    password_hash TEXT NOT NULL,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP
)
"#;

const CREATE_STORES: &str = r#"
CREATE TABLE IF NOT EXISTS stores (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    user_id INTEGER,
    name TEXT NOT NULL,
    address TEXT NOT NULL,
    road_address TEXT,
    lot_address TEXT,
    latitude REAL NOT NULL,
    longitude REAL NOT NULL,
    phone TEXT,
    category TEXT,
    description TEXT,
    created_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    updated_at DATETIME DEFAULT CURRENT_TIMESTAMP,
    FOREIGN KEY (user_id) REFERENCES users(id)
)
"#;

// Columns introduced after the initial schema. Each ALTER is attempted on
// every startup; databases that already have the column report a duplicate,
// which is swallowed below.
const ADD_COLUMNS: &[&str] = &[
    "ALTER TABLE users ADD COLUMN email TEXT",
    "ALTER TABLE users ADD COLUMN is_temp_password INTEGER DEFAULT 0",
    "ALTER TABLE users ADD COLUMN name TEXT",
    "ALTER TABLE users ADD COLUMN role TEXT NOT NULL DEFAULT 'standard'",
    "ALTER TABLE stores ADD COLUMN road_address TEXT",
    "ALTER TABLE stores ADD COLUMN lot_address TEXT",
    "ALTER TABLE stores ADD COLUMN user_id INTEGER",
    "ALTER TABLE stores ADD COLUMN email TEXT",
];

/// Open (creating if necessary) the database and bring its schema up to
/// date. Called exactly once at process start; any table-creation failure
/// aborts startup.
pub async fn initialize(config: &DatabaseConfig) -> anyhow::Result<SqlitePool> {
    if !config.dir.exists() {
        std::fs::create_dir_all(&config.dir)
            .with_context(|| format!("create database directory {}", config.dir.display()))?;
        info!(dir = %config.dir.display(), "created database directory");
    }

    let options = SqliteConnectOptions::new()
        .filename(&config.path)
        .create_if_missing(true);
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect_with(options)
        .await
        .context("connect to database")?;

    apply(&pool).await?;
    info!(path = %config.path.display(), "database ready");
    Ok(pool)
}

/// Run the DDL against an existing pool. Idempotent.
pub async fn apply(db: &SqlitePool) -> anyhow::Result<()> {
    sqlx::query(CREATE_USERS)
        .execute(db)
        .await
        .context("create users table")?;
    sqlx::query(CREATE_STORES)
        .execute(db)
        .await
        .context("create stores table")?;

    for ddl in ADD_COLUMNS {
        add_column(db, ddl).await?;
    }
    Ok(())
}

async fn add_column(db: &SqlitePool, ddl: &str) -> anyhow::Result<()> {
    match sqlx::query(ddl).execute(db).await {
        Ok(_) => Ok(()),
        Err(sqlx::Error::Database(e)) if e.message().contains("duplicate column name") => {
            debug!(ddl, "column already present");
            Ok(())
        }
        Err(e) => Err(anyhow::Error::new(e).context(format!("migration failed: {ddl}"))),
    }
}
