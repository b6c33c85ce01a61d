//! Database migrations and initialization.

use crate::domain::Wholesaler;
use sqlx::sqlite::{SqliteConnection, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use tracing::info;

const SHARED_SCHEMA: &str = include_str!("schema.sql");
const CHANNEL_SCHEMA: &str = include_str!("channel_schema.sql");

/// Initialize the SQLite database with schema and pragmas.
pub async fn init_db(db_path: &str) -> Result<SqlitePool, sqlx::Error> {
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).ok();
        }
    }

    let pool = SqlitePoolOptions::new()
        .max_connections(5)
        .after_connect(|conn, _meta| Box::pin(async move { configure_pragmas_conn(conn).await }))
        .connect(&format!("sqlite:{}?mode=rwc", db_path))
        .await?;

    run_migrations(&pool).await?;

    info!("Database initialized successfully at {}", db_path);
    Ok(pool)
}

/// Schema statements for one channel's table set.
pub fn channel_statements(channel: Wholesaler) -> Vec<String> {
    split_statements(&CHANNEL_SCHEMA.replace("{prefix}", channel.table_prefix()))
}

fn split_statements(sql: &str) -> Vec<String> {
    sql.split(';')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// Run all database migrations: shared tables, then one table set per channel.
async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    info!("Running database migrations...");

    for statement in split_statements(SHARED_SCHEMA) {
        sqlx::query(&statement).execute(pool).await?;
    }

    for channel in Wholesaler::ALL {
        for statement in channel_statements(channel) {
            sqlx::query(&statement).execute(pool).await?;
        }
        info!(channel = %channel, "Channel tables ready");
    }

    info!("Migrations completed successfully");
    Ok(())
}

/// Configure SQLite pragmas for optimal performance and reliability.
async fn configure_pragmas_conn(conn: &mut SqliteConnection) -> Result<(), sqlx::Error> {
    use sqlx::Row;

    sqlx::query("PRAGMA foreign_keys = ON")
        .execute(&mut *conn)
        .await?;

    // journal_mode returns the actual mode set; must use fetch to get result
    let row = sqlx::query("PRAGMA journal_mode = WAL")
        .fetch_one(&mut *conn)
        .await?;
    let journal_mode: String = row.get(0);
    tracing::debug!("SQLite journal_mode set to: {}", journal_mode);

    sqlx::query("PRAGMA busy_timeout = 5000")
        .execute(&mut *conn)
        .await?;
    sqlx::query("PRAGMA synchronous = NORMAL")
        .execute(&mut *conn)
        .await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    async fn temp_pool() -> (SqlitePool, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir
            .path()
            .join("test.db")
            .to_string_lossy()
            .to_string();
        let pool = init_db(&db_path).await.expect("init_db failed");
        (pool, temp_dir)
    }

    #[test]
    fn test_channel_statements_are_prefixed() {
        let statements = channel_statements(Wholesaler::Temairazu);
        assert!(statements.iter().all(|s| !s.contains("{prefix}")));
        assert!(statements
            .iter()
            .any(|s| s.contains("CREATE TABLE IF NOT EXISTS temairazu_stocks")));
    }

    #[tokio::test]
    async fn test_migrations_create_channel_tables() {
        let (pool, _temp) = temp_pool().await;

        for channel in Wholesaler::ALL {
            let tables = channel.tables();
            for name in [
                &tables.room_types,
                &tables.plans,
                &tables.stocks,
                &tables.prices,
                &tables.bookings,
            ] {
                let result: (String,) = sqlx::query_as(
                    "SELECT name FROM sqlite_master WHERE type='table' AND name = ?",
                )
                .bind(name)
                .fetch_one(&pool)
                .await
                .expect("table missing");
                assert_eq!(&result.0, name);
            }
        }
    }

    #[tokio::test]
    async fn test_migrations_idempotent() {
        let (pool, _temp) = temp_pool().await;

        run_migrations(&pool)
            .await
            .expect("second migration run failed");

        let result: (i64,) = sqlx::query_as("SELECT value FROM sequences WHERE name = 'plan_group'")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 0);
    }

    #[tokio::test]
    async fn test_pragmas_configured() {
        let (pool, _temp) = temp_pool().await;

        let result: (i64,) = sqlx::query_as("PRAGMA foreign_keys")
            .fetch_one(&pool)
            .await
            .expect("query failed");
        assert_eq!(result.0, 1);
    }

    #[tokio::test]
    async fn test_stock_check_constraint_rejects_drift() {
        let (pool, _temp) = temp_pool().await;
        sqlx::query(
            "INSERT INTO tl_room_types (property_id, code, name, created_at, updated_at) VALUES (1, 'STD', 'Standard', 0, 0)",
        )
        .execute(&pool)
        .await
        .unwrap();

        let err = sqlx::query(
            "INSERT INTO tl_stocks (room_type_id, use_date, room_count, booking_count, stock, updated_at) VALUES (1, '2024-06-01', 5, 2, 5, 0)",
        )
        .execute(&pool)
        .await;
        assert!(err.is_err());
    }
}
