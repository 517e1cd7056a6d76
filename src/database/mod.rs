//! Database operations and data access layer.
//!
//! This module provides a repository pattern for database operations,
//! separating database concerns from business logic. Every call opens its own
//! SQLite connection on the blocking pool; SQLite serializes writers and the
//! busy timeout absorbs contention between roll commits and the sweeper.

mod rolls;
mod usage;
mod users;

pub use rolls::{count_by_rarity, RollEvent, RollLedger};
pub use usage::UsageLog;
pub use users::{UserRecord, UserRepository};

pub(crate) use rolls::append_roll;

use chrono::{DateTime, Utc};
use rusqlite::Connection;
use std::path::Path;
use std::time::Duration;

use crate::error::{RollTrackerError, Result};

const BUSY_TIMEOUT: Duration = Duration::from_secs(5);

/// Initialize the database schema.
///
/// Creates the necessary tables and indices if they don't already exist.
/// Also creates the parent directory if needed.
///
/// # Errors
///
/// Returns an error if the database cannot be created or initialized.
pub async fn init_db(path: &str) -> Result<()> {
    let path = path.to_string();
    tokio::task::spawn_blocking(move || init_db_sync(&path)).await??;
    Ok(())
}

fn init_db_sync(path: &str) -> Result<()> {
    if let Some(parent) = Path::new(path).parent() {
        std::fs::create_dir_all(parent)?;
    }

    let conn = open_connection(path)?;

    // WAL lets dashboard reads run alongside the sweeper's writes
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS users (
            user_id INTEGER NOT NULL PRIMARY KEY,
            display_name TEXT NOT NULL,
            total_roll_count INTEGER NOT NULL DEFAULT 0,
            last_roll_at INTEGER,
            next_eligible_at INTEGER,
            notifications_enabled INTEGER NOT NULL DEFAULT 1,
            suspended INTEGER NOT NULL DEFAULT 0,
            created_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS rolls (
            roll_id INTEGER PRIMARY KEY AUTOINCREMENT,
            user_id INTEGER NOT NULL,
            item_name TEXT NOT NULL,
            rarity_tier TEXT NOT NULL,
            rolled_at INTEGER NOT NULL,
            FOREIGN KEY (user_id) REFERENCES users(user_id)
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS command_usage (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            command_name TEXT NOT NULL,
            user_id INTEGER NOT NULL,
            used_at INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute("CREATE INDEX IF NOT EXISTS idx_rolls_user_id ON rolls(user_id)", [])?;
    conn.execute("CREATE INDEX IF NOT EXISTS idx_rolls_rolled_at ON rolls(rolled_at)", [])?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_command_usage_used_at ON command_usage(used_at)",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_users_next_eligible_at ON users(next_eligible_at)",
        [],
    )?;

    Ok(())
}

fn open_connection(path: &str) -> Result<Connection> {
    let conn = Connection::open(path)
        .map_err(|e| RollTrackerError::Database(format!("Failed to connect to database: {}", e)))?;
    conn.busy_timeout(BUSY_TIMEOUT)?;
    conn.execute("PRAGMA foreign_keys = ON", [])?;
    Ok(conn)
}

/// Run `f` against a fresh connection on the blocking thread pool.
async fn run_blocking<T, F>(db_path: &str, f: F) -> Result<T>
where
    T: Send + 'static,
    F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
{
    let db_path = db_path.to_string();
    tokio::task::spawn_blocking(move || {
        let mut conn = open_connection(&db_path)?;
        f(&mut conn)
    })
    .await
    .map_err(|e| RollTrackerError::Database(format!("Task join error: {}", e)))?
}

fn to_millis(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

fn from_millis(ms: i64) -> rusqlite::Result<DateTime<Utc>> {
    DateTime::from_timestamp_millis(ms).ok_or(rusqlite::Error::IntegralValueOutOfRange(0, ms))
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;
    use tempfile::TempDir;

    /// Create a fresh database in a temporary directory.
    ///
    /// The `TempDir` must be kept alive for as long as the path is used.
    pub async fn setup_test_db() -> (TempDir, String) {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let db_path = temp_dir.path().join("test.db");
        let db_path_str = db_path.to_str().expect("Invalid path").to_string();

        init_db(&db_path_str).await.expect("Failed to initialize database");

        (temp_dir, db_path_str)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_init_db_creates_parent_directory() {
        let temp_dir = TempDir::new().unwrap();
        let db_path = temp_dir.path().join("nested").join("data").join("rolls.db");
        let db_path_str = db_path.to_str().unwrap().to_string();

        init_db(&db_path_str).await.expect("init should create directories");
        assert!(db_path.exists());

        // Running it again against an existing schema is a no-op
        init_db(&db_path_str).await.expect("init should be idempotent");
    }

    #[test]
    fn test_millis_conversion_truncates_to_milliseconds() {
        let at = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let restored = from_millis(to_millis(at)).unwrap();
        assert_eq!(restored.timestamp(), 1_700_000_000);
        assert_eq!(restored.timestamp_subsec_millis(), 123);
    }
}
