//! Command usage audit log.

use chrono::{DateTime, Utc};
use rusqlite::params;

use super::{run_blocking, to_millis};
use crate::error::Result;

const MILLIS_PER_HOUR: i64 = 60 * 60 * 1000;

/// Write-only log of slash command invocations, read back as an hourly histogram.
#[derive(Debug, Clone)]
pub struct UsageLog {
    db_path: String,
}

impl UsageLog {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    pub async fn record(&self, command_name: &str, user_id: u64, used_at: DateTime<Utc>) -> Result<()> {
        let command_name = command_name.to_string();
        run_blocking(&self.db_path, move |conn| {
            conn.execute(
                "INSERT INTO command_usage (command_name, user_id, used_at) VALUES (?1, ?2, ?3)",
                params![command_name, user_id as i64, to_millis(used_at)],
            )?;
            Ok(())
        })
        .await
    }

    /// Invocations since `since`, bucketed by UTC hour of day (index 0 = 00:00).
    pub async fn hourly_usage(&self, since: DateTime<Utc>) -> Result<[u64; 24]> {
        run_blocking(&self.db_path, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT (used_at / ?1) % 24 AS hour, COUNT(*) FROM command_usage
                 WHERE used_at >= ?2
                 GROUP BY hour",
            )?;
            let rows = stmt.query_map(params![MILLIS_PER_HOUR, to_millis(since)], |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?))
            })?;

            let mut buckets = [0u64; 24];
            for row in rows {
                let (hour, count) = row?;
                if let Some(bucket) = buckets.get_mut(hour as usize) {
                    *bucket = count as u64;
                }
            }
            Ok(buckets)
        })
        .await
    }
}
