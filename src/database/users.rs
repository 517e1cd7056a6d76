//! User record store.

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use serde::Serialize;

use super::{from_millis, run_blocking, to_millis};
use crate::error::{RollTrackerError, Result};

/// Per-user cooldown and notification state.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct UserRecord {
    pub user_id: u64,
    /// Last-seen label, refreshed on every interaction
    pub display_name: String,
    pub total_roll_count: u32,
    pub last_roll_at: Option<DateTime<Utc>>,
    /// `None` means no active cooldown
    pub next_eligible_at: Option<DateTime<Utc>>,
    pub notifications_enabled: bool,
    pub suspended: bool,
    pub created_at: DateTime<Utc>,
}

const USER_COLUMNS: &str = "user_id, display_name, total_roll_count, last_roll_at, \
     next_eligible_at, notifications_enabled, suspended, created_at";

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        user_id: row.get::<_, i64>(0)? as u64,
        display_name: row.get(1)?,
        total_roll_count: row.get(2)?,
        last_roll_at: row.get::<_, Option<i64>>(3)?.map(from_millis).transpose()?,
        next_eligible_at: row.get::<_, Option<i64>>(4)?.map(from_millis).transpose()?,
        notifications_enabled: row.get(5)?,
        suspended: row.get(6)?,
        created_at: from_millis(row.get(7)?)?,
    })
}

fn load_user(conn: &Connection, user_id: u64) -> rusqlite::Result<Option<UserRecord>> {
    conn.query_row(
        &format!("SELECT {} FROM users WHERE user_id = ?1", USER_COLUMNS),
        params![user_id as i64],
        user_from_row,
    )
    .optional()
}

/// Insert a default record if missing, refresh the display name, and return the row.
fn upsert_user(
    conn: &Connection,
    user_id: u64,
    display_name: &str,
    now: DateTime<Utc>,
) -> Result<UserRecord> {
    conn.execute(
        "INSERT INTO users (user_id, display_name, created_at)
         VALUES (?1, ?2, ?3)
         ON CONFLICT(user_id) DO UPDATE SET display_name = excluded.display_name",
        params![user_id as i64, display_name, to_millis(now)],
    )?;
    load_user(conn, user_id)?.ok_or(RollTrackerError::NotFound(user_id))
}

fn write_user(conn: &Connection, record: &UserRecord) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE users
         SET display_name = ?2,
             total_roll_count = ?3,
             last_roll_at = ?4,
             next_eligible_at = ?5,
             notifications_enabled = ?6,
             suspended = ?7
         WHERE user_id = ?1",
        params![
            record.user_id as i64,
            record.display_name,
            record.total_roll_count,
            record.last_roll_at.map(to_millis),
            record.next_eligible_at.map(to_millis),
            record.notifications_enabled,
            record.suspended,
        ],
    )?;
    Ok(())
}

/// Repository for user record operations.
#[derive(Debug, Clone)]
pub struct UserRepository {
    db_path: String,
}

impl UserRepository {
    /// Create a new user repository.
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// Get a user by id.
    ///
    /// # Returns
    ///
    /// Returns `Some(record)` if found, `None` otherwise.
    pub async fn get_user(&self, user_id: u64) -> Result<Option<UserRecord>> {
        run_blocking(&self.db_path, move |conn| Ok(load_user(conn, user_id)?)).await
    }

    /// Get every user record, most active first.
    pub async fn get_all_users(&self) -> Result<Vec<UserRecord>> {
        run_blocking(&self.db_path, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users ORDER BY total_roll_count DESC, display_name",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    /// Users that opted into reminders and currently carry a cooldown expiry.
    pub async fn reminder_candidates(&self) -> Result<Vec<UserRecord>> {
        run_blocking(&self.db_path, |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {} FROM users
                 WHERE notifications_enabled = 1 AND next_eligible_at IS NOT NULL
                 ORDER BY next_eligible_at",
                USER_COLUMNS
            ))?;
            let users = stmt
                .query_map([], user_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await
    }

    /// Atomically read, modify and write back a single user record.
    ///
    /// With `display_name` set, a missing record is created with defaults and the
    /// stored name is refreshed; without it, a missing record fails with `NotFound`.
    /// The closure also receives the connection so it can append ledger rows in the
    /// same transaction. If it returns an error nothing is written.
    pub async fn update_user<T, F>(
        &self,
        user_id: u64,
        display_name: Option<String>,
        now: DateTime<Utc>,
        f: F,
    ) -> Result<(UserRecord, T)>
    where
        T: Send + 'static,
        F: FnOnce(&mut UserRecord, &Connection) -> Result<T> + Send + 'static,
    {
        run_blocking(&self.db_path, move |conn| {
            // IMMEDIATE takes the write lock up front so two writers never both read stale state
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            let mut record = match display_name {
                Some(name) => upsert_user(&tx, user_id, &name, now)?,
                None => load_user(&tx, user_id)?.ok_or(RollTrackerError::NotFound(user_id))?,
            };

            let value = f(&mut record, &tx)?;
            write_user(&tx, &record)?;
            tx.commit()?;

            Ok((record, value))
        })
        .await
    }

    /// Set the notification opt-in flag, creating the record if needed.
    pub async fn set_notifications(
        &self,
        user_id: u64,
        display_name: String,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<UserRecord> {
        let (record, ()) = self
            .update_user(user_id, Some(display_name), now, move |record, _| {
                record.notifications_enabled = enabled;
                Ok(())
            })
            .await?;
        Ok(record)
    }

    /// Set or clear the suspension flag on an existing record.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has never interacted with the bot.
    pub async fn set_suspended(&self, user_id: u64, suspended: bool) -> Result<UserRecord> {
        let (record, ()) = self
            .update_user(user_id, None, Utc::now(), move |record, _| {
                record.suspended = suspended;
                Ok(())
            })
            .await?;
        Ok(record)
    }

    /// Clear `next_eligible_at` only if it still holds the value the caller observed.
    ///
    /// Returns `false` when the expiry changed in between (a new roll was committed)
    /// or was already cleared.
    pub async fn clear_cooldown_if(&self, user_id: u64, observed: DateTime<Utc>) -> Result<bool> {
        run_blocking(&self.db_path, move |conn| {
            let changed = conn.execute(
                "UPDATE users SET next_eligible_at = NULL
                 WHERE user_id = ?1 AND next_eligible_at = ?2",
                params![user_id as i64, to_millis(observed)],
            )?;
            Ok(changed == 1)
        })
        .await
    }

    /// Create missing records and refresh display names for a batch of members.
    ///
    /// # Returns
    ///
    /// The number of records that did not exist before.
    pub async fn sync_members(&self, members: Vec<(u64, String)>, now: DateTime<Utc>) -> Result<usize> {
        run_blocking(&self.db_path, move |conn| {
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
            let mut created = 0;
            {
                let mut insert = tx.prepare(
                    "INSERT OR IGNORE INTO users (user_id, display_name, created_at) VALUES (?1, ?2, ?3)",
                )?;
                let mut rename = tx.prepare("UPDATE users SET display_name = ?2 WHERE user_id = ?1")?;

                for (user_id, display_name) in &members {
                    created += insert.execute(params![*user_id as i64, display_name, to_millis(now)])?;
                    rename.execute(params![*user_id as i64, display_name])?;
                }
            }
            tx.commit()?;
            Ok(created)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_test_db;
    use chrono::TimeDelta;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    #[tokio::test]
    async fn test_update_user_creates_with_defaults() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        let (record, ()) = repo
            .update_user(42, Some("alice".to_string()), at(1_000), |_, _| Ok(()))
            .await
            .unwrap();

        assert_eq!(record.user_id, 42);
        assert_eq!(record.display_name, "alice");
        assert_eq!(record.total_roll_count, 0);
        assert!(record.last_roll_at.is_none());
        assert!(record.next_eligible_at.is_none());
        assert!(record.notifications_enabled);
        assert!(!record.suspended);
        assert_eq!(record.created_at, at(1_000));

        let stored = repo.get_user(42).await.unwrap().expect("record should be stored");
        assert_eq!(stored, record);
    }

    #[tokio::test]
    async fn test_update_user_refreshes_name_but_keeps_created_at() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        repo.update_user(7, Some("old".to_string()), at(1_000), |_, _| Ok(()))
            .await
            .unwrap();
        repo.update_user(7, Some("new".to_string()), at(5_000), |_, _| Ok(()))
            .await
            .unwrap();

        let stored = repo.get_user(7).await.unwrap().unwrap();
        assert_eq!(stored.display_name, "new");
        assert_eq!(stored.created_at, at(1_000));
    }

    #[tokio::test]
    async fn test_update_user_rolls_back_on_error() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        let result = repo
            .update_user(9, Some("bob".to_string()), at(1_000), |record, _| {
                record.total_roll_count = 99;
                Err::<(), _>(RollTrackerError::UnknownItem("Banana".to_string()))
            })
            .await;
        assert!(matches!(result, Err(RollTrackerError::UnknownItem(_))));

        // Not even the lazily created row survives
        assert!(repo.get_user(9).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_update_user_without_name_requires_record() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        let result = repo.update_user(404, None, at(1_000), |_, _| Ok(())).await;
        assert!(matches!(result, Err(RollTrackerError::NotFound(404))));
    }

    #[tokio::test]
    async fn test_set_suspended() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        assert!(matches!(
            repo.set_suspended(1, true).await,
            Err(RollTrackerError::NotFound(1))
        ));

        repo.set_notifications(1, "carol".to_string(), false, at(1_000))
            .await
            .unwrap();
        let record = repo.set_suspended(1, true).await.unwrap();
        assert!(record.suspended);
        // Other settings untouched
        assert!(!record.notifications_enabled);

        let record = repo.set_suspended(1, false).await.unwrap();
        assert!(!record.suspended);
    }

    #[tokio::test]
    async fn test_reminder_candidates_filters_opted_out_and_idle() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);
        let expiry = at(10_000);

        for (user_id, enabled, next) in [(1, true, Some(expiry)), (2, false, Some(expiry)), (3, true, None)] {
            repo.update_user(user_id, Some(format!("user{}", user_id)), at(0), move |record, _| {
                record.notifications_enabled = enabled;
                record.next_eligible_at = next;
                Ok(())
            })
            .await
            .unwrap();
        }

        let candidates = repo.reminder_candidates().await.unwrap();
        assert_eq!(candidates.len(), 1);
        assert_eq!(candidates[0].user_id, 1);
    }

    #[tokio::test]
    async fn test_clear_cooldown_if_matches_observed_value() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);
        let expiry = at(10_000);

        repo.update_user(5, Some("dave".to_string()), at(0), move |record, _| {
            record.next_eligible_at = Some(expiry);
            Ok(())
        })
        .await
        .unwrap();

        // Stale observation leaves the stored value alone
        assert!(!repo.clear_cooldown_if(5, expiry - TimeDelta::hours(2)).await.unwrap());
        assert_eq!(repo.get_user(5).await.unwrap().unwrap().next_eligible_at, Some(expiry));

        assert!(repo.clear_cooldown_if(5, expiry).await.unwrap());
        assert!(repo.get_user(5).await.unwrap().unwrap().next_eligible_at.is_none());

        // Already cleared
        assert!(!repo.clear_cooldown_if(5, expiry).await.unwrap());
    }

    #[tokio::test]
    async fn test_sync_members_counts_new_records() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let repo = UserRepository::new(db_path);

        repo.set_notifications(1, "erin".to_string(), false, at(0)).await.unwrap();

        let created = repo
            .sync_members(
                vec![(1, "erin_renamed".to_string()), (2, "frank".to_string()), (3, "grace".to_string())],
                at(100),
            )
            .await
            .unwrap();
        assert_eq!(created, 2);

        let users = repo.get_all_users().await.unwrap();
        assert_eq!(users.len(), 3);

        let erin = repo.get_user(1).await.unwrap().unwrap();
        assert_eq!(erin.display_name, "erin_renamed");
        // Existing settings survive a sync
        assert!(!erin.notifications_enabled);
    }
}
