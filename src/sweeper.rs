//! Reminder sweeper.
//!
//! Periodically scans user records for elapsed cooldowns, hands one reminder
//! per expiry to the notifier and clears the expiry marker so the next sweep
//! does not repeat it. Delivery is best-effort: a failed delivery is logged
//! and the marker is still cleared.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;
use tokio::time::{self, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::database::{UserRecord, UserRepository};
use crate::error::Result;

/// A reminder that a user's cooldown has elapsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReminderEvent {
    pub user_id: u64,
    pub display_name: String,
    pub suspended: bool,
    pub total_roll_count: u32,
}

impl From<&UserRecord> for ReminderEvent {
    fn from(record: &UserRecord) -> Self {
        Self {
            user_id: record.user_id,
            display_name: record.display_name.clone(),
            suspended: record.suspended,
            total_roll_count: record.total_roll_count,
        }
    }
}

/// Delivers reminders to users.
#[async_trait]
pub trait ReminderNotifier: Send + Sync {
    async fn deliver_reminder(&self, event: &ReminderEvent) -> Result<()>;
}

/// Whether a record should be reminded at `now`.
///
/// Suspended users are still reminded; suspension only blocks rolling.
pub fn is_due(record: &UserRecord, now: DateTime<Utc>) -> bool {
    record.notifications_enabled && matches!(record.next_eligible_at, Some(next) if next <= now)
}

pub struct ReminderSweeper {
    users: UserRepository,
    notifier: Arc<dyn ReminderNotifier>,
}

impl ReminderSweeper {
    pub fn new(users: UserRepository, notifier: Arc<dyn ReminderNotifier>) -> Self {
        Self { users, notifier }
    }

    /// Run one sweep and return the reminders that were emitted.
    ///
    /// Each expiry is cleared right after its delivery attempt, before the next
    /// candidate is processed. The clear only applies if the stored expiry is
    /// still the one that was observed, so a roll committed mid-sweep keeps its
    /// fresh cooldown.
    pub async fn sweep(&self, now: DateTime<Utc>) -> Result<Vec<ReminderEvent>> {
        let candidates = self.users.reminder_candidates().await?;
        let mut emitted = Vec::new();

        for record in candidates.iter().filter(|record| is_due(record, now)) {
            let Some(observed) = record.next_eligible_at else {
                continue;
            };

            let event = ReminderEvent::from(record);
            if let Err(e) = self.notifier.deliver_reminder(&event).await {
                warn!(user_id = record.user_id, error = %e, "Failed to deliver roll reminder");
            }

            match self.users.clear_cooldown_if(record.user_id, observed).await {
                Ok(true) => debug!(user_id = record.user_id, "Cleared elapsed cooldown"),
                Ok(false) => debug!(user_id = record.user_id, "Cooldown changed during sweep, left as is"),
                Err(e) => {
                    // Left in place; the next sweep may remind this user again
                    error!(user_id = record.user_id, error = %e, "Failed to clear elapsed cooldown");
                }
            }

            emitted.push(event);
        }

        Ok(emitted)
    }

    /// Run `sweep` forever on a fixed interval. The first sweep runs immediately.
    pub fn spawn(self: Arc<Self>, every: Duration) -> JoinHandle<()> {
        info!(interval_secs = every.as_secs(), "Starting reminder sweeper");

        tokio::spawn(async move {
            let mut interval = time::interval(every);
            interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                interval.tick().await;
                match self.sweep(Utc::now()).await {
                    Ok(events) if !events.is_empty() => {
                        info!(count = events.len(), "Reminder sweep emitted reminders");
                    }
                    Ok(_) => {}
                    Err(e) => error!(error = %e, "Reminder sweep failed"),
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::cooldown::{CooldownEngine, RejectReason, RollDecision};
    use crate::database::test_support::setup_test_db;
    use crate::error::RollTrackerError;
    use crate::stats::BotStats;
    use chrono::TimeDelta;
    use tokio::sync::Mutex;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    fn engine(db_path: &str) -> Arc<CooldownEngine> {
        Arc::new(CooldownEngine::new(
            db_path,
            Catalog::standard(),
            TimeDelta::hours(2),
            Arc::new(BotStats::new(at(0))),
        ))
    }

    #[derive(Default)]
    struct RecordingNotifier {
        delivered: Mutex<Vec<ReminderEvent>>,
    }

    #[async_trait]
    impl ReminderNotifier for RecordingNotifier {
        async fn deliver_reminder(&self, event: &ReminderEvent) -> Result<()> {
            self.delivered.lock().await.push(event.clone());
            Ok(())
        }
    }

    struct FailingNotifier;

    #[async_trait]
    impl ReminderNotifier for FailingNotifier {
        async fn deliver_reminder(&self, _event: &ReminderEvent) -> Result<()> {
            Err(RollTrackerError::Delivery("channel unreachable".to_string()))
        }
    }

    /// Commits a roll for the reminded user while the reminder is in flight.
    struct RacingNotifier {
        engine: Arc<CooldownEngine>,
        roll_at: DateTime<Utc>,
    }

    #[async_trait]
    impl ReminderNotifier for RacingNotifier {
        async fn deliver_reminder(&self, event: &ReminderEvent) -> Result<()> {
            self.engine
                .commit_roll(event.user_id, &event.display_name, "Spin", self.roll_at)
                .await?;
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_sweep_emits_once_and_is_idempotent() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let users = UserRepository::new(db_path.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(users.clone(), notifier.clone());

        let rolled = at(1_000_000);
        engine.commit_roll(1, "alice", "Ice", rolled).await.unwrap();
        engine.commit_roll(2, "bob", "Dark", rolled).await.unwrap();

        // Nothing due yet
        assert!(sweeper.sweep(rolled + TimeDelta::minutes(119)).await.unwrap().is_empty());

        let now = rolled + TimeDelta::hours(2);
        let first = sweeper.sweep(now).await.unwrap();
        assert_eq!(first.len(), 2);
        assert_eq!(notifier.delivered.lock().await.len(), 2);

        for user_id in [1, 2] {
            let record = users.get_user(user_id).await.unwrap().unwrap();
            assert!(record.next_eligible_at.is_none());
            // The sweep never touches roll bookkeeping
            assert_eq!(record.last_roll_at, Some(rolled));
        }

        let second = sweeper.sweep(now).await.unwrap();
        assert!(second.is_empty());
        assert_eq!(notifier.delivered.lock().await.len(), 2);
    }

    #[tokio::test]
    async fn test_sweep_skips_opted_out_users() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let users = UserRepository::new(db_path.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(users.clone(), notifier.clone());

        let rolled = at(1_000_000);
        engine.commit_roll(1, "alice", "Ice", rolled).await.unwrap();
        engine.toggle_notifications(1, "alice", false, rolled).await.unwrap();

        let events = sweeper.sweep(rolled + TimeDelta::hours(3)).await.unwrap();
        assert!(events.is_empty());
        // Expiry stays so the cooldown is still visible on the dashboard
        let record = users.get_user(1).await.unwrap().unwrap();
        assert_eq!(record.next_eligible_at, Some(rolled + TimeDelta::hours(2)));
    }

    #[tokio::test]
    async fn test_sweep_reminds_suspended_users() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(UserRepository::new(db_path.clone()), notifier.clone());

        let rolled = at(1_000_000);
        engine.commit_roll(1, "alice", "Ice", rolled).await.unwrap();
        engine.suspend_user(1, true).await.unwrap();

        let events = sweeper.sweep(rolled + TimeDelta::hours(2)).await.unwrap();
        assert_eq!(events.len(), 1);
        assert!(events[0].suspended);
    }

    #[tokio::test]
    async fn test_failed_delivery_still_clears() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let users = UserRepository::new(db_path.clone());
        let sweeper = ReminderSweeper::new(users.clone(), Arc::new(FailingNotifier));

        let rolled = at(1_000_000);
        engine.commit_roll(1, "alice", "Ice", rolled).await.unwrap();

        let now = rolled + TimeDelta::hours(2);
        assert_eq!(sweeper.sweep(now).await.unwrap().len(), 1);
        assert!(users.get_user(1).await.unwrap().unwrap().next_eligible_at.is_none());
        assert!(sweeper.sweep(now).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_roll_during_sweep_keeps_fresh_cooldown() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let users = UserRepository::new(db_path.clone());

        let rolled = at(1_000_000);
        let now = rolled + TimeDelta::hours(2);
        engine.commit_roll(1, "alice", "Ice", rolled).await.unwrap();

        let notifier = Arc::new(RacingNotifier { engine: engine.clone(), roll_at: now });
        let sweeper = ReminderSweeper::new(users.clone(), notifier);

        assert_eq!(sweeper.sweep(now).await.unwrap().len(), 1);

        let record = users.get_user(1).await.unwrap().unwrap();
        assert_eq!(record.total_roll_count, 2);
        assert_eq!(record.next_eligible_at, Some(now + TimeDelta::hours(2)));
        assert_eq!(
            engine.attempt_roll(1, "alice", now).await.unwrap(),
            RollDecision::Rejected(RejectReason::OnCooldown { remaining: TimeDelta::hours(2) })
        );
    }

    #[tokio::test]
    async fn test_full_roll_cycle() {
        let (_temp_dir, db_path) = setup_test_db().await;
        let engine = engine(&db_path);
        let users = UserRepository::new(db_path.clone());
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(users.clone(), notifier.clone());
        let start = at(1_700_000_000);

        assert_eq!(engine.attempt_roll(77, "user", start).await.unwrap(), RollDecision::Accepted);
        engine.commit_roll(77, "user", "Ice", start).await.unwrap();

        let record = users.get_user(77).await.unwrap().unwrap();
        assert_eq!(record.total_roll_count, 1);
        assert_eq!(record.next_eligible_at, Some(start + TimeDelta::hours(2)));

        let one_minute_later = start + TimeDelta::minutes(1);
        assert_eq!(
            engine.attempt_roll(77, "user", one_minute_later).await.unwrap(),
            RollDecision::Rejected(RejectReason::OnCooldown {
                remaining: TimeDelta::minutes(119)
            })
        );

        let later = one_minute_later + TimeDelta::hours(2);
        let events = sweeper.sweep(later).await.unwrap();
        assert_eq!(
            events,
            vec![ReminderEvent {
                user_id: 77,
                display_name: "user".to_string(),
                suspended: false,
                total_roll_count: 1,
            }]
        );
        assert!(users.get_user(77).await.unwrap().unwrap().next_eligible_at.is_none());

        assert_eq!(engine.attempt_roll(77, "user", later).await.unwrap(), RollDecision::Accepted);
    }

    #[tokio::test]
    async fn test_sweep_fails_without_emitting_when_store_is_unreachable() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("missing").join("rolls.db");
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(
            UserRepository::new(db_path.to_str().unwrap().to_string()),
            notifier.clone(),
        );

        let result = sweeper.sweep(at(1_000_000)).await;
        assert!(matches!(result, Err(RollTrackerError::Database(_))), "got {:?}", result);
        assert!(notifier.delivered.lock().await.is_empty());
    }

    #[tokio::test]
    async fn test_sweep_fails_without_emitting_when_store_has_no_schema() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let db_path = temp_dir.path().join("empty.db");
        let notifier = Arc::new(RecordingNotifier::default());
        let sweeper = ReminderSweeper::new(
            UserRepository::new(db_path.to_str().unwrap().to_string()),
            notifier.clone(),
        );

        assert!(sweeper.sweep(at(1_000_000)).await.is_err());
        assert!(notifier.delivered.lock().await.is_empty());
    }
}
