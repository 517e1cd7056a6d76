//! Cooldown engine.
//!
//! Decides whether a user may roll and applies the state transition when a
//! roll is committed. Eligibility is decided here and nowhere else; the
//! Discord and HTTP layers only render the outcome.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, TimeDelta, Timelike, Utc};
use tracing::{debug, error, info};

use crate::catalog::{Catalog, Rarity};
use crate::database::{append_roll, RollEvent, RollLedger, UserRecord, UserRepository};
use crate::error::{RollTrackerError, Result};
use crate::stats::BotStats;

/// Why a roll was refused.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RejectReason {
    /// Blocked by an operator, regardless of cooldown
    Suspended,
    /// The previous roll's cooldown has not elapsed yet
    OnCooldown { remaining: TimeDelta },
}

impl fmt::Display for RejectReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suspended => write!(f, "user is suspended"),
            Self::OnCooldown { remaining } => {
                write!(f, "on cooldown for another {}s", remaining.num_seconds())
            }
        }
    }
}

/// Outcome of a roll attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RollDecision {
    Accepted,
    Rejected(RejectReason),
}

/// Pure eligibility check for a single record.
///
/// Suspension wins over cooldown. An absent `next_eligible_at` always allows the roll.
pub fn evaluate(record: &UserRecord, now: DateTime<Utc>) -> RollDecision {
    if record.suspended {
        return RollDecision::Rejected(RejectReason::Suspended);
    }

    match record.next_eligible_at {
        Some(next) if next > now => RollDecision::Rejected(RejectReason::OnCooldown {
            remaining: next - now,
        }),
        _ => RollDecision::Accepted,
    }
}

/// Drop sub-millisecond precision so in-memory values match what storage returns.
fn truncate_to_millis(at: DateTime<Utc>) -> DateTime<Utc> {
    let millis = at.nanosecond() / 1_000_000;
    at.with_nanosecond(millis * 1_000_000).unwrap_or(at)
}

/// Entry point for every roll-related state change.
pub struct CooldownEngine {
    users: UserRepository,
    ledger: RollLedger,
    catalog: Catalog,
    cooldown: TimeDelta,
    stats: Arc<BotStats>,
}

impl CooldownEngine {
    pub fn new(db_path: &str, catalog: Catalog, cooldown: TimeDelta, stats: Arc<BotStats>) -> Self {
        Self {
            users: UserRepository::new(db_path.to_string()),
            ledger: RollLedger::new(db_path.to_string()),
            catalog,
            cooldown,
            stats,
        }
    }

    pub fn catalog(&self) -> &Catalog {
        &self.catalog
    }

    pub fn cooldown(&self) -> TimeDelta {
        self.cooldown
    }

    /// Check whether `user_id` may roll right now.
    ///
    /// Creates the user record on first contact and refreshes the display name.
    /// Storage failures are returned as errors; callers must treat them as a rejection.
    pub async fn attempt_roll(
        &self,
        user_id: u64,
        display_name: &str,
        now: DateTime<Utc>,
    ) -> Result<RollDecision> {
        let now = truncate_to_millis(now);
        let (_, decision) = self
            .users
            .update_user(user_id, Some(display_name.to_string()), now, move |record, _| {
                Ok(evaluate(record, now))
            })
            .await?;

        debug!(user_id, ?decision, "Evaluated roll attempt");
        Ok(decision)
    }

    /// Record a selected item and start the user's next cooldown.
    ///
    /// Eligibility is checked again inside the same transaction, so a second
    /// selection menu opened by the same user cannot commit twice.
    ///
    /// # Errors
    ///
    /// * `UnknownItem` if the item is not in the catalog
    /// * `RollRejected` if the user became ineligible since the attempt
    /// * `Database` on storage failure
    pub async fn commit_roll(
        &self,
        user_id: u64,
        display_name: &str,
        item_name: &str,
        now: DateTime<Utc>,
    ) -> Result<RollEvent> {
        let Some(fruit) = self.catalog.lookup(item_name) else {
            error!(user_id, item_name, "Selected item is missing from the catalog");
            return Err(RollTrackerError::UnknownItem(item_name.to_string()));
        };

        let now = truncate_to_millis(now);
        let cooldown = self.cooldown;
        let event = RollEvent {
            user_id,
            item_name: fruit.name.clone(),
            rarity_tier: fruit.rarity,
            rolled_at: now,
        };

        let (record, event) = self
            .users
            .update_user(user_id, Some(display_name.to_string()), now, move |record, conn| {
                if let RollDecision::Rejected(reason) = evaluate(record, now) {
                    return Err(RollTrackerError::RollRejected(reason));
                }

                let next_eligible_at = now.checked_add_signed(cooldown).ok_or_else(|| {
                    RollTrackerError::InvalidInput(format!(
                        "cooldown of {}s from {} is out of range",
                        cooldown.num_seconds(),
                        now
                    ))
                })?;

                record.total_roll_count += 1;
                record.last_roll_at = Some(now);
                record.next_eligible_at = Some(next_eligible_at);
                append_roll(conn, &event)?;
                Ok(event)
            })
            .await?;

        self.stats.record_roll();
        info!(
            user_id,
            item = %event.item_name,
            rarity = %event.rarity_tier,
            total_rolls = record.total_roll_count,
            "Roll committed"
        );
        Ok(event)
    }

    /// Turn reminders on or off, creating the record if needed.
    pub async fn toggle_notifications(
        &self,
        user_id: u64,
        display_name: &str,
        enabled: bool,
        now: DateTime<Utc>,
    ) -> Result<UserRecord> {
        let record = self
            .users
            .set_notifications(user_id, display_name.to_string(), enabled, truncate_to_millis(now))
            .await?;
        info!(user_id, enabled, "Notification preference updated");
        Ok(record)
    }

    /// Set or lift an operator suspension.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the user has no record yet.
    pub async fn suspend_user(&self, user_id: u64, suspended: bool) -> Result<UserRecord> {
        let record = self.users.set_suspended(user_id, suspended).await?;
        info!(user_id, suspended, "Suspension updated");
        Ok(record)
    }

    /// Bulk lazy creation for guild members. Returns how many records were new.
    pub async fn sync_members(&self, members: Vec<(u64, String)>, now: DateTime<Utc>) -> Result<usize> {
        let total = members.len();
        let created = self.users.sync_members(members, truncate_to_millis(now)).await?;
        info!(total, created, "Member sync complete");
        Ok(created)
    }

    /// A user's rolls, most recent first.
    pub async fn user_history(&self, user_id: u64) -> Result<Vec<RollEvent>> {
        self.ledger.user_history(user_id).await
    }

    pub async fn all_users(&self) -> Result<Vec<UserRecord>> {
        self.users.get_all_users().await
    }

    pub async fn rarity_distribution(&self) -> Result<BTreeMap<Rarity, u64>> {
        self.ledger.rarity_distribution().await
    }
}
