//! Process-scoped runtime statistics.
//!
//! These counters feed the health page and dashboard only. They reset on
//! restart and are never consulted for cooldown decisions.

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use chrono::{DateTime, TimeDelta, Utc};

#[derive(Debug)]
pub struct BotStats {
    started_at: DateTime<Utc>,
    total_rolls: AtomicU64,
    guild_count: AtomicUsize,
}

impl BotStats {
    pub fn new(started_at: DateTime<Utc>) -> Self {
        Self {
            started_at,
            total_rolls: AtomicU64::new(0),
            guild_count: AtomicUsize::new(0),
        }
    }

    /// Start the roll counter from the ledger's persisted total.
    pub fn seed_total_rolls(&self, total: u64) {
        self.total_rolls.store(total, Ordering::Relaxed);
    }

    pub fn record_roll(&self) {
        self.total_rolls.fetch_add(1, Ordering::Relaxed);
    }

    pub fn total_rolls(&self) -> u64 {
        self.total_rolls.load(Ordering::Relaxed)
    }

    pub fn set_guild_count(&self, count: usize) {
        self.guild_count.store(count, Ordering::Relaxed);
    }

    pub fn guild_count(&self) -> usize {
        self.guild_count.load(Ordering::Relaxed)
    }

    pub fn uptime(&self, now: DateTime<Utc>) -> TimeDelta {
        (now - self.started_at).max(TimeDelta::zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roll_counter() {
        let stats = BotStats::new(Utc::now());
        stats.seed_total_rolls(10);
        stats.record_roll();
        stats.record_roll();
        assert_eq!(stats.total_rolls(), 12);
    }

    #[test]
    fn test_uptime_never_negative() {
        let start = DateTime::from_timestamp(1_000, 0).unwrap();
        let stats = BotStats::new(start);
        assert_eq!(stats.uptime(start + TimeDelta::minutes(90)), TimeDelta::minutes(90));
        assert_eq!(stats.uptime(start - TimeDelta::minutes(1)), TimeDelta::zero());
    }
}
