//! Append-only roll ledger.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use serde::Serialize;

use super::{from_millis, run_blocking, to_millis};
use crate::catalog::Rarity;
use crate::error::Result;

/// A completed roll. The rarity is frozen at write time.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RollEvent {
    pub user_id: u64,
    pub item_name: String,
    pub rarity_tier: Rarity,
    pub rolled_at: DateTime<Utc>,
}

fn roll_from_row(row: &Row<'_>) -> rusqlite::Result<RollEvent> {
    Ok(RollEvent {
        user_id: row.get::<_, i64>(0)? as u64,
        item_name: row.get(1)?,
        rarity_tier: row.get(2)?,
        rolled_at: from_millis(row.get(3)?)?,
    })
}

/// Append a roll inside the caller's transaction.
pub(crate) fn append_roll(conn: &Connection, event: &RollEvent) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO rolls (user_id, item_name, rarity_tier, rolled_at) VALUES (?1, ?2, ?3, ?4)",
        params![
            event.user_id as i64,
            event.item_name,
            event.rarity_tier,
            to_millis(event.rolled_at)
        ],
    )?;
    Ok(())
}

fn empty_distribution() -> BTreeMap<Rarity, u64> {
    Rarity::ALL.into_iter().map(|rarity| (rarity, 0)).collect()
}

/// Read access to the roll history.
#[derive(Debug, Clone)]
pub struct RollLedger {
    db_path: String,
}

impl RollLedger {
    pub fn new(db_path: String) -> Self {
        Self { db_path }
    }

    /// Every roll of one user, most recent first.
    pub async fn user_history(&self, user_id: u64) -> Result<Vec<RollEvent>> {
        run_blocking(&self.db_path, move |conn| {
            let mut stmt = conn.prepare(
                "SELECT user_id, item_name, rarity_tier, rolled_at FROM rolls
                 WHERE user_id = ?1
                 ORDER BY rolled_at DESC, roll_id DESC",
            )?;
            let rolls = stmt
                .query_map(params![user_id as i64], roll_from_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rolls)
        })
        .await
    }

    /// Count of rolls per rarity tier across all users. Every tier is present.
    pub async fn rarity_distribution(&self) -> Result<BTreeMap<Rarity, u64>> {
        run_blocking(&self.db_path, |conn| {
            let mut stmt =
                conn.prepare("SELECT rarity_tier, COUNT(*) FROM rolls GROUP BY rarity_tier")?;
            let mut distribution = empty_distribution();
            let rows = stmt.query_map([], |row| Ok((row.get::<_, Rarity>(0)?, row.get::<_, i64>(1)?)))?;
            for row in rows {
                let (rarity, count) = row?;
                distribution.insert(rarity, count as u64);
            }
            Ok(distribution)
        })
        .await
    }

    /// Total number of rolls ever recorded.
    pub async fn total_rolls(&self) -> Result<u64> {
        run_blocking(&self.db_path, |conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM rolls", [], |row| row.get(0))?;
            Ok(count as u64)
        })
        .await
    }

    /// The most recent roll of every user that has rolled at least once.
    pub async fn latest_per_user(&self) -> Result<HashMap<u64, RollEvent>> {
        run_blocking(&self.db_path, |conn| {
            // SQLite fills the bare columns from the row holding the MAX
            let mut stmt = conn.prepare(
                "SELECT user_id, item_name, rarity_tier, MAX(rolled_at) FROM rolls GROUP BY user_id",
            )?;
            let latest = stmt
                .query_map([], roll_from_row)?
                .map(|roll| roll.map(|roll| (roll.user_id, roll)))
                .collect::<rusqlite::Result<HashMap<_, _>>>()?;
            Ok(latest)
        })
        .await
    }
}

/// Per-tier counts of an already loaded history.
pub fn count_by_rarity(rolls: &[RollEvent]) -> BTreeMap<Rarity, u64> {
    let mut distribution = empty_distribution();
    for roll in rolls {
        *distribution.entry(roll.rarity_tier).or_default() += 1;
    }
    distribution
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::test_support::setup_test_db;
    use crate::database::UserRepository;

    fn at(secs: i64) -> DateTime<Utc> {
        DateTime::from_timestamp(secs, 0).unwrap()
    }

    async fn insert_rolls(db_path: &str, user_id: u64, rolls: &[(&str, Rarity, i64)]) {
        let users = UserRepository::new(db_path.to_string());
        let events: Vec<RollEvent> = rolls
            .iter()
            .map(|(name, rarity, secs)| RollEvent {
                user_id,
                item_name: name.to_string(),
                rarity_tier: *rarity,
                rolled_at: at(*secs),
            })
            .collect();

        users
            .update_user(user_id, Some(format!("user{}", user_id)), at(0), move |_, conn| {
                for event in &events {
                    append_roll(conn, event)?;
                }
                Ok(())
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_user_history_most_recent_first() {
        let (_temp_dir, db_path) = setup_test_db().await;
        insert_rolls(
            &db_path,
            1,
            &[("Ice", Rarity::Uncommon, 100), ("Dragon", Rarity::Mythic, 300), ("Spin", Rarity::Common, 200)],
        )
        .await;
        insert_rolls(&db_path, 2, &[("Magma", Rarity::Rare, 250)]).await;

        let ledger = RollLedger::new(db_path);
        let history = ledger.user_history(1).await.unwrap();
        let names: Vec<&str> = history.iter().map(|r| r.item_name.as_str()).collect();
        assert_eq!(names, vec!["Dragon", "Spin", "Ice"]);
        assert_eq!(history[0].rarity_tier, Rarity::Mythic);

        assert!(ledger.user_history(3).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_rarity_distribution_includes_every_tier() {
        let (_temp_dir, db_path) = setup_test_db().await;
        insert_rolls(&db_path, 1, &[("Ice", Rarity::Uncommon, 1), ("Sand", Rarity::Uncommon, 2)]).await;
        insert_rolls(&db_path, 2, &[("Dragon", Rarity::Mythic, 3)]).await;

        let ledger = RollLedger::new(db_path);
        let distribution = ledger.rarity_distribution().await.unwrap();
        assert_eq!(distribution.len(), Rarity::ALL.len());
        assert_eq!(distribution[&Rarity::Uncommon], 2);
        assert_eq!(distribution[&Rarity::Mythic], 1);
        assert_eq!(distribution[&Rarity::Common], 0);

        assert_eq!(ledger.total_rolls().await.unwrap(), 3);
    }

    #[tokio::test]
    async fn test_latest_per_user() {
        let (_temp_dir, db_path) = setup_test_db().await;
        insert_rolls(&db_path, 1, &[("Ice", Rarity::Uncommon, 10), ("Gas", Rarity::Mythic, 20)]).await;
        insert_rolls(&db_path, 2, &[("Bomb", Rarity::Common, 5)]).await;

        let latest = RollLedger::new(db_path).latest_per_user().await.unwrap();
        assert_eq!(latest.len(), 2);
        assert_eq!(latest[&1].item_name, "Gas");
        assert_eq!(latest[&2].item_name, "Bomb");
    }

    #[test]
    fn test_count_by_rarity() {
        let rolls = vec![
            RollEvent { user_id: 1, item_name: "Ice".into(), rarity_tier: Rarity::Uncommon, rolled_at: at(1) },
            RollEvent { user_id: 1, item_name: "Dark".into(), rarity_tier: Rarity::Uncommon, rolled_at: at(2) },
        ];
        let counts = count_by_rarity(&rolls);
        assert_eq!(counts[&Rarity::Uncommon], 2);
        assert_eq!(counts[&Rarity::Legendary], 0);
    }
}
