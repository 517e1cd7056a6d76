//! Fruit catalog and rarity tiers.
//!
//! The catalog is a static lookup table from fruit name to rarity and emoji.
//! Rolls copy the rarity at write time, so the ledger never reads back
//! through this table.

use std::fmt;
use std::str::FromStr;

use rusqlite::types::{FromSql, FromSqlError, FromSqlResult, ToSql, ToSqlOutput, ValueRef};
use serde::Serialize;

use crate::error::RollTrackerError;

/// Rarity tier of a catalog item, ordered from most to least common.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub enum Rarity {
    Common,
    Uncommon,
    Rare,
    Legendary,
    Mythic,
}

impl Rarity {
    pub const ALL: [Rarity; 5] = [
        Rarity::Common,
        Rarity::Uncommon,
        Rarity::Rare,
        Rarity::Legendary,
        Rarity::Mythic,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Rarity::Common => "Common",
            Rarity::Uncommon => "Uncommon",
            Rarity::Rare => "Rare",
            Rarity::Legendary => "Legendary",
            Rarity::Mythic => "Mythic",
        }
    }

    /// Embed colour for this tier.
    pub fn colour(self) -> u32 {
        match self {
            Rarity::Common => 0x808080,
            Rarity::Uncommon => 0x3b82f6,
            Rarity::Rare => 0x9333ea,
            Rarity::Legendary => 0xec4899,
            Rarity::Mythic => 0xdc2626,
        }
    }

    /// Coloured marker shown next to the tier name.
    pub fn marker(self) -> &'static str {
        match self {
            Rarity::Common => "⚪",
            Rarity::Uncommon => "🔵",
            Rarity::Rare => "🟣",
            Rarity::Legendary => "🔮",
            Rarity::Mythic => "🔴",
        }
    }
}

impl fmt::Display for Rarity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Rarity {
    type Err = RollTrackerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Rarity::ALL
            .into_iter()
            .find(|rarity| rarity.as_str().eq_ignore_ascii_case(s))
            .ok_or_else(|| RollTrackerError::InvalidInput(format!("Unknown rarity tier: '{}'", s)))
    }
}

impl ToSql for Rarity {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(ToSqlOutput::from(self.as_str()))
    }
}

impl FromSql for Rarity {
    fn column_result(value: ValueRef<'_>) -> FromSqlResult<Self> {
        value
            .as_str()?
            .parse()
            .map_err(|e: RollTrackerError| FromSqlError::Other(Box::new(e)))
    }
}

/// A single catalog entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fruit {
    pub name: String,
    pub rarity: Rarity,
    pub emoji: String,
}

impl Fruit {
    pub fn new(name: &str, rarity: Rarity, emoji: &str) -> Self {
        Self {
            name: name.to_string(),
            rarity,
            emoji: emoji.to_string(),
        }
    }
}

/// Lookup table of every fruit that can be logged.
#[derive(Debug, Clone, Default)]
pub struct Catalog {
    fruits: Vec<Fruit>,
}

const STANDARD_FRUITS: &[(&str, Rarity, &str)] = &[
    ("Rocket", Rarity::Common, "🚀"),
    ("Spin", Rarity::Common, "🌀"),
    ("Blade", Rarity::Common, "⚔️"),
    ("Spring", Rarity::Common, "🌸"),
    ("Bomb", Rarity::Common, "💣"),
    ("Smoke", Rarity::Common, "💨"),
    ("Spike", Rarity::Common, "🦔"),
    ("Ice", Rarity::Uncommon, "🧊"),
    ("Sand", Rarity::Uncommon, "🏖️"),
    ("Dark", Rarity::Uncommon, "🌑"),
    ("Eagle", Rarity::Uncommon, "🦅"),
    ("Diamond", Rarity::Uncommon, "💎"),
    ("Flame", Rarity::Uncommon, "🔥"),
    ("Magma", Rarity::Rare, "🌋"),
    ("Light", Rarity::Rare, "💡"),
    ("Rubber", Rarity::Rare, "🎈"),
    ("Ghost", Rarity::Rare, "👻"),
    ("Portal", Rarity::Legendary, "🌀"),
    ("Lightning", Rarity::Legendary, "⚡"),
    ("Pain", Rarity::Legendary, "💢"),
    ("Blizzard", Rarity::Legendary, "❄️"),
    ("Quake", Rarity::Legendary, "⚡"),
    ("Buddha", Rarity::Legendary, "🙏"),
    ("Love", Rarity::Legendary, "💖"),
    ("Creation", Rarity::Legendary, "🎨"),
    ("Spider", Rarity::Legendary, "🕷️"),
    ("Sound", Rarity::Legendary, "🔊"),
    ("Phoenix", Rarity::Legendary, "🔥"),
    ("Gravity", Rarity::Mythic, "🌌"),
    ("Mammoth", Rarity::Mythic, "🦣"),
    ("T-Rex", Rarity::Mythic, "🦖"),
    ("Dough", Rarity::Mythic, "🍩"),
    ("Shadow", Rarity::Mythic, "👤"),
    ("Venom", Rarity::Mythic, "☠️"),
    ("Gas", Rarity::Mythic, "☁️"),
    ("Spirit", Rarity::Mythic, "👻"),
    ("Tiger", Rarity::Mythic, "🐯"),
    ("Yeti", Rarity::Mythic, "❄️"),
    ("Kitsune", Rarity::Mythic, "🦊"),
    ("Control", Rarity::Mythic, "🎮"),
    ("Dragon", Rarity::Mythic, "🐉"),
];

impl Catalog {
    /// The Blox Fruits table the bot ships with.
    pub fn standard() -> Self {
        Self {
            fruits: STANDARD_FRUITS
                .iter()
                .map(|(name, rarity, emoji)| Fruit::new(name, *rarity, emoji))
                .collect(),
        }
    }

    /// Add a fruit, replacing any existing entry with the same name.
    pub fn insert(&mut self, fruit: Fruit) {
        match self.fruits.iter_mut().find(|f| f.name == fruit.name) {
            Some(existing) => *existing = fruit,
            None => self.fruits.push(fruit),
        }
    }

    pub fn lookup(&self, name: &str) -> Option<&Fruit> {
        self.fruits.iter().find(|f| f.name == name)
    }

    pub fn len(&self) -> usize {
        self.fruits.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fruits.is_empty()
    }

    /// All fruits sorted by name.
    pub fn alphabetical(&self) -> Vec<&Fruit> {
        let mut fruits: Vec<&Fruit> = self.fruits.iter().collect();
        fruits.sort_by(|a, b| a.name.cmp(&b.name));
        fruits
    }

    /// Fruits of one tier, in catalog order.
    pub fn by_rarity(&self, rarity: Rarity) -> Vec<&Fruit> {
        self.fruits.iter().filter(|f| f.rarity == rarity).collect()
    }
}
