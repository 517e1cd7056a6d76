//! Item selection flow for a pending roll.
//!
//! A roll menu is a short-lived state machine owned by the command that
//! opened it. Button clicks map to [`MenuAction`]s; a timeout or a newer
//! menu for the same user moves it to the terminal `Abandoned` state.
//! Nothing here touches storage.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::sync::Mutex;
use tracing::debug;

use crate::catalog::{Catalog, Rarity};

/// Buttons that fit on one page (four rows of five).
pub const ITEMS_PER_PAGE: usize = 20;

/// Where the items on an item page came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ItemSource {
    /// Zero-based alphabetical page
    Page(usize),
    Rarity(Rarity),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SelectionStep {
    /// Pick between alphabetical and by-rarity browsing
    ChooseMode,
    ChoosePage,
    ChooseRarity,
    ChooseItem { source: ItemSource, items: Vec<String> },
    Selected(String),
    Abandoned,
}

/// A clickable action, encoded into a button's custom id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MenuAction {
    Alphabetical,
    ByRarity,
    Page(usize),
    Tier(Rarity),
    Pick(String),
    Back,
}

impl MenuAction {
    pub fn encode(&self) -> String {
        match self {
            MenuAction::Alphabetical => "alpha".to_string(),
            MenuAction::ByRarity => "rarity".to_string(),
            MenuAction::Page(page) => format!("page:{}", page),
            MenuAction::Tier(rarity) => format!("tier:{}", rarity),
            MenuAction::Pick(name) => format!("pick:{}", name),
            MenuAction::Back => "back".to_string(),
        }
    }

    pub fn decode(token: &str) -> Option<Self> {
        match token.split_once(':') {
            None => match token {
                "alpha" => Some(MenuAction::Alphabetical),
                "rarity" => Some(MenuAction::ByRarity),
                "back" => Some(MenuAction::Back),
                _ => None,
            },
            Some(("page", page)) => page.parse().ok().map(MenuAction::Page),
            Some(("tier", rarity)) => rarity.parse().ok().map(MenuAction::Tier),
            Some(("pick", name)) if !name.is_empty() => Some(MenuAction::Pick(name.to_string())),
            Some(_) => None,
        }
    }
}

/// State machine for one user's item selection.
#[derive(Debug, Clone)]
pub struct SelectionFlow {
    step: SelectionStep,
    pages: Vec<Vec<String>>,
    groups: HashMap<Rarity, Vec<String>>,
}

impl SelectionFlow {
    pub fn new(catalog: &Catalog) -> Self {
        let names: Vec<String> = catalog.alphabetical().into_iter().map(|f| f.name.clone()).collect();
        let pages = names.chunks(ITEMS_PER_PAGE).map(|chunk| chunk.to_vec()).collect();
        let groups = Rarity::ALL
            .into_iter()
            .map(|rarity| {
                let names = catalog.by_rarity(rarity).into_iter().map(|f| f.name.clone()).collect();
                (rarity, names)
            })
            .collect();

        Self {
            step: SelectionStep::ChooseMode,
            pages,
            groups,
        }
    }

    pub fn step(&self) -> &SelectionStep {
        &self.step
    }

    /// Alphabetical pages, each at most [`ITEMS_PER_PAGE`] long.
    pub fn pages(&self) -> &[Vec<String>] {
        &self.pages
    }

    pub fn is_finished(&self) -> bool {
        matches!(self.step, SelectionStep::Selected(_) | SelectionStep::Abandoned)
    }

    /// The chosen item, once the flow reached `Selected`.
    pub fn selection(&self) -> Option<&str> {
        match &self.step {
            SelectionStep::Selected(name) => Some(name),
            _ => None,
        }
    }

    /// Apply a click. Actions that make no sense in the current step are ignored.
    pub fn click(&mut self, action: MenuAction) -> &SelectionStep {
        let next = match (&self.step, action) {
            (SelectionStep::ChooseMode, MenuAction::Alphabetical) => Some(SelectionStep::ChoosePage),
            (SelectionStep::ChooseMode, MenuAction::ByRarity) => Some(SelectionStep::ChooseRarity),
            (SelectionStep::ChoosePage, MenuAction::Page(page)) => {
                self.pages.get(page).map(|items| SelectionStep::ChooseItem {
                    source: ItemSource::Page(page),
                    items: items.clone(),
                })
            }
            (SelectionStep::ChooseRarity, MenuAction::Tier(rarity)) => self
                .groups
                .get(&rarity)
                .filter(|items| !items.is_empty())
                .map(|items| SelectionStep::ChooseItem {
                    source: ItemSource::Rarity(rarity),
                    items: items.clone(),
                }),
            (SelectionStep::ChoosePage | SelectionStep::ChooseRarity, MenuAction::Back) => {
                Some(SelectionStep::ChooseMode)
            }
            (SelectionStep::ChooseItem { source, .. }, MenuAction::Back) => Some(match source {
                ItemSource::Page(_) => SelectionStep::ChoosePage,
                ItemSource::Rarity(_) => SelectionStep::ChooseRarity,
            }),
            (SelectionStep::ChooseItem { items, .. }, MenuAction::Pick(name)) => {
                items.contains(&name).then(|| SelectionStep::Selected(name))
            }
            _ => None,
        };

        if let Some(next) = next {
            self.step = next;
        }
        &self.step
    }

    /// Timeout or supersession. Has no effect once the flow is finished.
    pub fn abandon(&mut self) {
        if !self.is_finished() {
            self.step = SelectionStep::Abandoned;
        }
    }
}

/// Identifies one open roll menu.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionTicket {
    pub user_id: u64,
    pub session_id: u64,
}

/// Open roll menus, at most one per user.
#[derive(Debug, Default)]
pub struct PendingSelections {
    sessions: Mutex<HashMap<u64, u64>>,
    next_session: AtomicU64,
}

impl PendingSelections {
    /// Open a menu for `user_id`, superseding any menu the user already has open.
    pub async fn begin(&self, user_id: u64) -> SelectionTicket {
        let session_id = self.next_session.fetch_add(1, Ordering::Relaxed) + 1;
        if let Some(previous) = self.sessions.lock().await.insert(user_id, session_id) {
            debug!(user_id, previous, session_id, "Superseded pending roll menu");
        }
        SelectionTicket { user_id, session_id }
    }

    /// Whether `ticket` is still the user's newest menu.
    pub async fn is_current(&self, ticket: SelectionTicket) -> bool {
        self.sessions.lock().await.get(&ticket.user_id) == Some(&ticket.session_id)
    }

    /// Close the menu, unless a newer one already replaced it.
    pub async fn finish(&self, ticket: SelectionTicket) {
        let mut sessions = self.sessions.lock().await;
        if sessions.get(&ticket.user_id) == Some(&ticket.session_id) {
            sessions.remove(&ticket.user_id);
        }
    }

    #[cfg(test)]
    async fn open_count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}
