//! Tab and help-panel state.
//!
//! Everything mutable about the tabs of a page lives in one [`AppState`]:
//! which tab is active and which datasets have been loaded (or are in
//! flight). [`TabController`] owns an `AppState` together with the fetcher
//! and the loaded tables. The help panel is a two-state machine,
//! [`HelpPanel`], whose labels and cookie actions the page script runs.

pub mod controller;
pub mod preference;

use std::collections::HashMap;

pub use controller::{ControllerError, LoadedTable, Selection, TabController};
pub use preference::{CookieAction, HelpCookie, HelpPanel};

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TabState {
    NotLoaded,
    Loading,
    Loaded,
}

#[derive(Clone, Debug)]
pub struct AppState {
    order: Vec<String>,
    tabs: HashMap<String, TabState>,
    active: Option<String>,
}

impl AppState {
    pub fn new<I, S>(dataset_ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let order: Vec<String> = dataset_ids.into_iter().map(Into::into).collect();
        let tabs = order
            .iter()
            .map(|id| (id.clone(), TabState::NotLoaded))
            .collect();
        Self {
            order,
            tabs,
            active: None,
        }
    }

    pub fn tab_ids(&self) -> &[String] {
        &self.order
    }

    pub fn contains(&self, id: &str) -> bool {
        self.tabs.contains_key(id)
    }

    pub fn active_tab(&self) -> Option<&str> {
        self.active.as_deref()
    }

    /// Returns `false` for an unknown id and leaves the active tab unchanged.
    pub fn set_active(&mut self, id: &str) -> bool {
        if !self.contains(id) {
            return false;
        }
        self.active = Some(id.to_string());
        true
    }

    pub fn tab_state(&self, id: &str) -> Option<TabState> {
        self.tabs.get(id).copied()
    }

    pub fn is_loaded(&self, id: &str) -> bool {
        self.tab_state(id) == Some(TabState::Loaded)
    }

    /// True when nothing has finished loading yet.
    pub fn none_loaded(&self) -> bool {
        !self.tabs.values().any(|s| *s == TabState::Loaded)
    }

    /// Moves a tab from `NotLoaded` to `Loading`. Returns `false` (and changes
    /// nothing) when the tab is unknown, already loaded or in flight.
    pub fn begin_load(&mut self, id: &str) -> bool {
        match self.tabs.get_mut(id) {
            Some(state) if *state == TabState::NotLoaded => {
                *state = TabState::Loading;
                true
            }
            _ => false,
        }
    }

    /// A failed load goes back to `NotLoaded` so that selecting the tab again
    /// issues a fresh request.
    pub fn finish_load(&mut self, id: &str, ok: bool) {
        if let Some(state) = self.tabs.get_mut(id) {
            *state = if ok {
                TabState::Loaded
            } else {
                TabState::NotLoaded
            };
        }
    }
}
