use serde::Serialize;

pub const DEFAULT_HELP_COOKIE: &str = "search-help-hidden";
pub const DEFAULT_RETENTION_DAYS: u32 = 30;
pub const MAX_RETENTION_DAYS: u32 = 400;

/// Value written while the help panel is hidden.
pub const HIDDEN_MARKER: &str = "y";

/// Name and lifetime of the help-panel cookie.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct HelpCookie {
    pub name: String,
    pub retention_days: u32,
}

impl Default for HelpCookie {
    fn default() -> Self {
        Self {
            name: DEFAULT_HELP_COOKIE.to_string(),
            retention_days: DEFAULT_RETENTION_DAYS,
        }
    }
}

impl HelpCookie {
    pub fn new(name: &str, retention_days: u32) -> Self {
        Self {
            name: name.to_string(),
            retention_days,
        }
    }
}

/// What the page does to the cookie jar on entering a help-panel state.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
#[serde(tag = "op", rename_all = "lowercase")]
pub enum CookieAction {
    Set { value: &'static str, days: u32 },
    Remove,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpPanel {
    Shown,
    Hidden,
}

impl HelpPanel {
    pub fn toggled(self) -> Self {
        match self {
            Self::Shown => Self::Hidden,
            Self::Hidden => Self::Shown,
        }
    }

    /// Text of the link that flips the panel out of this state.
    pub fn toggle_label(self) -> &'static str {
        match self {
            Self::Shown => "Hide this help",
            Self::Hidden => "Show search help",
        }
    }

    /// Hiding stores the marker for the retention window; showing removes it.
    pub fn cookie_action(self, cookie: &HelpCookie) -> CookieAction {
        match self {
            Self::Hidden => CookieAction::Set {
                value: HIDDEN_MARKER,
                days: cookie.retention_days,
            },
            Self::Shown => CookieAction::Remove,
        }
    }
}
