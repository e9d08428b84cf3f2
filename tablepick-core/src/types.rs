//! Core domain types for tablepick analytics
//!
//! The data model is deliberately small:
//!
//! | Term | Definition |
//! |------|------------|
//! | **Event** | One instrumented user action, immutable once created |
//! | **EventKind** | Closed enumeration of the actions the app instruments |
//! | **Properties** | Open key/value payload attached to an event; shape varies per kind |
//! | **AttributionRecord** | First-touch UTM parameters captured on landing |
//! | **ClientEnv** | Environment facts (user agent, referrer, screen) supplied by the embedding app |
//! | **DrawOutcome** | What a draw produced: a catalog restaurant or a custom entry |
//!
//! Events carry no database id; identity is implicit. A remote store may
//! assign one on insert, but nothing in this crate depends on it.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::attribution::AttributionRecord;

/// Open key/value payload attached to an event.
///
/// The taxonomy of property shapes varies per event kind (`mode_selected`
/// carries `{mode, previous_mode}`, `draw_result` carries `{result}`, ...)
/// and is not meant to be exhaustively typed.
pub type Properties = serde_json::Map<String, serde_json::Value>;

// ============================================
// Event kinds
// ============================================

/// The closed set of instrumented action types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventKind {
    /// Application started
    AppLaunch,
    /// A page was viewed
    PageView,
    /// Draw mode changed (system catalog vs custom list)
    ModeSelected,
    /// Draw button pressed
    DrawClicked,
    /// Draw result shown
    DrawResult,
    /// "Draw again" pressed
    DrawAgain,
    /// Share button pressed
    ShareClicked,
    /// Restaurant added to favorites
    FavoriteAdded,
    /// Restaurant removed from favorites
    FavoriteRemoved,
    /// Custom restaurant added to the user's list
    CustomItemAdded,
    /// Custom restaurant removed from the user's list
    CustomItemRemoved,
}

impl EventKind {
    /// Returns the identifier used on the wire and in storage
    pub fn as_str(&self) -> &'static str {
        match self {
            EventKind::AppLaunch => "app_launch",
            EventKind::PageView => "page_view",
            EventKind::ModeSelected => "mode_selected",
            EventKind::DrawClicked => "draw_clicked",
            EventKind::DrawResult => "draw_result",
            EventKind::DrawAgain => "draw_again",
            EventKind::ShareClicked => "share_clicked",
            EventKind::FavoriteAdded => "favorite_added",
            EventKind::FavoriteRemoved => "favorite_removed",
            EventKind::CustomItemAdded => "custom_item_added",
            EventKind::CustomItemRemoved => "custom_item_removed",
        }
    }
}

impl std::fmt::Display for EventKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl std::str::FromStr for EventKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "app_launch" => Ok(EventKind::AppLaunch),
            "page_view" => Ok(EventKind::PageView),
            "mode_selected" => Ok(EventKind::ModeSelected),
            "draw_clicked" => Ok(EventKind::DrawClicked),
            "draw_result" => Ok(EventKind::DrawResult),
            "draw_again" => Ok(EventKind::DrawAgain),
            "share_clicked" => Ok(EventKind::ShareClicked),
            "favorite_added" => Ok(EventKind::FavoriteAdded),
            "favorite_removed" => Ok(EventKind::FavoriteRemoved),
            "custom_item_added" => Ok(EventKind::CustomItemAdded),
            "custom_item_removed" => Ok(EventKind::CustomItemRemoved),
            _ => Err(format!("unknown event kind: {}", s)),
        }
    }
}

// ============================================
// Events
// ============================================

/// One tracked user action.
///
/// Immutable once created. The local journal stores events as-is; the
/// remote sink wraps them in [`crate::collector::EventRecord`] which adds
/// send-time environment fields.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// What happened
    #[serde(rename = "event_type")]
    pub kind: EventKind,
    /// Anonymous device-scoped user identifier
    pub user_id: String,
    /// Rolling session identifier (30-minute inactivity timeout)
    pub session_id: String,
    /// When the event was created (RFC 3339 on the wire)
    pub timestamp: DateTime<Utc>,
    /// First-touch UTM attribution, flattened into the event
    #[serde(flatten)]
    pub attribution: AttributionRecord,
    /// Event-specific payload
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<Properties>,
}

impl Event {
    /// Property value under `key`, if the event carries one.
    pub fn property(&self, key: &str) -> Option<&serde_json::Value> {
        self.properties.as_ref().and_then(|p| p.get(key))
    }
}

// ============================================
// Environment facts
// ============================================

/// Environment facts supplied by the embedding app at startup.
///
/// The analytics core never inspects the platform itself; whatever the
/// caller can provide is forwarded (landing URL for attribution, referrer
/// and user agent for the remote schema, screen size for `app_launch`).
#[derive(Debug, Clone, Default)]
pub struct ClientEnv {
    /// Full landing URL including the query string
    pub landing_url: Option<String>,
    /// Document referrer, if any
    pub referrer: Option<String>,
    /// User-agent string of the embedding client
    pub user_agent: Option<String>,
    /// Screen width in pixels
    pub screen_width: Option<u32>,
    /// Screen height in pixels
    pub screen_height: Option<u32>,
}

// ============================================
// Draw outcomes
// ============================================

/// What a draw produced.
///
/// The app draws either from its built-in restaurant catalog or from the
/// user's custom list. Events carry only the display name (the `result`
/// property of `draw_result`); this type exists so callers build that
/// property from a tagged value instead of an untyped union.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DrawOutcome {
    /// A restaurant from the built-in catalog
    Restaurant { name: String },
    /// An entry from the user's custom list
    Custom { name: String },
}

impl DrawOutcome {
    /// The display name recorded under the `result` property key.
    pub fn display_name(&self) -> &str {
        match self {
            DrawOutcome::Restaurant { name } => name,
            DrawOutcome::Custom { name } => name,
        }
    }
}
