//! # tablepick-core
//!
//! Client-side analytics core for tablepick, a restaurant-decision app.
//!
//! This library provides:
//! - Anonymous identity, session and first-touch UTM attribution
//! - A bounded local event journal plus an optional remote event sink
//! - A tracking facade the app instruments against
//! - A pure aggregation engine (conversion, retention, trends, channels)
//!
//! ## Architecture
//!
//! Writes are local-first: [`Tracker::track`] appends to the durable
//! journal synchronously and forwards a copy to the sink fire-and-forget.
//! Reads are pure: the aggregation engine computes every metric from
//! (events, clock) with no hidden state, against either the remote store
//! or the local journal.
//!
//! ## Example
//!
//! ```rust,no_run
//! use tablepick_core::{ClientEnv, Config, StateStore, Tracker};
//!
//! let env = ClientEnv {
//!     landing_url: Some("https://tablepick.example.com/?utm_source=kol".into()),
//!     ..Default::default()
//! };
//! let tracker = Tracker::new(StateStore::open(Config::state_path()), env);
//! tracker.init();
//! ```

// Re-export commonly used items at the crate root
pub use attribution::{parse_utm_params, AttributionRecord};
pub use collector::{dispatch, EventApiClient, EventRecord, EventStore};
pub use config::Config;
pub use db::SqliteEventStore;
pub use error::{Error, Result};
pub use state::{SessionTracker, StateStore};
pub use tracker::Tracker;
pub use types::*;

// Public modules
pub mod analytics;
pub mod attribution;
pub mod collector;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod state;
pub mod tracker;
pub mod types;
