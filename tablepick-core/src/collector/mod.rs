//! Remote event sink
//!
//! Optional integration with an HTTP event store, enabling the app to push
//! tracked events to a central backend for cross-device aggregation.
//!
//! ## Architecture
//!
//! The sink follows a "local-first" principle:
//! - Events are always appended to the local journal first
//! - Publishing happens asynchronously after the local append
//! - Network failures never block or fail the tracking call
//!
//! Writes are fire-and-forget with at-most-once delivery: a failed send is
//! logged and dropped, never retried. The local journal remains the source
//! of truth on the device.
//!
//! ## Usage
//!
//! Enable the sink in `~/.config/tablepick/config.toml`:
//!
//! ```toml
//! [sink]
//! enabled = true
//! server_url = "https://events.example.com"
//! api_key = "tp_live_xxxxxxxxxxxx"
//! ```

mod client;
mod events;

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio::task::JoinHandle;

use crate::error::Result;
use crate::types::{Event, EventKind};

pub use client::EventApiClient;
pub use events::EventRecord;

/// Storage backend for tracked events.
///
/// Implemented by the HTTP client ([`EventApiClient`]) and by the local
/// SQLite store ([`crate::db::SqliteEventStore`]). Reads return plain
/// [`Event`]s so the aggregation layer works identically over both.
#[async_trait]
pub trait EventStore: Send + Sync {
    /// Append one event record.
    async fn append(&self, record: &EventRecord) -> Result<()>;

    /// The most recent events, newest first, at most `limit`.
    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>>;

    /// Events with `start <= timestamp < end`, oldest first.
    async fn events_between(&self, start: DateTime<Utc>, end: DateTime<Utc>)
        -> Result<Vec<Event>>;

    /// Distinct user ids that produced an event of `kind`, optionally
    /// restricted to `timestamp >= since`.
    async fn user_ids_with_kind(
        &self,
        kind: EventKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>>;

    /// Distinct user ids active in `start <= timestamp < end`.
    async fn user_ids_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashSet<String>>;
}

/// Hand a record to the sink without waiting for the outcome.
///
/// Spawns the send onto the ambient tokio runtime. Outside a runtime the
/// record is dropped with a warning; tracking still succeeded locally.
/// The returned handle is for tests that need to await delivery.
pub fn dispatch(store: Arc<dyn EventStore>, record: EventRecord) -> Option<JoinHandle<()>> {
    let handle = match tokio::runtime::Handle::try_current() {
        Ok(handle) => handle,
        Err(_) => {
            tracing::warn!(
                kind = %record.event.kind,
                "no async runtime, remote event dropped"
            );
            return None;
        }
    };

    Some(handle.spawn(async move {
        if let Err(e) = store.append(&record).await {
            tracing::warn!(
                kind = %record.event.kind,
                error = %e,
                "remote event send failed, dropping"
            );
        }
    }))
}
