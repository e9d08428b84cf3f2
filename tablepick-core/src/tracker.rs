//! Tracking facade
//!
//! The single entry point the app instruments against. A [`Tracker`]
//! owns identity, session, attribution and the local journal, and
//! optionally forwards every event to a remote sink.
//!
//! The contract of [`Tracker::track`] is strict: it returns immediately,
//! never fails, and never blocks the caller on the network. The local
//! append is synchronous and ordered; the remote send is fire-and-forget
//! with no ordering guarantee between events.

use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::analytics::{local_summary, ReportClock, SummaryOptions, TimeRange};
use crate::attribution::{parse_utm_params, AttributionRecord};
use crate::collector::{dispatch, EventRecord, EventStore};
use crate::error::Result;
use crate::state::{SessionTracker, StateStore};
use crate::types::{ClientEnv, DrawOutcome, Event, EventKind, Properties};

/// Analytics context for one application instance.
pub struct Tracker {
    state: StateStore,
    session: SessionTracker,
    env: ClientEnv,
    sink: Option<Arc<dyn EventStore>>,
}

impl Tracker {
    /// Build a tracker over durable state and the caller's environment
    /// facts. No sink: events stay in the local journal.
    pub fn new(state: StateStore, env: ClientEnv) -> Self {
        Self {
            state,
            session: SessionTracker::new(),
            env,
            sink: None,
        }
    }

    /// Attach a remote sink. Every tracked event is also dispatched to
    /// it, fire-and-forget.
    pub fn with_sink(mut self, sink: Arc<dyn EventStore>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Startup hook: ensure identity exists, capture first-touch
    /// attribution from the landing URL, and emit one `app_launch` event.
    ///
    /// Calling this twice re-derives the same identity but emits a second
    /// `app_launch`; callers guard against double invocation.
    pub fn init(&self) {
        let user_id = self.state.user_id();
        let first_visit = self.state.first_visit();

        if let Some(landing_url) = &self.env.landing_url {
            self.state.save_attribution(parse_utm_params(landing_url));
        }

        let mut props = Properties::new();
        props.insert("first_visit".to_string(), serde_json::json!(first_visit));
        props.insert(
            "referrer".to_string(),
            serde_json::json!(self.env.referrer.as_deref().unwrap_or("direct")),
        );
        if let Some(user_agent) = &self.env.user_agent {
            props.insert("user_agent".to_string(), serde_json::json!(user_agent));
        }
        if let Some(width) = self.env.screen_width {
            props.insert("screen_width".to_string(), serde_json::json!(width));
        }
        if let Some(height) = self.env.screen_height {
            props.insert("screen_height".to_string(), serde_json::json!(height));
        }

        tracing::info!(user_id = %user_id, "analytics initialized");
        self.track(EventKind::AppLaunch, Some(props));
    }

    /// Record one event.
    ///
    /// Appends to the local journal synchronously, then hands a copy to
    /// the sink without awaiting it. Never fails, never blocks.
    pub fn track(&self, kind: EventKind, properties: Option<Properties>) {
        let event = Event {
            kind,
            user_id: self.state.user_id(),
            session_id: self.session.session_id(),
            timestamp: Utc::now(),
            attribution: self.state.attribution(),
            properties,
        };

        tracing::debug!(kind = %event.kind, "event tracked");
        self.state.append_event(event.clone());

        if let Some(sink) = &self.sink {
            dispatch(Arc::clone(sink), EventRecord::from_event(event, &self.env));
        }
    }

    /// Record a `draw_result` event for `outcome`.
    pub fn track_draw_result(&self, outcome: &DrawOutcome) {
        let mut props = Properties::new();
        props.insert(
            "result".to_string(),
            serde_json::json!(outcome.display_name()),
        );
        self.track(EventKind::DrawResult, Some(props));
    }

    /// The anonymous user id, minting one on first use.
    pub fn user_id(&self) -> String {
        self.state.user_id()
    }

    /// The current session id, refreshing the activity timestamp.
    pub fn session_id(&self) -> String {
        self.session.session_id()
    }

    /// When this installation was first seen.
    pub fn first_visit(&self) -> DateTime<Utc> {
        self.state.first_visit()
    }

    /// Stored first-touch attribution.
    pub fn attribution(&self) -> AttributionRecord {
        self.state.attribution()
    }

    /// Snapshot of the local journal, oldest first.
    pub fn local_events(&self) -> Vec<Event> {
        self.state.events()
    }

    /// Reset the local journal. Identity and attribution are kept.
    pub fn clear_local_events(&self) {
        self.state.clear_events()
    }

    /// Export identity, attribution, the local journal and a summary
    /// computed over it, as pretty-printed JSON.
    pub fn export_json(&self) -> Result<String> {
        let events = self.state.events();
        let clock = ReportClock::system();
        let summary = local_summary(
            &events,
            TimeRange::ThisMonth,
            &clock,
            &SummaryOptions::default(),
        );

        let export = serde_json::json!({
            "user_id": self.state.user_id(),
            "first_visit": self.state.first_visit(),
            "attribution": self.state.attribution(),
            "event_count": events.len(),
            "summary": summary,
            "events": events,
        });
        Ok(serde_json::to_string_pretty(&export)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::SqliteEventStore;
    use tempfile::TempDir;

    fn tracker_in(dir: &TempDir, env: ClientEnv) -> Tracker {
        Tracker::new(StateStore::open(dir.path().join("state.json")), env)
    }

    #[test]
    fn test_track_appends_locally() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir, ClientEnv::default());

        let mut props = Properties::new();
        props.insert("mode".to_string(), serde_json::json!("system"));
        tracker.track(EventKind::DrawClicked, Some(props));

        let events = tracker.local_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::DrawClicked);
        assert_eq!(events[0].user_id, tracker.user_id());
        assert_eq!(events[0].property("mode").unwrap(), "system");
        assert!(events[0].session_id.starts_with("session_"));
    }

    #[test]
    fn test_init_captures_attribution_and_launch() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(
            &dir,
            ClientEnv {
                landing_url: Some(
                    "https://tablepick.example.com/?utm_source=canteen&utm_medium=qr".to_string(),
                ),
                referrer: None,
                user_agent: Some("tablepick-test/1.0".to_string()),
                screen_width: Some(390),
                screen_height: Some(844),
            },
        );

        tracker.init();

        assert_eq!(tracker.attribution().utm_source.as_deref(), Some("canteen"));
        let events = tracker.local_events();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, EventKind::AppLaunch);
        // No document referrer means the launch reports "direct".
        assert_eq!(events[0].property("referrer").unwrap(), "direct");
        assert_eq!(events[0].property("screen_width").unwrap(), 390);
        // Attribution saved before the launch event is built, so the
        // launch itself already carries it.
        assert_eq!(events[0].attribution.utm_source.as_deref(), Some("canteen"));
    }

    #[test]
    fn test_track_without_runtime_still_appends() {
        // A configured sink with no async runtime: the remote copy is
        // dropped but local tracking is unaffected.
        let dir = TempDir::new().unwrap();
        let sink: Arc<dyn EventStore> = Arc::new(SqliteEventStore::open_in_memory().unwrap());
        let tracker = tracker_in(&dir, ClientEnv::default()).with_sink(sink);

        tracker.track(EventKind::PageView, None);
        assert_eq!(tracker.local_events().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn test_sink_receives_tracked_events() {
        let dir = TempDir::new().unwrap();
        let store = Arc::new(SqliteEventStore::open_in_memory().unwrap());
        let tracker =
            tracker_in(&dir, ClientEnv::default()).with_sink(store.clone() as Arc<dyn EventStore>);

        tracker.track(EventKind::DrawClicked, None);

        // Delivery is fire-and-forget; give the spawned send a moment.
        let mut delivered = 0;
        for _ in 0..50 {
            delivered = store.event_count().unwrap();
            if delivered == 1 {
                break;
            }
            tokio::time::sleep(std::time::Duration::from_millis(10)).await;
        }
        assert_eq!(delivered, 1);
    }

    #[test]
    fn test_track_draw_result() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir, ClientEnv::default());

        tracker.track_draw_result(&DrawOutcome::Custom {
            name: "Dorm Dumplings".to_string(),
        });

        let events = tracker.local_events();
        assert_eq!(events[0].kind, EventKind::DrawResult);
        assert_eq!(events[0].property("result").unwrap(), "Dorm Dumplings");
    }

    #[test]
    fn test_export_json_shape() {
        let dir = TempDir::new().unwrap();
        let tracker = tracker_in(&dir, ClientEnv::default());
        tracker.track(EventKind::AppLaunch, None);
        tracker.track(EventKind::DrawClicked, None);

        let export: serde_json::Value =
            serde_json::from_str(&tracker.export_json().unwrap()).unwrap();
        assert_eq!(export["event_count"], 2);
        assert_eq!(export["user_id"], tracker.user_id());
        assert_eq!(export["summary"]["totals"]["draw_count"], 1);
        assert_eq!(export["events"].as_array().unwrap().len(), 2);
    }
}
