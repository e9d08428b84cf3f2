//! Device-local analytics state
//!
//! Two stores with different lifetimes:
//!
//! - [`StateStore`]: durable per-installation state in one JSON file:
//!   anonymous user id, first-visit time, first-touch attribution, and the
//!   bounded local event journal. Single-writer, single-reader; a missing
//!   or corrupt file is treated as empty state, never as a failure.
//! - [`SessionTracker`]: volatile per-process session id with a 30-minute
//!   inactivity timeout. Intentionally lost when the process exits.
//!
//! All operations here are infallible from the caller's perspective:
//! persistence is best-effort and write errors are logged, not returned.
//! Analytics must never take the app down.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::attribution::AttributionRecord;
use crate::types::Event;

/// Maximum number of events kept in the local journal.
/// Oldest entries are evicted first once the cap is exceeded.
pub const LOCAL_LOG_CAPACITY: usize = 1000;

/// Inactivity gap after which a new session id is minted.
pub const SESSION_TIMEOUT_MINUTES: i64 = 30;

fn random_suffix() -> String {
    let hex = Uuid::new_v4().simple().to_string();
    hex[..8].to_string()
}

fn generate_user_id(now: DateTime<Utc>) -> String {
    format!("user_{}_{}", now.timestamp_millis(), random_suffix())
}

fn generate_session_id(now: DateTime<Utc>) -> String {
    format!("session_{}_{}", now.timestamp_millis(), random_suffix())
}

// ============================================
// Durable state
// ============================================

/// On-disk shape of the durable state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    /// Anonymous per-installation user id, minted lazily on first access
    anonymous_user_id: Option<String>,
    /// When this installation was first seen
    first_visit_time: Option<DateTime<Utc>>,
    /// First-touch UTM attribution; write-once
    utm_params: Option<AttributionRecord>,
    /// Bounded local event journal, oldest first
    #[serde(default)]
    events: VecDeque<Event>,
}

/// Durable per-installation analytics state backed by a JSON file.
pub struct StateStore {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl StateStore {
    /// Open the state file at `path`, creating empty state if it is
    /// missing or unreadable. Corrupt JSON is treated as absence of data.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let state = Self::load(&path);
        Self {
            path,
            state: Mutex::new(state),
        }
    }

    fn load(path: &Path) -> StateFile {
        match std::fs::read_to_string(path) {
            Ok(content) => match serde_json::from_str(&content) {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "state file corrupt, starting fresh");
                    StateFile::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "state file unreadable, starting fresh");
                StateFile::default()
            }
        }
    }

    /// Best-effort persistence. Errors are logged, never surfaced.
    fn persist(&self, state: &StateFile) {
        if let Some(parent) = self.path.parent() {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(path = %self.path.display(), error = %e, "cannot create state dir");
                return;
            }
        }
        match serde_json::to_vec(state) {
            Ok(bytes) => {
                if let Err(e) = std::fs::write(&self.path, bytes) {
                    tracing::warn!(path = %self.path.display(), error = %e, "state write failed");
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "state serialization failed");
            }
        }
    }

    /// The anonymous user id for this installation.
    ///
    /// Minted and persisted on first access; every later call is a pure
    /// read returning the same value.
    pub fn user_id(&self) -> String {
        let mut state = self.state.lock().unwrap();
        if let Some(id) = &state.anonymous_user_id {
            return id.clone();
        }
        let id = generate_user_id(Utc::now());
        tracing::info!(user_id = %id, "new anonymous user id created");
        state.anonymous_user_id = Some(id.clone());
        self.persist(&state);
        id
    }

    /// When this installation was first seen. Lazy-create-once, like
    /// [`Self::user_id`].
    pub fn first_visit(&self) -> DateTime<Utc> {
        let mut state = self.state.lock().unwrap();
        if let Some(ts) = state.first_visit_time {
            return ts;
        }
        let now = Utc::now();
        state.first_visit_time = Some(now);
        self.persist(&state);
        now
    }

    /// Stored first-touch attribution, or an empty record if none exists.
    pub fn attribution(&self) -> AttributionRecord {
        let state = self.state.lock().unwrap();
        state.utm_params.clone().unwrap_or_default()
    }

    /// Persist `record` under the first-touch policy.
    ///
    /// Stores nothing when `record` has no keys at all, and is a silent
    /// no-op when a record is already stored.
    pub fn save_attribution(&self, record: AttributionRecord) {
        if record.is_empty() {
            return;
        }
        let mut state = self.state.lock().unwrap();
        if state.utm_params.is_some() {
            tracing::debug!("attribution already captured, keeping first touch");
            return;
        }
        tracing::info!(?record, "first-touch attribution saved");
        state.utm_params = Some(record);
        self.persist(&state);
    }

    /// Append an event to the bounded local journal, evicting from the
    /// front once [`LOCAL_LOG_CAPACITY`] is exceeded.
    pub fn append_event(&self, event: Event) {
        let mut state = self.state.lock().unwrap();
        state.events.push_back(event);
        while state.events.len() > LOCAL_LOG_CAPACITY {
            state.events.pop_front();
        }
        self.persist(&state);
    }

    /// Snapshot of the local journal, oldest first.
    pub fn events(&self) -> Vec<Event> {
        let state = self.state.lock().unwrap();
        state.events.iter().cloned().collect()
    }

    /// Number of events currently in the local journal.
    pub fn event_count(&self) -> usize {
        let state = self.state.lock().unwrap();
        state.events.len()
    }

    /// Explicit reset of the local journal. Identity and attribution are
    /// kept; only `clear_all` removes those.
    pub fn clear_events(&self) {
        let mut state = self.state.lock().unwrap();
        state.events.clear();
        self.persist(&state);
        tracing::info!("local event journal cleared");
    }

    /// Full data-clear: identity, first-visit, attribution and journal.
    pub fn clear_all(&self) {
        let mut state = self.state.lock().unwrap();
        *state = StateFile::default();
        self.persist(&state);
        tracing::info!("all local analytics state cleared");
    }
}

// ============================================
// Volatile session state
// ============================================

struct SessionSlot {
    id: String,
    last_activity: DateTime<Utc>,
}

/// Rolling session id with timeout-based renewal.
///
/// A session is a contiguous run of activity with gaps shorter than
/// [`SESSION_TIMEOUT_MINUTES`]. Reading the id always refreshes the
/// last-activity timestamp. State is process-local and volatile, the
/// analog of per-tab session storage.
pub struct SessionTracker {
    timeout: Duration,
    current: Mutex<Option<SessionSlot>>,
}

impl SessionTracker {
    pub fn new() -> Self {
        Self {
            timeout: Duration::minutes(SESSION_TIMEOUT_MINUTES),
            current: Mutex::new(None),
        }
    }

    /// The current session id, minting a new one if the inactivity gap
    /// exceeded the timeout. Side effect: refreshes last-activity.
    pub fn session_id(&self) -> String {
        self.session_id_at(Utc::now())
    }

    /// Timeout logic with an injectable clock, for tests.
    pub fn session_id_at(&self, now: DateTime<Utc>) -> String {
        let mut current = self.current.lock().unwrap();
        if let Some(slot) = current.as_mut() {
            if now.signed_duration_since(slot.last_activity) < self.timeout {
                slot.last_activity = now;
                return slot.id.clone();
            }
        }
        let id = generate_session_id(now);
        tracing::debug!(session_id = %id, "new session started");
        *current = Some(SessionSlot {
            id: id.clone(),
            last_activity: now,
        });
        id
    }
}

impl Default for SessionTracker {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::EventKind;
    use tempfile::TempDir;

    fn temp_store() -> (TempDir, StateStore) {
        let dir = TempDir::new().unwrap();
        let store = StateStore::open(dir.path().join("state.json"));
        (dir, store)
    }

    fn make_event(kind: EventKind, user_id: &str, seq: i64) -> Event {
        Event {
            kind,
            user_id: user_id.to_string(),
            session_id: "session_test".to_string(),
            timestamp: Utc::now() + Duration::milliseconds(seq),
            attribution: AttributionRecord::default(),
            properties: Some(
                [("seq".to_string(), serde_json::json!(seq))]
                    .into_iter()
                    .collect(),
            ),
        }
    }

    #[test]
    fn test_user_id_idempotent_and_persisted() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");

        let store = StateStore::open(&path);
        let first = store.user_id();
        assert!(first.starts_with("user_"));
        assert_eq!(store.user_id(), first);
        assert_eq!(store.user_id(), first);

        // Survives reopen.
        let reopened = StateStore::open(&path);
        assert_eq!(reopened.user_id(), first);
    }

    #[test]
    fn test_first_visit_stable() {
        let (_dir, store) = temp_store();
        let first = store.first_visit();
        assert_eq!(store.first_visit(), first);
    }

    #[test]
    fn test_first_touch_attribution() {
        let (_dir, store) = temp_store();
        store.save_attribution(AttributionRecord {
            utm_source: Some("a".to_string()),
            ..Default::default()
        });
        store.save_attribution(AttributionRecord {
            utm_source: Some("b".to_string()),
            ..Default::default()
        });
        assert_eq!(store.attribution().utm_source.as_deref(), Some("a"));
    }

    #[test]
    fn test_empty_attribution_not_stored() {
        let (_dir, store) = temp_store();
        store.save_attribution(AttributionRecord::default());
        assert!(store.attribution().is_empty());

        // An empty record must not consume the first-touch slot.
        store.save_attribution(AttributionRecord {
            utm_source: Some("kol".to_string()),
            ..Default::default()
        });
        assert_eq!(store.attribution().utm_source.as_deref(), Some("kol"));
    }

    #[test]
    fn test_bounded_journal_keeps_most_recent() {
        let (_dir, store) = temp_store();
        for seq in 0..1005 {
            store.append_event(make_event(EventKind::PageView, "u1", seq));
        }
        let events = store.events();
        assert_eq!(events.len(), LOCAL_LOG_CAPACITY);
        // The five oldest were evicted; relative order preserved.
        assert_eq!(events[0].property("seq").unwrap(), 5);
        assert_eq!(events[999].property("seq").unwrap(), 1004);
    }

    #[test]
    fn test_corrupt_state_file_recovers() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("state.json");
        std::fs::write(&path, b"{not json!").unwrap();

        let store = StateStore::open(&path);
        assert!(store.events().is_empty());
        assert!(store.attribution().is_empty());
        // Fresh identity is minted despite the corrupt file.
        assert!(store.user_id().starts_with("user_"));
    }

    #[test]
    fn test_clear_events_keeps_identity() {
        let (_dir, store) = temp_store();
        let id = store.user_id();
        store.append_event(make_event(EventKind::DrawClicked, "u1", 0));
        store.clear_events();
        assert_eq!(store.event_count(), 0);
        assert_eq!(store.user_id(), id);
    }

    #[test]
    fn test_session_renewed_after_timeout() {
        let tracker = SessionTracker::new();
        let t0 = Utc::now();
        let first = tracker.session_id_at(t0);

        // 10 minutes later: same session.
        let same = tracker.session_id_at(t0 + Duration::minutes(10));
        assert_eq!(same, first);

        // 10 + 31 minutes of silence: new session.
        let renewed = tracker.session_id_at(t0 + Duration::minutes(41));
        assert_ne!(renewed, first);
        assert!(renewed.starts_with("session_"));
    }

    #[test]
    fn test_session_activity_refresh_extends_session() {
        let tracker = SessionTracker::new();
        let t0 = Utc::now();
        let first = tracker.session_id_at(t0);

        // Reads every 20 minutes keep refreshing last-activity, so the
        // session survives well past 30 minutes of total elapsed time.
        let mut t = t0;
        for _ in 0..4 {
            t += Duration::minutes(20);
            assert_eq!(tracker.session_id_at(t), first);
        }
    }
}
