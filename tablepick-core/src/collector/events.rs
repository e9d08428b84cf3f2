//! Wire representation of tracked events
//!
//! The remote schema is the local [`Event`] plus two send-time environment
//! columns (`user_agent`, `referrer`). The local journal never stores
//! these; they are attached when a record leaves the device.

use serde::{Deserialize, Serialize};

use crate::types::{ClientEnv, Event};

/// One event as shipped to (and stored by) a remote event store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventRecord {
    /// The tracked event, flattened into the record
    #[serde(flatten)]
    pub event: Event,
    /// User-agent of the sending client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    /// Document referrer of the sending client
    #[serde(skip_serializing_if = "Option::is_none")]
    pub referrer: Option<String>,
}

impl EventRecord {
    /// Wrap a local event with the environment facts the remote schema wants.
    pub fn from_event(event: Event, env: &ClientEnv) -> Self {
        Self {
            event,
            user_agent: env.user_agent.clone(),
            referrer: env.referrer.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::attribution::AttributionRecord;
    use crate::types::EventKind;
    use chrono::Utc;

    #[test]
    fn test_record_serde_shape() {
        let event = Event {
            kind: EventKind::ShareClicked,
            user_id: "user_1_abc".to_string(),
            session_id: "session_1_abc".to_string(),
            timestamp: Utc::now(),
            attribution: AttributionRecord::default(),
            properties: None,
        };
        let env = ClientEnv {
            user_agent: Some("tablepick-test/1.0".to_string()),
            ..Default::default()
        };

        let record = EventRecord::from_event(event, &env);
        let value = serde_json::to_value(&record).unwrap();

        // Event fields are flattened to the top level next to the
        // environment columns.
        assert_eq!(value["event_type"], "share_clicked");
        assert_eq!(value["user_id"], "user_1_abc");
        assert_eq!(value["user_agent"], "tablepick-test/1.0");
        assert!(value.get("referrer").is_none());
        assert!(value.get("event").is_none());
    }
}
