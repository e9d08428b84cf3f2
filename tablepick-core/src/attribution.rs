//! UTM attribution capture
//!
//! Marketing links carry a fixed set of five query parameters
//! (`utm_source`, `utm_medium`, `utm_campaign`, `utm_content`, `utm_term`).
//! They are parsed from the landing URL once and persisted under a
//! first-touch policy: the first non-empty record wins for the lifetime of
//! the installation, later landings never overwrite it. Persistence lives
//! in [`crate::state::StateStore`]; this module owns the record type and
//! the URL parsing.

use serde::{Deserialize, Serialize};
use url::Url;

/// First-touch UTM parameters.
///
/// Absent keys are omitted, never serialized as null or empty string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AttributionRecord {
    /// Channel source (e.g. canteen/biaobai/qzone/kol/dorm)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_source: Option<String>,
    /// Medium (e.g. offline/social/kol/qr)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_medium: Option<String>,
    /// Campaign name (e.g. w1_launch)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_campaign: Option<String>,
    /// Creative variant (e.g. copyA/copyB)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_content: Option<String>,
    /// Free-form tag (e.g. dorm-3-414)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub utm_term: Option<String>,
}

impl AttributionRecord {
    /// True when no UTM key is present at all.
    pub fn is_empty(&self) -> bool {
        self.utm_source.is_none()
            && self.utm_medium.is_none()
            && self.utm_campaign.is_none()
            && self.utm_content.is_none()
            && self.utm_term.is_none()
    }
}

/// Extract the five fixed UTM keys from a landing URL.
///
/// Unparsable URLs and missing keys are not errors: the result is simply
/// an empty (or partial) record. An empty query-string value counts as
/// absent.
pub fn parse_utm_params(landing_url: &str) -> AttributionRecord {
    let Ok(url) = Url::parse(landing_url) else {
        tracing::debug!(url = landing_url, "landing URL not parsable, no attribution");
        return AttributionRecord::default();
    };

    let mut record = AttributionRecord::default();
    for (key, value) in url.query_pairs() {
        if value.is_empty() {
            continue;
        }
        let value = value.into_owned();
        match key.as_ref() {
            "utm_source" => record.utm_source = Some(value),
            "utm_medium" => record.utm_medium = Some(value),
            "utm_campaign" => record.utm_campaign = Some(value),
            "utm_content" => record.utm_content = Some(value),
            "utm_term" => record.utm_term = Some(value),
            _ => {}
        }
    }
    record
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_set() {
        let record = parse_utm_params(
            "https://tablepick.example.com/?utm_source=kol&utm_medium=social\
             &utm_campaign=w1_launch&utm_content=copyA&utm_term=dorm-3-414",
        );
        assert_eq!(record.utm_source.as_deref(), Some("kol"));
        assert_eq!(record.utm_medium.as_deref(), Some("social"));
        assert_eq!(record.utm_campaign.as_deref(), Some("w1_launch"));
        assert_eq!(record.utm_content.as_deref(), Some("copyA"));
        assert_eq!(record.utm_term.as_deref(), Some("dorm-3-414"));
    }

    #[test]
    fn test_parse_partial_and_foreign_params() {
        let record =
            parse_utm_params("https://tablepick.example.com/?utm_source=canteen&ref=ignored");
        assert_eq!(record.utm_source.as_deref(), Some("canteen"));
        assert!(record.utm_medium.is_none());
        assert!(!record.is_empty());
    }

    #[test]
    fn test_parse_no_query() {
        let record = parse_utm_params("https://tablepick.example.com/");
        assert!(record.is_empty());
    }

    #[test]
    fn test_parse_garbage_url() {
        let record = parse_utm_params("not a url at all");
        assert!(record.is_empty());
    }

    #[test]
    fn test_empty_value_treated_as_absent() {
        let record = parse_utm_params("https://tablepick.example.com/?utm_source=");
        assert!(record.utm_source.is_none());
        assert!(record.is_empty());
    }

    #[test]
    fn test_serde_omits_absent_keys() {
        let record = AttributionRecord {
            utm_source: Some("qzone".to_string()),
            ..Default::default()
        };
        let value = serde_json::to_value(&record).unwrap();
        let object = value.as_object().unwrap();
        assert_eq!(object.len(), 1);
        assert_eq!(object["utm_source"], "qzone");
    }
}
