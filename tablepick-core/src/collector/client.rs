//! HTTP client for the remote event store API
//!
//! Thin wrapper over a small REST surface: `POST /events` to append,
//! `GET /events` and `GET /events/users` for windowed reads, and
//! `GET /health` for connectivity checks. Authentication is a bearer
//! API key from [`SinkConfig`].
//!
//! Writes are single-shot. Delivery guarantees live in the dispatch
//! layer, not here; a failed request is simply an error to the caller.

use std::collections::HashSet;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Deserialize;

use crate::config::SinkConfig;
use crate::error::{Error, Result};
use crate::types::{Event, EventKind};

use super::events::EventRecord;
use super::EventStore;

/// Response from GET /events
#[derive(Debug, Deserialize)]
struct EventsResponse {
    events: Vec<Event>,
}

/// Response from GET /events/users
#[derive(Debug, Deserialize)]
struct UsersResponse {
    user_ids: Vec<String>,
}

/// HTTP client for the remote event store.
pub struct EventApiClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl EventApiClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: SinkConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("sink.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        // Build default headers
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        // Add authorization header
        if let Some(api_key) = &config.api_key {
            let auth_value = format!("Bearer {}", api_key);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_key: {}", e)))?,
            );
        }

        let http_client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .default_headers(headers)
            .build()
            .map_err(|e| Error::Config(format!("failed to create HTTP client: {}", e)))?;

        Ok(Self {
            http_client,
            base_url,
        })
    }

    /// Check if the client can reach the server
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/health", self.base_url);

        match self.http_client.get(&url).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(_) => Ok(false),
        }
    }

    async fn get_events(&self, query: &[(&str, String)]) -> Result<Vec<Event>> {
        let url = format!("{}/events", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Store(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: EventsResponse = response
                .json()
                .await
                .map_err(|e| Error::Store(format!("failed to parse response: {}", e)))?;
            Ok(result.events)
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Store(format!("API error ({}): {}", status, error_text)))
        }
    }

    async fn get_users(&self, query: &[(&str, String)]) -> Result<HashSet<String>> {
        let url = format!("{}/events/users", self.base_url);

        let response = self
            .http_client
            .get(&url)
            .query(query)
            .send()
            .await
            .map_err(|e| Error::Store(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            let result: UsersResponse = response
                .json()
                .await
                .map_err(|e| Error::Store(format!("failed to parse response: {}", e)))?;
            Ok(result.user_ids.into_iter().collect())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Store(format!("API error ({}): {}", status, error_text)))
        }
    }
}

#[async_trait]
impl EventStore for EventApiClient {
    async fn append(&self, record: &EventRecord) -> Result<()> {
        let url = format!("{}/events", self.base_url);

        let response = self
            .http_client
            .post(&url)
            .json(record)
            .send()
            .await
            .map_err(|e| Error::Store(format!("HTTP request failed: {}", e)))?;

        let status = response.status();

        if status.is_success() {
            Ok(())
        } else {
            let error_text = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown".to_string());
            Err(Error::Store(format!("API error ({}): {}", status, error_text)))
        }
    }

    async fn recent_events(&self, limit: usize) -> Result<Vec<Event>> {
        self.get_events(&[("limit", limit.to_string()), ("order", "desc".to_string())])
            .await
    }

    async fn events_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Event>> {
        self.get_events(&[("since", start.to_rfc3339()), ("until", end.to_rfc3339())])
            .await
    }

    async fn user_ids_with_kind(
        &self,
        kind: EventKind,
        since: Option<DateTime<Utc>>,
    ) -> Result<HashSet<String>> {
        let mut query = vec![("kind", kind.as_str().to_string())];
        if let Some(since) = since {
            query.push(("since", since.to_rfc3339()));
        }
        self.get_users(&query).await
    }

    async fn user_ids_between(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<HashSet<String>> {
        self.get_users(&[("since", start.to_rfc3339()), ("until", end.to_rfc3339())])
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_valid_config() {
        let config = SinkConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(EventApiClient::new(config).is_err());
    }

    #[test]
    fn test_client_with_valid_config() {
        let config = SinkConfig {
            enabled: true,
            server_url: Some("https://events.example.com/".to_string()),
            api_key: Some("tp_live_test".to_string()),
            ..Default::default()
        };
        let client = EventApiClient::new(config).unwrap();
        // Trailing slash stripped so path joins stay clean.
        assert_eq!(client.base_url, "https://events.example.com");
    }
}
