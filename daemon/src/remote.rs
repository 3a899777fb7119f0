//! Client for the remote alarm source
//!
//! `GET <url>/alarms` with HTTP Basic auth returns
//! `{"alarms": [<epoch millis>, ...]}`. Failures come back as a non-2xx
//! status with `{"error": "<message>"}`.

use std::time::Duration;

use alarmsweet_core::{from_millis, AlarmTimestamp};
use chrono::{SecondsFormat, Utc};
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::config::RemoteConfig;

#[derive(Error, Debug)]
pub enum RemoteError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
    #[error("Remote source returned {status}: {message}")]
    Status { status: u16, message: String },
    #[error("Malformed payload: {0}")]
    Payload(#[from] serde_json::Error),
}

#[derive(Deserialize)]
struct AlarmsResponse {
    alarms: Vec<i64>,
}

#[derive(Deserialize)]
struct ErrorResponse {
    error: String,
}

#[derive(Deserialize)]
struct HealthResponse {
    ok: bool,
}

/// Fetches the authoritative alarm list
pub struct RemoteSource {
    client: reqwest::Client,
    base_url: String,
    username: Option<String>,
    password: Option<String>,
    window_days: Option<u32>,
}

impl RemoteSource {
    /// Build a client from the remote section of the config.
    ///
    /// # Errors
    /// Returns `RemoteError::Http` if the HTTP client cannot be created.
    pub fn new(config: &RemoteConfig) -> Result<Self, RemoteError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: config.url.trim_end_matches('/').to_string(),
            username: config.username.clone(),
            password: config.password.clone(),
            window_days: config.window_days,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn get(&self, endpoint: &str) -> reqwest::RequestBuilder {
        let request = self.client.get(format!("{}{}", self.base_url, endpoint));
        match &self.username {
            Some(user) => request.basic_auth(user, self.password.as_ref()),
            None => request,
        }
    }

    /// Fetch all alarms the source knows about, in seconds since the epoch.
    ///
    /// # Errors
    /// Returns `RemoteError` on transport failure, a non-2xx status or a
    /// body that is not an alarm list.
    pub async fn fetch(&self) -> Result<Vec<AlarmTimestamp>, RemoteError> {
        let mut request = self.get("/alarms");
        if let Some(days) = self.window_days {
            let from = Utc::now();
            let to = from + chrono::Duration::days(i64::from(days));
            request = request.query(&[
                ("from", from.to_rfc3339_opts(SecondsFormat::Millis, true)),
                ("to", to.to_rfc3339_opts(SecondsFormat::Millis, true)),
            ]);
        }

        let response = request.send().await?;
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            let message = serde_json::from_str::<ErrorResponse>(&body)
                .map(|e| e.error)
                .unwrap_or(body);
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let parsed: AlarmsResponse = serde_json::from_str(&body)?;
        debug!("Remote source returned {} alarms", parsed.alarms.len());

        Ok(parsed.alarms.into_iter().map(from_millis).collect())
    }

    /// Probe `GET /health`.
    ///
    /// # Returns
    /// True if the source answered `{"ok": true}`.
    pub async fn health(&self) -> Result<bool, RemoteError> {
        let response = self.client.get(format!("{}/health", self.base_url)).send().await?;
        if !response.status().is_success() {
            return Ok(false);
        }
        let health: HealthResponse = serde_json::from_str(&response.text().await?)?;
        Ok(health.ok)
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;
    use wiremock::matchers::{header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;

    fn config_for(server: &MockServer) -> RemoteConfig {
        RemoteConfig {
            url: format!("{}/", server.uri()),
            username: Some("alice".into()),
            password: Some("secret".into()),
            ..RemoteConfig::default()
        }
    }

    #[tokio::test]
    async fn test_fetch_converts_millis_and_sends_basic_auth() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .and(header("authorization", "Basic YWxpY2U6c2VjcmV0"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "alarms": [1_700_000_000_000i64, 1_700_000_060_999i64]
            })))
            .expect(1)
            .mount(&server)
            .await;

        let source = RemoteSource::new(&config_for(&server)).unwrap();
        let alarms = source.fetch().await.unwrap();
        assert_eq!(alarms, vec![1_700_000_000, 1_700_000_060]);
    }

    #[tokio::test]
    async fn test_fetch_reports_error_body() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .respond_with(
                ResponseTemplate::new(401).set_body_json(json!({"error": "bad credentials"})),
            )
            .mount(&server)
            .await;

        let source = RemoteSource::new(&config_for(&server)).unwrap();
        match source.fetch().await {
            Err(RemoteError::Status { status, message }) => {
                assert_eq!(status, 401);
                assert_eq!(message, "bad credentials");
            }
            other => panic!("expected status error, got {:?}", other.map(|_| ())),
        }
    }

    #[tokio::test]
    async fn test_fetch_rejects_malformed_payload() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .respond_with(ResponseTemplate::new(200).set_body_string("{\"alarms\": \"soon\"}"))
            .mount(&server)
            .await;

        let source = RemoteSource::new(&config_for(&server)).unwrap();
        assert!(matches!(source.fetch().await, Err(RemoteError::Payload(_))));
    }

    #[tokio::test]
    async fn test_fetch_sends_window() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/alarms"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"alarms": []})))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.window_days = Some(3);
        let source = RemoteSource::new(&config).unwrap();
        assert!(source.fetch().await.unwrap().is_empty());

        let requests = server.received_requests().await.unwrap();
        let keys: Vec<String> = requests[0]
            .url
            .query_pairs()
            .map(|(k, _)| k.into_owned())
            .collect();
        assert_eq!(keys, vec!["from", "to"]);
    }

    #[tokio::test]
    async fn test_health() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"ok": true})))
            .mount(&server)
            .await;

        let source = RemoteSource::new(&config_for(&server)).unwrap();
        assert_eq!(source.base_url(), server.uri());
        assert!(source.health().await.unwrap());
    }
}
