//! HTTP client for the attention backend
//!
//! Posts metrics reports and exposes the read-only analytics, daily-summary
//! and preference endpoints used when configuring a session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::de::DeserializeOwned;

use crate::config::SyncConfig;
use crate::error::{Error, Result};

use super::publisher::MetricsReporter;
use super::report::{AttentionAnalytics, AttentionPreferences, DailySummary, MetricsReport};

/// HTTP client for the `/attention` API
pub struct MetricsClient {
    http_client: reqwest::Client,
    base_url: String,
}

impl MetricsClient {
    /// Create a new client from configuration
    ///
    /// Returns an error if the configuration is invalid or missing required fields.
    pub fn new(config: &SyncConfig) -> Result<Self> {
        config.validate()?;

        let base_url = config
            .server_url
            .clone()
            .ok_or_else(|| Error::Config("sync.server_url is required".to_string()))?
            .trim_end_matches('/')
            .to_string();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));

        if let Some(token) = &config.api_token {
            let auth_value = format!("Bearer {}", token);
            headers.insert(
                AUTHORIZATION,
                HeaderValue::from_str(&auth_value)
                    .map_err(|e| Error::Config(format!("invalid api_token: {}", e)))?,
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

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `POST /attention/metrics`
    pub async fn post_metrics(&self, report: &MetricsReport) -> Result<()> {
        let response = self
            .http_client
            .post(self.url("/attention/metrics"))
            .json(report)
            .send()
            .await
            .map_err(|e| Error::Sync(format!("HTTP request failed: {}", e)))?;

        check_status(response).await.map(|_| ())
    }

    /// `GET /attention/analytics?days=N`
    pub async fn analytics(&self, days: u32) -> Result<AttentionAnalytics> {
        self.get_json("/attention/analytics", Some(days)).await
    }

    /// `GET /attention/daily-summary?days=N`
    pub async fn daily_summary(&self, days: u32) -> Result<Vec<DailySummary>> {
        self.get_json("/attention/daily-summary", Some(days)).await
    }

    /// `GET /attention/preferences`
    pub async fn preferences(&self) -> Result<AttentionPreferences> {
        self.get_json("/attention/preferences", None).await
    }

    /// `PUT /attention/preferences`, returning what the backend stored
    pub async fn update_preferences(
        &self,
        preferences: &AttentionPreferences,
    ) -> Result<AttentionPreferences> {
        let response = self
            .http_client
            .put(self.url("/attention/preferences"))
            .json(preferences)
            .send()
            .await
            .map_err(|e| Error::Sync(format!("HTTP request failed: {}", e)))?;

        parse_body(check_status(response).await?).await
    }

    /// `DELETE /attention`: ask the backend to erase all attention data
    pub async fn delete_all_data(&self) -> Result<()> {
        let response = self
            .http_client
            .delete(self.url("/attention"))
            .send()
            .await
            .map_err(|e| Error::Sync(format!("HTTP request failed: {}", e)))?;

        check_status(response).await.map(|_| ())
    }

    async fn get_json<T: DeserializeOwned>(&self, path: &str, days: Option<u32>) -> Result<T> {
        let mut request = self.http_client.get(self.url(path));
        if let Some(days) = days {
            request = request.query(&[("days", days)]);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Sync(format!("HTTP request failed: {}", e)))?;

        parse_body(check_status(response).await?).await
    }
}

#[async_trait]
impl MetricsReporter for MetricsClient {
    async fn report(&self, report: &MetricsReport) -> Result<()> {
        self.post_metrics(report).await
    }
}

/// Read the whole body, then decode it; malformed JSON surfaces as [`Error::Json`]
async fn parse_body<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
    let body = response
        .text()
        .await
        .map_err(|e| Error::Sync(format!("failed to read response: {}", e)))?;
    Ok(serde_json::from_str(&body)?)
}

async fn check_status(response: reqwest::Response) -> Result<reqwest::Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let error_text = response
        .text()
        .await
        .unwrap_or_else(|_| "unknown".to_string());
    Err(Error::Sync(format!("API error ({}): {}", status, error_text)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_client_requires_server_url() {
        let config = SyncConfig {
            enabled: true,
            ..Default::default()
        };
        assert!(MetricsClient::new(&config).is_err());
    }

    #[test]
    fn test_client_trims_trailing_slash() {
        let config = SyncConfig {
            enabled: true,
            server_url: Some("https://study.example.com/api/".to_string()),
            api_token: Some("token".to_string()),
            ..Default::default()
        };
        let client = MetricsClient::new(&config).unwrap();
        assert_eq!(
            client.url("/attention/metrics"),
            "https://study.example.com/api/attention/metrics"
        );
    }

    #[test]
    fn test_client_rejects_unprintable_token() {
        let config = SyncConfig {
            enabled: true,
            server_url: Some("https://study.example.com".to_string()),
            api_token: Some("bad\ntoken".to_string()),
            ..Default::default()
        };
        assert!(MetricsClient::new(&config).is_err());
    }
}
