use crate::domain::{
    DomainError, DomainResult, EncryptedPayload, FeedPublisher, FeedSubscriber, RawEventStream,
};
use crate::firebase::decode_event_stream;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use reqwest::{Method, RequestBuilder};
use serde::Deserialize;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Connection settings for the Realtime Database REST API
#[derive(Debug, Clone)]
pub struct RtdbClientConfig {
    pub database_url: String,
    pub auth_token: Option<String>,
    pub request_timeout: Duration,
    /// A subscription with no bytes (not even keep-alives) for this long is treated as lost
    pub stream_idle_timeout: Duration,
}

/// Realtime Database client: streaming subscriptions and child pushes over REST
pub struct RtdbClient {
    http: reqwest::Client,
    database_url: String,
    auth_token: Option<String>,
    request_timeout: Duration,
    stream_idle_timeout: Duration,
}

#[derive(Debug, Deserialize)]
struct PushResponse {
    name: String,
}

impl RtdbClient {
    pub fn new(config: RtdbClientConfig) -> Result<Self> {
        info!(database_url = %config.database_url, "creating Realtime Database client");

        // No overall timeout: subscriptions are long-lived streams
        let http = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(15))
            .build()
            .context("Failed to build Realtime Database HTTP client")?;

        Ok(Self {
            http,
            database_url: config.database_url.trim_end_matches('/').to_string(),
            auth_token: config.auth_token.filter(|token| !token.is_empty()),
            request_timeout: config.request_timeout,
            stream_idle_timeout: config.stream_idle_timeout,
        })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}.json", self.database_url, path.trim_matches('/'))
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        let builder = self.http.request(method, self.endpoint(path));
        match &self.auth_token {
            Some(token) => builder.query(&[("auth", token)]),
            None => builder,
        }
    }
}

#[async_trait]
impl FeedSubscriber for RtdbClient {
    #[instrument(skip(self))]
    async fn subscribe(&self, path: &str) -> DomainResult<RawEventStream> {
        let response = self
            .request(Method::GET, path)
            .header(ACCEPT, "text/event-stream")
            .send()
            .await
            .map_err(|e| DomainError::FeedError(format!("failed to open stream: {}", e)))?
            .error_for_status()
            .map_err(|e| DomainError::FeedError(format!("stream rejected: {}", e)))?;

        debug!(status = %response.status(), "event stream opened");

        Ok(decode_event_stream(
            response.bytes_stream(),
            self.stream_idle_timeout,
        ))
    }
}

#[async_trait]
impl FeedPublisher for RtdbClient {
    #[instrument(skip(self, payload))]
    async fn push(&self, path: &str, payload: &EncryptedPayload) -> DomainResult<String> {
        let response = self
            .request(Method::POST, path)
            .timeout(self.request_timeout)
            .json(payload.as_str())
            .send()
            .await
            .map_err(|e| DomainError::FeedError(format!("push failed: {}", e)))?
            .error_for_status()
            .map_err(|e| DomainError::FeedError(format!("push rejected: {}", e)))?;

        let body: PushResponse = response
            .json()
            .await
            .map_err(|e| DomainError::FeedError(format!("unexpected push response: {}", e)))?;

        Ok(body.name)
    }
}
