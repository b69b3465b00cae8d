//! Persistence sink for push subscriptions.
//!
//! The server stores one record per installation and uses it to send push
//! messages. Failures here are never fatal to the caller.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tracing::debug;

use dealwire_core::defaults::{PUSH_SUBSCRIBE_PATH, PUSH_UNSUBSCRIBE_PATH};
use dealwire_core::logging::SUBSYSTEM_PUSH;
use dealwire_core::{Error, PushSubscriptionRecord, Result};

use crate::config::PushConfig;

#[async_trait]
pub trait SubscriptionSink: Send + Sync {
    /// Store or refresh a subscription.
    async fn register(&self, record: &PushSubscriptionRecord) -> Result<()>;

    /// Forget the subscription for `endpoint`.
    async fn remove(&self, endpoint: &str) -> Result<()>;
}

/// Sink backed by the dealwire HTTP API.
#[derive(Debug, Clone)]
pub struct HttpSubscriptionSink {
    client: Client,
    base_url: String,
    bearer: Option<String>,
}

impl HttpSubscriptionSink {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::Config(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            bearer: None,
        })
    }

    pub fn from_config(config: &PushConfig) -> Result<Self> {
        Self::new(config.api_url.clone(), config.request_timeout)
    }

    /// Authenticate sink requests with a bearer credential.
    pub fn with_bearer(mut self, credential: impl Into<String>) -> Self {
        self.bearer = Some(credential.into());
        self
    }

    async fn post(&self, path: &str, body: &serde_json::Value) -> Result<()> {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.client.post(&url).json(body);
        if let Some(token) = &self.bearer {
            request = request.bearer_auth(token);
        }

        let response = request
            .send()
            .await
            .map_err(|e| Error::Request(format!("POST {} failed: {}", path, e)))?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(Error::Request(format!(
                "POST {} returned {}: {}",
                path, status, body
            )));
        }

        debug!(subsystem = SUBSYSTEM_PUSH, path, "Push sink request succeeded");
        Ok(())
    }
}

#[async_trait]
impl SubscriptionSink for HttpSubscriptionSink {
    async fn register(&self, record: &PushSubscriptionRecord) -> Result<()> {
        let body = serde_json::to_value(record)?;
        self.post(PUSH_SUBSCRIBE_PATH, &body).await
    }

    async fn remove(&self, endpoint: &str) -> Result<()> {
        self.post(PUSH_UNSUBSCRIBE_PATH, &json!({ "endpoint": endpoint }))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use dealwire_core::PushKeys;
    use wiremock::matchers::{body_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn record() -> PushSubscriptionRecord {
        PushSubscriptionRecord {
            endpoint: "https://push.example.test/send/abc".to_string(),
            keys: PushKeys {
                p256dh: "BPk".to_string(),
                auth: "c2VjcmV0".to_string(),
            },
            user_id: "u-1".to_string(),
            organization_id: "org-1".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_posts_camel_case_record() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/push/subscribe"))
            .and(header("Authorization", "Bearer token-1"))
            .and(body_json(json!({
                "endpoint": "https://push.example.test/send/abc",
                "keys": {"p256dh": "BPk", "auth": "c2VjcmV0"},
                "userId": "u-1",
                "organizationId": "org-1"
            })))
            .respond_with(ResponseTemplate::new(201))
            .expect(1)
            .mount(&mock_server)
            .await;

        let sink = HttpSubscriptionSink::new(mock_server.uri(), Duration::from_secs(5))
            .unwrap()
            .with_bearer("token-1");
        sink.register(&record()).await.unwrap();
    }

    #[tokio::test]
    async fn test_remove_posts_endpoint() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/push/unsubscribe"))
            .and(body_json(json!({"endpoint": "https://push.example.test/send/abc"})))
            .respond_with(ResponseTemplate::new(200))
            .expect(1)
            .mount(&mock_server)
            .await;

        let base_url = format!("{}/", mock_server.uri());
        let sink = HttpSubscriptionSink::new(base_url, Duration::from_secs(5)).unwrap();
        sink.remove("https://push.example.test/send/abc")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_server_error_is_request_error() {
        let mock_server = MockServer::start().await;

        Mock::given(method("POST"))
            .and(path("/api/push/subscribe"))
            .respond_with(ResponseTemplate::new(500).set_body_string("database unavailable"))
            .mount(&mock_server)
            .await;

        let sink = HttpSubscriptionSink::new(mock_server.uri(), Duration::from_secs(5)).unwrap();
        let err = sink.register(&record()).await.unwrap_err();
        match err {
            Error::Request(msg) => {
                assert!(msg.contains("500"));
                assert!(msg.contains("database unavailable"));
            }
            other => panic!("expected request error, got {:?}", other),
        }
    }
}
