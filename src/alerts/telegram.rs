//! Telegram Bot API client.
//!
//! Covers the two calls the bot needs: `sendMessage` for alerts and
//! replies, and `getUpdates` long polling for inbound commands.

use std::num::NonZeroU32;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use governor::clock::DefaultClock;
use governor::state::{InMemoryState, NotKeyed};
use governor::{Quota, RateLimiter};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::alerts::{AlertSink, NotificationError};
use crate::config::AlertsConfig;

type Limiter = RateLimiter<NotKeyed, InMemoryState, DefaultClock>;

/// Slack on top of the long-poll timeout before the HTTP request gives up.
const LONG_POLL_GRACE: Duration = Duration::from_secs(10);

pub struct TelegramClient {
    http: reqwest::Client,
    base_url: String,
    token: SecretString,
    /// Destination for alerts.
    chat_id: String,
    limiter: Arc<Limiter>,
}

#[derive(Debug, Serialize)]
struct SendMessage<'a> {
    chat_id: &'a str,
    text: &'a str,
    disable_web_page_preview: bool,
}

#[derive(Debug, Serialize)]
struct GetUpdates {
    offset: i64,
    timeout: u64,
    allowed_updates: [&'static str; 1],
}

#[derive(Debug, Deserialize)]
struct ApiResponse<T> {
    ok: bool,
    result: Option<T>,
    description: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Update {
    pub update_id: i64,
    pub message: Option<IncomingMessage>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct IncomingMessage {
    pub chat: Chat,
    pub text: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Chat {
    pub id: i64,
}

impl TelegramClient {
    pub fn new(
        base_url: &str,
        token: SecretString,
        chat_id: String,
        config: &AlertsConfig,
    ) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            chat_id,
            limiter: create_rate_limiter(config),
        })
    }

    pub fn chat_id(&self) -> &str {
        &self.chat_id
    }

    fn method_url(&self, method: &str) -> String {
        format!("{}/bot{}/{method}", self.base_url, self.token.expose_secret())
    }

    /// Send `text` to any chat, waiting for the rate limiter first.
    #[instrument(skip(self, text))]
    pub async fn send_to(&self, chat_id: &str, text: &str) -> Result<(), NotificationError> {
        self.limiter.until_ready().await;

        let payload = SendMessage {
            chat_id,
            text,
            disable_web_page_preview: true,
        };
        let request = self.http.post(self.method_url("sendMessage")).json(&payload);
        let _: serde_json::Value = self.call(request).await?;

        debug!("Message delivered");
        Ok(())
    }

    /// Long-poll for updates after `offset`.
    pub async fn get_updates(
        &self,
        offset: i64,
        timeout_seconds: u64,
    ) -> Result<Vec<Update>, NotificationError> {
        let payload = GetUpdates {
            offset,
            timeout: timeout_seconds,
            allowed_updates: ["message"],
        };
        let request = self
            .http
            .post(self.method_url("getUpdates"))
            .timeout(Duration::from_secs(timeout_seconds) + LONG_POLL_GRACE)
            .json(&payload);
        self.call(request).await
    }

    async fn call<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<T, NotificationError> {
        // the token is part of the URL, keep it out of error messages
        let response = request
            .send()
            .await
            .map_err(|e| NotificationError::Transport(e.without_url()))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| NotificationError::Transport(e.without_url()))?;

        let body: ApiResponse<T> = match serde_json::from_str(&text) {
            Ok(body) => body,
            Err(e) if status.is_success() => {
                return Err(NotificationError::Api(format!("unreadable response: {e}")));
            }
            Err(_) => ApiResponse {
                ok: false,
                result: None,
                description: Some(text.chars().take(200).collect()),
            },
        };

        if !status.is_success() {
            return Err(NotificationError::Status {
                status,
                description: body.description.unwrap_or_default(),
            });
        }
        if !body.ok {
            return Err(NotificationError::Api(
                body.description.unwrap_or_else(|| "unknown error".to_string()),
            ));
        }
        body.result
            .ok_or_else(|| NotificationError::Api("response without result".to_string()))
    }
}

#[async_trait]
impl AlertSink for TelegramClient {
    async fn send(&self, text: &str) -> Result<(), NotificationError> {
        self.send_to(&self.chat_id, text).await
    }
}

fn create_rate_limiter(config: &AlertsConfig) -> Arc<Limiter> {
    let per_second = NonZeroU32::new(config.messages_per_second).unwrap_or(NonZeroU32::MIN);
    let burst = NonZeroU32::new(config.burst_size).unwrap_or(per_second);

    let quota = Quota::per_second(per_second).allow_burst(burst);
    Arc::new(RateLimiter::direct(quota))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alerts::notifier::SendFailurePolicy;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn alerts_config() -> AlertsConfig {
        AlertsConfig {
            on_send_failure: SendFailurePolicy::KeepKey,
            messages_per_second: 50,
            burst_size: 50,
        }
    }

    fn client(server: &MockServer) -> TelegramClient {
        TelegramClient::new(
            &server.uri(),
            "123:abc".to_string().into(),
            "-100".to_string(),
            &alerts_config(),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_send_message() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/sendMessage"))
            .and(body_partial_json(serde_json::json!({ "chat_id": "-100", "text": "hola" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": { "message_id": 1 }
            })))
            .expect(1)
            .mount(&server)
            .await;

        client(&server).send("hola").await.unwrap();
    }

    #[tokio::test]
    async fn test_send_error_status_carries_description() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(400).set_body_json(serde_json::json!({
                "ok": false,
                "error_code": 400,
                "description": "Bad Request: chat not found"
            })))
            .mount(&server)
            .await;

        let err = client(&server).send("hola").await.unwrap_err();
        match err {
            NotificationError::Status { status, description } => {
                assert_eq!(status.as_u16(), 400);
                assert!(description.contains("chat not found"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_error_does_not_leak_token() {
        // nothing listens on port 9 of localhost
        let client = TelegramClient::new(
            "http://127.0.0.1:9",
            "123:secret".to_string().into(),
            "-100".to_string(),
            &alerts_config(),
        )
        .unwrap();
        let err = client.send("hola").await.unwrap_err();
        assert!(!err.to_string().contains("secret"));
    }

    #[tokio::test]
    async fn test_get_updates() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/bot123:abc/getUpdates"))
            .and(body_partial_json(serde_json::json!({ "offset": 7 })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "ok": true,
                "result": [
                    { "update_id": 7, "message": { "chat": { "id": -100 }, "text": "/watch" } },
                    { "update_id": 8 }
                ]
            })))
            .mount(&server)
            .await;

        let updates = client(&server).get_updates(7, 0).await.unwrap();
        assert_eq!(updates.len(), 2);
        let message = updates[0].message.as_ref().unwrap();
        assert_eq!(message.chat.id, -100);
        assert_eq!(message.text.as_deref(), Some("/watch"));
        assert!(updates[1].message.is_none());
    }
}
