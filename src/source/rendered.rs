//! Headless-browser rendering service.
//!
//! Posts a small script to the service's `/function` endpoint. The script
//! opens the page, waits for the match rows to render, and returns the
//! final markup, which gets past JavaScript bot checks that a plain GET
//! cannot.

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};

use crate::config::{CategoryTarget, SourceConfig};
use crate::extract::is_challenge;
use crate::feed::models::RawDocument;
use crate::source::{network_error, read_body, PageSource, RetrievalError};

const RENDER_SCRIPT: &str = r#"export default async function ({ page, context }) {
  await page.setUserAgent(context.userAgent);
  await page.goto(context.url, { waitUntil: "domcontentloaded", timeout: context.timeout });
  await page.waitForSelector(context.selector, { timeout: context.timeout }).catch(() => null);
  const data = await page.content();
  return { data, type: "text/html" };
}"#;

pub struct RenderedSource {
    http: reqwest::Client,
    endpoint: String,
    token: SecretString,
    selector: String,
    wait_timeout_ms: u64,
    user_agent: String,
}

#[derive(Debug, Serialize)]
struct FunctionRequest<'a> {
    code: &'a str,
    context: FunctionContext<'a>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct FunctionContext<'a> {
    url: &'a str,
    selector: &'a str,
    timeout: u64,
    user_agent: &'a str,
}

/// JSON envelope some deployments wrap the markup in.
#[derive(Debug, Deserialize)]
struct FunctionResponse {
    data: String,
}

impl RenderedSource {
    pub fn new(config: &SourceConfig, token: SecretString) -> Result<Self> {
        // rendering waits on the page, so allow for it on top of the request timeout
        let timeout = Duration::from_secs(config.request_timeout_seconds)
            + Duration::from_millis(config.wait_timeout_ms);
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            http,
            endpoint: format!("{}/function", config.render_base_url.trim_end_matches('/')),
            token,
            selector: config.wait_selector.clone(),
            wait_timeout_ms: config.wait_timeout_ms,
            user_agent: config.user_agent.clone(),
        })
    }
}

/// Accept either bare markup or the `{ "data": ... }` envelope.
fn unwrap_markup(url: &str, body: String) -> Result<String, RetrievalError> {
    if !body.trim_start().starts_with('{') {
        return Ok(body);
    }
    serde_json::from_str::<FunctionResponse>(&body)
        .map(|r| r.data)
        .map_err(|e| RetrievalError::Malformed {
            url: url.to_string(),
            reason: e.to_string(),
        })
}

#[async_trait]
impl PageSource for RenderedSource {
    #[instrument(skip(self), fields(category = %target.category))]
    async fn fetch(&self, target: &CategoryTarget) -> Result<RawDocument, RetrievalError> {
        let payload = FunctionRequest {
            code: RENDER_SCRIPT,
            context: FunctionContext {
                url: &target.url,
                selector: &self.selector,
                timeout: self.wait_timeout_ms,
                user_agent: &self.user_agent,
            },
        };

        let response = self
            .http
            .post(&self.endpoint)
            .query(&[("token", self.token.expose_secret())])
            .json(&payload)
            .send()
            .await
            .map_err(network_error(&target.url))?;

        let body = read_body(&target.url, response).await?;
        let markup = unwrap_markup(&target.url, body)?;
        if is_challenge(&markup) {
            return Err(RetrievalError::Challenge {
                url: target.url.clone(),
            });
        }

        debug!(bytes = markup.len(), "Rendered page received");
        Ok(RawDocument::new(&target.url, target.category, markup))
    }

    fn name(&self) -> &str {
        "rendered"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::feed::models::Category;
    use crate::source::tests::source_config;
    use wiremock::matchers::{body_string_contains, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn target() -> CategoryTarget {
        CategoryTarget {
            category: Category::Btts,
            url: "https://m.forebet.com/es/btts".to_string(),
        }
    }

    #[tokio::test]
    async fn test_posts_script_with_token() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/function"))
            .and(query_param("token", "secret-token"))
            .and(body_string_contains("waitForSelector"))
            .and(body_string_contains("https://m.forebet.com/es/btts"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<div class=\"rcnt\">x</div>"))
            .expect(1)
            .mount(&server)
            .await;

        let source =
            RenderedSource::new(&source_config(&server.uri()), "secret-token".to_string().into())
                .unwrap();
        let doc = source.fetch(&target()).await.unwrap();
        assert_eq!(doc.category, Category::Btts);
        assert_eq!(doc.body, "<div class=\"rcnt\">x</div>");
    }

    #[tokio::test]
    async fn test_json_envelope_unwrapped() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/function"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({ "data": "<table></table>" })),
            )
            .mount(&server)
            .await;

        let source =
            RenderedSource::new(&source_config(&server.uri()), "t".to_string().into()).unwrap();
        let doc = source.fetch(&target()).await.unwrap();
        assert_eq!(doc.body, "<table></table>");
    }

    #[tokio::test]
    async fn test_service_error_status() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let source =
            RenderedSource::new(&source_config(&server.uri()), "bad".to_string().into()).unwrap();
        let err = source.fetch(&target()).await.unwrap_err();
        assert!(matches!(err, RetrievalError::Status { .. }));
    }

    #[test]
    fn test_unwrap_markup_rejects_bad_json() {
        let err = unwrap_markup("u", "{not json".to_string()).unwrap_err();
        assert!(matches!(err, RetrievalError::Malformed { .. }));
    }
}
