//! Snapshot source backed by a scraping platform's dataset API.
//!
//! A crawler run elsewhere stores one item per visited page. Items are
//! loosely shaped: the URL and the page content live under different keys
//! depending on the actor that produced them.

use anyhow::{Context, Result};
use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{debug, instrument};

use crate::config::{CategoryTarget, SourceConfig};
use crate::extract::is_challenge;
use crate::feed::models::RawDocument;
use crate::source::{network_error, read_body, PageSource, RetrievalError};

/// Keys checked, in order, for the page content of an item.
const CONTENT_FIELDS: &[&str] = &["html", "text", "content", "body", "pageContent"];

pub struct DatasetSource {
    http: reqwest::Client,
    items_url: String,
    token: SecretString,
    dataset_id: String,
}

impl DatasetSource {
    pub fn new(config: &SourceConfig, token: SecretString, dataset_id: String) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_seconds))
            .build()
            .context("Failed to create HTTP client")?;

        let items_url = format!(
            "{}/v2/datasets/{}/items",
            config.dataset_base_url.trim_end_matches('/'),
            urlencoding::encode(&dataset_id)
        );

        Ok(Self {
            http,
            items_url,
            token,
            dataset_id,
        })
    }
}

fn item_url(item: &Value) -> Option<&str> {
    item.get("url")
        .or_else(|| item.get("loadedUrl"))
        .or_else(|| item.get("request").and_then(|r| r.get("url")))
        .and_then(Value::as_str)
}

fn item_content(item: &Value) -> Option<&str> {
    CONTENT_FIELDS
        .iter()
        .filter_map(|field| item.get(*field).and_then(Value::as_str))
        .find(|content| !content.trim().is_empty())
}

fn same_page(a: &str, b: &str) -> bool {
    a.trim_end_matches('/').eq_ignore_ascii_case(b.trim_end_matches('/'))
}

/// Content of the item recorded for `url`.
pub fn select_item<'a>(items: &'a [Value], url: &str) -> Option<&'a str> {
    items
        .iter()
        .filter(|item| item_url(item).is_some_and(|u| same_page(u, url)))
        .find_map(item_content)
}

#[async_trait]
impl PageSource for DatasetSource {
    #[instrument(skip(self), fields(category = %target.category, dataset = %self.dataset_id))]
    async fn fetch(&self, target: &CategoryTarget) -> Result<RawDocument, RetrievalError> {
        let response = self
            .http
            .get(&self.items_url)
            .query(&[
                ("token", self.token.expose_secret()),
                ("clean", "true"),
                ("format", "json"),
            ])
            .send()
            .await
            .map_err(network_error(&target.url))?;

        let body = read_body(&target.url, response).await?;
        let items: Vec<Value> =
            serde_json::from_str(&body).map_err(|e| RetrievalError::Malformed {
                url: target.url.clone(),
                reason: e.to_string(),
            })?;

        let content = select_item(&items, &target.url).ok_or_else(|| RetrievalError::NotInDataset {
            url: target.url.clone(),
        })?;
        if is_challenge(content) {
            return Err(RetrievalError::Challenge {
                url: target.url.clone(),
            });
        }

        debug!(items = items.len(), bytes = content.len(), "Dataset item selected");
        Ok(RawDocument::new(
            format!("{}#{}", self.dataset_id, target.url),
            target.category,
            content,
        ))
    }

    fn name(&self) -> &str {
        "dataset"
    }
}
