//! Plain GET against the forebet page with browser-like headers.

use anyhow::Result;
use async_trait::async_trait;
use tracing::{debug, instrument};

use crate::config::{CategoryTarget, SourceConfig};
use crate::extract::is_challenge;
use crate::feed::models::RawDocument;
use crate::source::{browser_client, network_error, read_body, PageSource, RetrievalError};

pub struct DirectSource {
    client: reqwest::Client,
}

impl DirectSource {
    pub fn new(config: &SourceConfig) -> Result<Self> {
        Ok(Self {
            client: browser_client(config)?,
        })
    }
}

#[async_trait]
impl PageSource for DirectSource {
    #[instrument(skip(self), fields(category = %target.category))]
    async fn fetch(&self, target: &CategoryTarget) -> Result<RawDocument, RetrievalError> {
        let response = self
            .client
            .get(&target.url)
            .send()
            .await
            .map_err(network_error(&target.url))?;

        let body = read_body(&target.url, response).await?;
        if is_challenge(&body) {
            return Err(RetrievalError::Challenge {
                url: target.url.clone(),
            });
        }

        debug!(bytes = body.len(), "Page fetched");
        Ok(RawDocument::new(&target.url, target.category, body))
    }

    fn name(&self) -> &str {
        "direct"
    }
}
