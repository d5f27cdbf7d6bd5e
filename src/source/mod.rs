pub mod dataset;
pub mod direct;
pub mod rendered;

use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::header::{self, HeaderMap, HeaderValue};
use thiserror::Error;

use crate::config::{CategoryTarget, Secrets, SourceConfig, SourceKind};
use crate::feed::models::RawDocument;

pub use dataset::DatasetSource;
pub use direct::DirectSource;
pub use rendered::RenderedSource;

/// Why a page could not be retrieved. The category is skipped for the
/// current cycle; the next tick tries again.
#[derive(Debug, Error)]
pub enum RetrievalError {
    #[error("request to {url} failed: {source}")]
    Network {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} returned HTTP {status}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
    },
    #[error("{url} served an anti-bot challenge page")]
    Challenge { url: String },
    #[error("malformed response from {url}: {reason}")]
    Malformed { url: String, reason: String },
    #[error("dataset has no item for {url}")]
    NotInDataset { url: String },
}

/// Anything that can produce the raw page for a tracked category.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch(&self, target: &CategoryTarget) -> Result<RawDocument, RetrievalError>;

    /// Human-readable name of this source.
    fn name(&self) -> &str;
}

/// Build the source selected by `config.kind`.
pub fn build_source(config: &SourceConfig, secrets: &Secrets) -> Result<Box<dyn PageSource>> {
    let source: Box<dyn PageSource> = match config.kind {
        SourceKind::Direct => Box::new(DirectSource::new(config)?),
        SourceKind::Rendered => {
            let token = secrets
                .render_token
                .clone()
                .context("RENDER_TOKEN is required for the rendered source")?;
            Box::new(RenderedSource::new(config, token)?)
        }
        SourceKind::Dataset => {
            let token = secrets
                .dataset_token
                .clone()
                .context("DATASET_TOKEN is required for the dataset source")?;
            let dataset_id = secrets
                .dataset_id
                .clone()
                .context("DATASET_ID is required for the dataset source")?;
            Box::new(DatasetSource::new(config, token, dataset_id)?)
        }
    };
    Ok(source)
}

/// HTTP client that presents itself as a mobile browser.
pub(crate) fn browser_client(config: &SourceConfig) -> Result<reqwest::Client> {
    let mut headers = HeaderMap::new();
    headers.insert(
        header::ACCEPT,
        HeaderValue::from_static("text/html,application/xhtml+xml,application/xml;q=0.9,*/*;q=0.8"),
    );
    headers.insert(
        header::ACCEPT_LANGUAGE,
        HeaderValue::from_str(&config.accept_language).context("Invalid accept_language header")?,
    );
    headers.insert(header::CACHE_CONTROL, HeaderValue::from_static("no-cache"));
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));

    reqwest::Client::builder()
        .user_agent(config.user_agent.as_str())
        .default_headers(headers)
        .timeout(Duration::from_secs(config.request_timeout_seconds))
        .build()
        .context("Failed to create HTTP client")
}

/// Check the status and read the body as text.
pub(crate) async fn read_body(
    url: &str,
    response: reqwest::Response,
) -> Result<String, RetrievalError> {
    let status = response.status();
    if !status.is_success() {
        return Err(RetrievalError::Status {
            url: url.to_string(),
            status,
        });
    }
    response.text().await.map_err(|source| RetrievalError::Network {
        url: url.to_string(),
        source,
    })
}

pub(crate) fn network_error(url: &str) -> impl FnOnce(reqwest::Error) -> RetrievalError + '_ {
    move |source| RetrievalError::Network {
        url: url.to_string(),
        source,
    }
}
