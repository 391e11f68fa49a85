//! Token metadata publishing
//!
//! The create instruction needs a metadata URI. [`PumpIpfsClient`] uploads
//! the token image and its descriptive fields as one multipart form and
//! returns the URI the API pinned them under.

use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{
    header::{HeaderMap, HeaderValue, ORIGIN, REFERER, USER_AGENT},
    multipart::{Form, Part},
    Client,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info};

#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("Invalid metadata: {0}")]
    Validation(String),

    #[error("Failed to read image {path}: {source}")]
    Image {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Metadata request failed: {0}")]
    Http(String),

    #[error("Metadata upload rejected (status {status}): {body}")]
    Rejected { status: u16, body: String },

    #[error("Unexpected metadata response: {0}")]
    InvalidResponse(String),
}

/// Descriptive fields for a new token
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenMetadata {
    pub name: String,
    pub symbol: String,
    pub description: String,
    #[serde(default)]
    pub twitter: Option<String>,
    #[serde(default)]
    pub telegram: Option<String>,
    #[serde(default)]
    pub website: Option<String>,
}

impl TokenMetadata {
    pub fn validate(&self) -> Result<(), MetadataError> {
        if self.name.trim().is_empty() {
            return Err(MetadataError::Validation("name is empty".into()));
        }
        if self.symbol.trim().is_empty() {
            return Err(MetadataError::Validation("symbol is empty".into()));
        }
        Ok(())
    }
}

/// Name, symbol and URI as recorded by the metadata service
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PublishedMetadata {
    pub name: String,
    pub symbol: String,
    pub uri: String,
}

#[derive(Debug, Deserialize)]
struct IpfsResponse {
    metadata: IpfsMetadata,
    #[serde(rename = "metadataUri")]
    metadata_uri: String,
}

#[derive(Debug, Deserialize)]
struct IpfsMetadata {
    name: String,
    symbol: String,
}

#[async_trait]
pub trait MetadataService: Send + Sync {
    async fn publish(&self, metadata: &TokenMetadata) -> Result<PublishedMetadata, MetadataError>;
}

/// Multipart client for the pump.fun IPFS endpoint
pub struct PumpIpfsClient {
    http: Client,
    url: String,
    image_path: PathBuf,
}

impl PumpIpfsClient {
    pub fn new(
        url: impl Into<String>,
        image_path: impl Into<PathBuf>,
        timeout: Duration,
    ) -> Result<Self, MetadataError> {
        let mut headers = HeaderMap::new();
        headers.insert(
            USER_AGENT,
            HeaderValue::from_static(
                "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
            ),
        );
        headers.insert(REFERER, HeaderValue::from_static("https://www.pump.fun/create"));
        headers.insert(ORIGIN, HeaderValue::from_static("https://www.pump.fun"));

        let http = Client::builder()
            .default_headers(headers)
            .connect_timeout(timeout)
            .timeout(timeout)
            .build()
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        Ok(Self {
            http,
            url: url.into(),
            image_path: image_path.into(),
        })
    }

    pub fn image_path(&self) -> &Path {
        &self.image_path
    }

    async fn image_part(&self) -> Result<Part, MetadataError> {
        let bytes = tokio::fs::read(&self.image_path)
            .await
            .map_err(|source| MetadataError::Image {
                path: self.image_path.clone(),
                source,
            })?;
        let file_name = self
            .image_path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "image".to_string());
        Ok(Part::bytes(bytes).file_name(file_name))
    }
}

#[async_trait]
impl MetadataService for PumpIpfsClient {
    async fn publish(&self, metadata: &TokenMetadata) -> Result<PublishedMetadata, MetadataError> {
        metadata.validate()?;

        let form = Form::new()
            .part("file", self.image_part().await?)
            .text("name", metadata.name.clone())
            .text("symbol", metadata.symbol.clone())
            .text("description", metadata.description.clone())
            .text("twitter", metadata.twitter.clone().unwrap_or_default())
            .text("telegram", metadata.telegram.clone().unwrap_or_default())
            .text("website", metadata.website.clone().unwrap_or_default())
            .text("showName", "true");

        debug!(url = %self.url, name = %metadata.name, "Uploading token metadata");
        let resp = self
            .http
            .post(&self.url)
            .multipart(form)
            .send()
            .await
            .map_err(|e| MetadataError::Http(e.to_string()))?;

        let status = resp.status();
        let body = resp
            .text()
            .await
            .map_err(|e| MetadataError::Http(e.to_string()))?;
        if !status.is_success() {
            return Err(MetadataError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        let parsed: IpfsResponse = serde_json::from_str(&body)
            .map_err(|e| MetadataError::InvalidResponse(format!("{e}: {body}")))?;
        if parsed.metadata_uri.is_empty() {
            return Err(MetadataError::InvalidResponse("empty metadataUri".into()));
        }

        info!(uri = %parsed.metadata_uri, symbol = %parsed.metadata.symbol, "Metadata published");
        Ok(PublishedMetadata {
            name: parsed.metadata.name,
            symbol: parsed.metadata.symbol,
            uri: parsed.metadata_uri,
        })
    }
}
