// Loading observation batches from a timeline export or endpoint

use crate::error::{FetchError, Result};
use crate::record::{LinkMention, ObservationBatch};
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info};

/// Supplies one batch of raw link mentions per run.
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch_batch(&self) -> Result<ObservationBatch>;
}

/// Reads a batch from a JSON file on disk.
pub struct JsonFileFeed {
    path: PathBuf,
}

impl JsonFileFeed {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl FeedSource for JsonFileFeed {
    async fn fetch_batch(&self) -> Result<ObservationBatch> {
        let raw = tokio::fs::read_to_string(&self.path).await?;
        let batch = parse_batch(&raw)?;
        info!(
            "Loaded {} link mentions from {}",
            batch.len(),
            self.path.display()
        );
        Ok(batch)
    }
}

/// GETs a batch from a JSON endpoint.
pub struct HttpFeed {
    client: Client,
    url: String,
}

impl HttpFeed {
    pub fn new(url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let url = url.into();
        url::Url::parse(&url).map_err(|e| FetchError::InvalidUrl(format!("{}: {}", url, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl FeedSource for HttpFeed {
    async fn fetch_batch(&self) -> Result<ObservationBatch> {
        let body = self
            .client
            .get(&self.url)
            .send()
            .await?
            .error_for_status()?
            .text()
            .await?;
        let batch = parse_batch(&body)?;
        info!("Fetched {} link mentions from {}", batch.len(), self.url);
        Ok(batch)
    }
}

/// Parses any of the accepted batch shapes:
///
/// - an array of mentions (`{"uri": ..., "title": ..., ...}`)
/// - a timeline page (`{"feed": [{"post": {...}}], "cursor": ...}`)
/// - an array of timeline pages
///
/// Timeline posts contribute a mention only when they embed an external link.
/// Items that do not fit any shape are skipped, so a malformed batch yields
/// fewer (possibly zero) mentions. Only text that is not JSON at all is an
/// error.
pub fn parse_batch(json: &str) -> Result<ObservationBatch> {
    let value: Value = serde_json::from_str(json)?;
    let mut batch = Vec::new();
    collect_mentions(&value, &mut batch);
    Ok(batch)
}

fn collect_mentions(value: &Value, out: &mut ObservationBatch) {
    match value {
        Value::Array(items) => {
            for item in items {
                collect_mentions(item, out);
            }
        }
        Value::Object(map) if map.contains_key("feed") => {
            let Some(entries) = map.get("feed").and_then(Value::as_array) else {
                debug!("Skipping timeline page with a non-array `feed`");
                return;
            };
            for entry in entries {
                let post = entry.get("post").unwrap_or(entry);
                if let Some(mention) = external_embed(post) {
                    out.push(mention);
                }
            }
        }
        Value::Object(map) if map.contains_key("uri") => {
            match LinkMention::deserialize(value) {
                Ok(mention) if !mention.uri.trim().is_empty() => out.push(mention),
                Ok(_) => debug!("Skipping mention with an empty uri"),
                Err(e) => debug!("Skipping malformed mention {}: {}", value, e),
            }
        }
        other => debug!("Skipping unrecognised feed item: {}", other),
    }
}

fn external_embed(post: &Value) -> Option<LinkMention> {
    let external = post.get("embed")?.get("external")?;
    let uri = external.get("uri")?.as_str()?.trim();
    if uri.is_empty() {
        return None;
    }

    let text = |key: &str| {
        external
            .get(key)
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string()
    };
    let thumb = external
        .get("thumb")
        .and_then(Value::as_str)
        .map(str::to_string);
    let created_at = post
        .get("record")
        .and_then(|r| r.get("createdAt"))
        .or_else(|| post.get("indexedAt"))
        .and_then(Value::as_str)
        .map(str::to_string);

    Some(LinkMention {
        uri: uri.to_string(),
        title: text("title"),
        description: text("description"),
        thumb,
        created_at,
    })
}
