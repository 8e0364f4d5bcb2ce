// Publishing admitted links to external platforms

use crate::error::{FetchError, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::info;

/// What gets published for one admitted link.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkPost {
    pub title: String,
    pub description: String,
    pub url: String,
    pub thumbnail: Option<String>,
}

impl LinkPost {
    /// Post body in the `"{description} {url}"` form.
    pub fn text(&self) -> String {
        if self.description.is_empty() {
            self.url.clone()
        } else {
            format!("{} {}", self.description, self.url)
        }
    }
}

#[async_trait]
pub trait Poster: Send + Sync {
    /// Platform name used in logs.
    fn platform(&self) -> &str;

    async fn post(&self, post: &LinkPost) -> Result<()>;
}

#[derive(Serialize)]
struct WebhookPayload<'a> {
    #[serde(flatten)]
    post: &'a LinkPost,
    text: String,
}

/// POSTs each link as JSON to a webhook endpoint.
pub struct WebhookPoster {
    name: String,
    endpoint: String,
    client: Client,
}

impl WebhookPoster {
    pub fn new(name: impl Into<String>, endpoint: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)
            .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", endpoint, e)))?;
        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            name: name.into(),
            endpoint,
            client,
        })
    }
}

#[async_trait]
impl Poster for WebhookPoster {
    fn platform(&self) -> &str {
        &self.name
    }

    async fn post(&self, post: &LinkPost) -> Result<()> {
        let payload = WebhookPayload {
            post,
            text: post.text(),
        };
        let response = self.client.post(&self.endpoint).json(&payload).send().await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchError::Rejected {
                platform: self.name.clone(),
                reason: format!("{} {}", status.as_u16(), body.trim()),
            });
        }

        info!("Posted {} to {}", post.url, self.name);
        Ok(())
    }
}

/// Writes the post to the log instead of publishing it.
pub struct LogPoster;

#[async_trait]
impl Poster for LogPoster {
    fn platform(&self) -> &str {
        "log"
    }

    async fn post(&self, post: &LinkPost) -> Result<()> {
        info!("[post] {} | {}", post.title, post.text());
        Ok(())
    }
}
