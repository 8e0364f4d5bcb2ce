use chrono::NaiveDate;
use serde::{Deserialize, Deserializer, Serialize};

/// An enriched link, keyed by its canonical URL.
///
/// Empty `title`/`description` are a valid "unknown" state. A record that
/// failed enrichment is a placeholder (see [`LinkRecord::placeholder`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LinkRecord {
    pub url: String,
    pub title: String,
    pub description: String,
    /// Canonical link reported by the page itself, if any.
    pub link: String,
    pub thumbnail: Option<String>,
    pub published: Option<NaiveDate>,
}

impl LinkRecord {
    pub fn new(url: impl Into<String>, title: impl Into<String>, description: impl Into<String>) -> Self {
        let url = url.into();
        Self {
            link: url.clone(),
            url,
            title: title.into(),
            description: description.into(),
            thumbnail: None,
            published: None,
        }
    }

    /// The record produced when a page could not be fetched or parsed.
    pub fn placeholder(url: &str) -> Self {
        Self::new(url, url, "")
    }

    pub fn with_published(mut self, date: NaiveDate) -> Self {
        self.published = Some(date);
        self
    }

    pub fn with_thumbnail(mut self, thumbnail: impl Into<String>) -> Self {
        self.thumbnail = Some(thumbnail.into());
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.title == self.url && self.description.is_empty()
    }

    /// Text used for similarity and keyword extraction.
    pub fn text(&self) -> String {
        format!("{} {}", self.title, self.description)
    }
}

/// One raw mention of a link in the feed, with the embed metadata the feed
/// itself carried. Mentions are not deduplicated: repeats count toward
/// popularity.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct LinkMention {
    pub uri: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default)]
    pub thumb: Option<String>,
    #[serde(default, rename = "createdAt", alias = "created_at")]
    pub created_at: Option<String>,
}

impl LinkMention {
    pub fn new(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Default::default()
        }
    }
}

// Exports often carry `null` for missing embed text
fn null_as_empty<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(Option::<String>::deserialize(deserializer)?.unwrap_or_default())
}

/// Mentions harvested from one polling pass, in feed order.
pub type ObservationBatch = Vec<LinkMention>;
