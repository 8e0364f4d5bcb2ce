use crate::error::{FetchError, Result};
use crate::record::LinkRecord;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use scraper::{Html, Selector};
use std::time::{Duration, Instant};
use tracing::{debug, warn};
use url::Url;

pub const DEFAULT_TIMEOUT_SECS: u64 = 10;

/// Turns a link into a display record. Never fails: any fetch or parse
/// problem yields [`LinkRecord::placeholder`].
#[async_trait]
pub trait Enricher: Send + Sync {
    async fn enrich(&self, url: &str) -> LinkRecord;
}

/// Fetches the page and reads its OpenGraph / HTML metadata.
pub struct HttpEnricher {
    client: Client,
}

impl HttpEnricher {
    pub fn new() -> Result<Self> {
        Self::with_timeout(DEFAULT_TIMEOUT_SECS)
    }

    pub fn with_timeout(timeout_secs: u64) -> Result<Self> {
        let client = Client::builder()
            .user_agent("linkdigest/0.1 (+https://github.com/linkdigest/linkdigest)")
            .timeout(Duration::from_secs(timeout_secs))
            .connect_timeout(Duration::from_secs(timeout_secs.div_ceil(2)))
            .redirect(reqwest::redirect::Policy::limited(5))
            .build()?;

        Ok(Self { client })
    }

    async fn fetch_record(&self, url: &str) -> Result<LinkRecord> {
        let start = Instant::now();
        let response = self.client.get(url).send().await?.error_for_status()?;
        let page_url = response.url().to_string();
        let body = response.text().await?;
        debug!(
            "Fetched {} ({} bytes) in {:.2}s",
            page_url,
            body.len(),
            start.elapsed().as_secs_f32()
        );

        parse_metadata(url, &page_url, &body)
    }
}

#[async_trait]
impl Enricher for HttpEnricher {
    async fn enrich(&self, url: &str) -> LinkRecord {
        match self.fetch_record(url).await {
            Ok(record) => record,
            Err(e) => {
                warn!("Enrichment failed for {}: {}", url, e);
                LinkRecord::placeholder(url)
            }
        }
    }
}

/// Builds a record for `url` from the HTML served at `page_url`.
///
/// Title: `og:title`, then `<title>`. Description: `og:description`, then
/// `meta[name=description]`, then the title. Canonical link:
/// `link[rel=canonical]`, then `og:url`, then `url` itself.
pub fn parse_metadata(url: &str, page_url: &str, html: &str) -> Result<LinkRecord> {
    let document = Html::parse_document(html);
    let base = Url::parse(page_url)
        .map_err(|e| FetchError::InvalidUrl(format!("{}: {}", page_url, e)))?;

    let title = match meta_content(
        &document,
        &["meta[property=\"og:title\"]", "meta[name=\"twitter:title\"]"],
    )? {
        Some(title) => title,
        None => first_text(&document, "title")?.unwrap_or_default(),
    };
    let title = sanitize(&title);

    let description = meta_content(
        &document,
        &[
            "meta[property=\"og:description\"]",
            "meta[name=\"description\"]",
            "meta[name=\"twitter:description\"]",
        ],
    )?
    .map(|d| sanitize(&d))
    .filter(|d| !d.is_empty())
    .unwrap_or_else(|| title.clone());

    let canonical = first_attr(&document, "link[rel=\"canonical\"]", "href")?
        .or(meta_content(&document, &["meta[property=\"og:url\"]"])?)
        .and_then(|href| base.join(&href).ok())
        .map(|u| u.to_string())
        .unwrap_or_else(|| url.to_string());

    let thumbnail = meta_content(
        &document,
        &["meta[property=\"og:image\"]", "meta[name=\"twitter:image\"]"],
    )?
    .and_then(|src| base.join(&src).ok())
    .map(|u| u.to_string());

    let published = meta_content(
        &document,
        &[
            "meta[property=\"article:published_time\"]",
            "meta[itemprop=\"datePublished\"]",
            "meta[name=\"date\"]",
        ],
    )?
    .and_then(|raw| parse_date(&raw));

    Ok(LinkRecord {
        url: url.to_string(),
        title,
        description,
        link: canonical,
        thumbnail,
        published,
    })
}

fn selector(css: &str) -> Result<Selector> {
    Selector::parse(css).map_err(|e| FetchError::ParseError(format!("{}: {}", css, e)))
}

fn meta_content(document: &Html, selectors: &[&str]) -> Result<Option<String>> {
    for css in selectors {
        if let Some(value) = first_attr(document, css, "content")? {
            return Ok(Some(value));
        }
    }
    Ok(None)
}

fn first_attr(document: &Html, css: &str, attr: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string))
}

fn first_text(document: &Html, css: &str) -> Result<Option<String>> {
    let sel = selector(css)?;
    Ok(document
        .select(&sel)
        .map(|el| el.text().collect::<String>())
        .map(|t| t.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|t| !t.is_empty()))
}

// '*' breaks the markup of the platforms we post to
fn sanitize(text: &str) -> String {
    text.trim().replace('*', ":")
}

/// Accepts `YYYY-MM-DD` optionally followed by a time part.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let day = raw.trim().get(..10)?;
    NaiveDate::parse_from_str(day, "%Y-%m-%d").ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_date_variants() {
        assert_eq!(
            parse_date("2024-03-05T10:00:00+01:00"),
            NaiveDate::from_ymd_opt(2024, 3, 5)
        );
        assert_eq!(parse_date("2024-03-05"), NaiveDate::from_ymd_opt(2024, 3, 5));
        assert_eq!(parse_date("05.03.2024"), None);
        assert_eq!(parse_date("2024"), None);
    }

    #[test]
    fn test_sanitize_replaces_asterisks() {
        assert_eq!(sanitize("  Breaking*News "), "Breaking:News");
    }
}
