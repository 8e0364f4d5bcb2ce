use crate::error::Result;
use crate::ledger::{Blacklist, admit, merge_parsed, record_posted};
use crate::normalize::normalize;
use crate::store::{LedgerStore, RunSummary};
use chrono::Utc;
use futures::future::join_all;
use indicatif::{ProgressBar, ProgressStyle};
use linkdigest_fetch::{Enricher, LinkMention, LinkPost, LinkRecord, ObservationBatch, Poster};
use std::collections::HashMap;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Options for one curation run
pub struct CurateOptions {
    pub threshold: usize,
    pub parsed_capacity: usize,
    /// Compute admissions without committing or posting
    pub dry_run: bool,
    pub show_progress: bool,
}

/// What a curation run did
#[derive(Debug, Clone, Default)]
pub struct CurateReport {
    pub observed: usize,
    pub distinct: usize,
    pub admitted: Vec<String>,
    pub enriched: usize,
    pub posts: Vec<LinkPost>,
    pub post_failures: usize,
    pub committed: bool,
}

/// Runs one batch through the ledger.
///
/// Every observed URL is added to the seen log. Admitted links are looked up
/// in the parsed cache and enriched only when missing; new records are merged
/// into the cache. The ledger is committed before anything is posted, so a
/// failed post never un-posts a link. Post failures are logged and counted.
pub async fn run_curation<S>(
    batch: ObservationBatch,
    blacklist: &Blacklist,
    store: &S,
    enricher: &dyn Enricher,
    posters: &[Box<dyn Poster>],
    options: &CurateOptions,
) -> Result<CurateReport>
where
    S: LedgerStore + ?Sized,
{
    let started_at = Utc::now();
    let mut state = store.load()?;

    let mut report = CurateReport {
        observed: batch.len(),
        ..Default::default()
    };

    let mut first_mention: HashMap<String, &LinkMention> = HashMap::new();
    for mention in &batch {
        let url = normalize(&mention.uri);
        if url.is_empty() {
            continue;
        }
        state.seen.push(url.clone());
        first_mention.entry(url).or_insert(mention);
    }
    report.distinct = first_mention.len();

    report.admitted = admit(&batch, blacklist, options.threshold, &state.posted);
    info!(
        "Batch of {} mentions ({} distinct links): {} admitted",
        report.observed,
        report.distinct,
        report.admitted.len()
    );

    let progress = if options.show_progress && !report.admitted.is_empty() {
        let pb = ProgressBar::new(report.admitted.len() as u64);
        pb.set_style(
            ProgressStyle::default_spinner()
                .template("{spinner:.cyan} [{pos}/{len}] {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_spinner()),
        );
        pb.enable_steady_tick(Duration::from_millis(100));
        Some(pb)
    } else {
        None
    };

    let mut records = Vec::with_capacity(report.admitted.len());
    let mut fresh = Vec::new();
    for url in &report.admitted {
        let record = match state.parsed.get(url) {
            Some(cached) => {
                debug!("Parsed cache hit: {}", url);
                cached.clone()
            }
            None => {
                if let Some(ref pb) = progress {
                    pb.set_message(format!("Enriching {}", url));
                }
                let record = enricher.enrich(url).await;
                fresh.push(record.clone());
                record
            }
        };
        if let Some(ref pb) = progress {
            pb.inc(1);
        }
        records.push(record);
    }
    if let Some(pb) = progress {
        pb.finish_and_clear();
    }

    report.enriched = fresh.len();
    merge_parsed(&mut state.parsed, fresh, options.parsed_capacity);

    report.posts = records
        .iter()
        .map(|record| post_for(record, first_mention.get(&record.url).copied()))
        .collect();

    if options.dry_run {
        info!("Dry run: ledger left untouched, nothing posted");
        return Ok(report);
    }

    record_posted(&report.admitted, &mut state.posted);
    store.commit(&state)?;
    report.committed = true;

    for post in &report.posts {
        let outcomes = join_all(posters.iter().map(|poster| poster.post(post))).await;
        for (poster, outcome) in posters.iter().zip(outcomes) {
            if let Err(e) = outcome {
                warn!("Posting {} to {} failed: {}", post.url, poster.platform(), e);
                report.post_failures += 1;
            }
        }
    }

    store.record_run(&RunSummary {
        started_at,
        finished_at: Utc::now(),
        observed: report.observed,
        admitted: report.admitted.len(),
        enriched: report.enriched,
        post_failures: report.post_failures,
    })?;

    Ok(report)
}

/// The post for an admitted link. Fields the enrichment could not supply
/// fall back to the embed metadata of the link's first mention.
pub fn post_for(record: &LinkRecord, mention: Option<&LinkMention>) -> LinkPost {
    let degraded = record.is_placeholder();
    let embed = |field: fn(&LinkMention) -> &str| {
        mention
            .map(field)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };

    let title = if degraded || record.title.is_empty() {
        embed(|m| m.title.as_str()).unwrap_or_else(|| record.url.clone())
    } else {
        record.title.clone()
    };

    let description = if degraded || record.description.is_empty() {
        embed(|m| m.description.as_str()).unwrap_or_else(|| title.clone())
    } else {
        record.description.clone()
    };

    let url = if record.link.is_empty() {
        record.url.clone()
    } else {
        record.link.clone()
    };

    LinkPost {
        title,
        description,
        url,
        thumbnail: record
            .thumbnail
            .clone()
            .or_else(|| mention.and_then(|m| m.thumb.clone())),
    }
}
