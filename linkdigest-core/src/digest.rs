use crate::cluster::{Cluster, ClusterParams, cluster};
use crate::config::DigestSettings;
use crate::error::Result;
use crate::keywords::{KeywordVocabulary, extract_keywords};
use crate::ledger::LedgerState;
use crate::similarity::{SimilarityEngine, TokenPolicy};
use linkdigest_fetch::LinkRecord;
use std::collections::HashSet;
use tracing::{debug, info};

/// Options for building one digest
#[derive(Debug, Clone, PartialEq)]
pub struct DigestOptions {
    pub cluster: ClusterParams,
    pub display_window: usize,
    pub corpus_window: usize,
    pub keywords_per_cluster: usize,
    pub tokenizer: TokenPolicy,
}

impl Default for DigestOptions {
    fn default() -> Self {
        DigestOptions::from(&DigestSettings::default())
    }
}

impl From<&DigestSettings> for DigestOptions {
    fn from(settings: &DigestSettings) -> Self {
        Self {
            cluster: settings.cluster_params(),
            display_window: settings.display_window,
            corpus_window: settings.corpus_window,
            keywords_per_cluster: settings.keywords_per_cluster,
            tokenizer: settings.tokenizer,
        }
    }
}

/// Up to `limit` posted links, most recently posted first, with their parsed
/// records. Posted URLs missing from the cache are skipped.
pub fn recent_records(state: &LedgerState, limit: usize) -> Vec<LinkRecord> {
    let mut records = Vec::with_capacity(limit.min(state.posted.len()));
    for url in state.posted.recent() {
        if records.len() == limit {
            break;
        }
        match state.parsed.get(url) {
            Some(record) => records.push(record.clone()),
            None => debug!("No parsed record for posted link {}", url),
        }
    }
    records
}

/// Clusters the most recent posted links.
///
/// The similarity model is fitted on the last `corpus_window` records (never
/// fewer than the display window) and scores only the first `display_window`
/// of them. Cluster keywords come from the same fitted model and are labelled
/// through `vocabulary`, which may grow.
pub fn build_digest(
    state: &LedgerState,
    stopwords: &HashSet<String>,
    vocabulary: &mut KeywordVocabulary,
    options: &DigestOptions,
) -> Result<Vec<Cluster>> {
    let corpus_size = options.corpus_window.max(options.display_window);
    let corpus = recent_records(state, corpus_size);
    let window = &corpus[..options.display_window.min(corpus.len())];

    info!(
        "Building digest from {} links (corpus of {})",
        window.len(),
        corpus.len()
    );

    let engine = SimilarityEngine::fit(&corpus, stopwords, options.tokenizer);
    let similarity = engine.score(window);
    let mut clusters = cluster(window, &similarity, &options.cluster)?;

    if options.keywords_per_cluster > 0 {
        for group in clusters.iter_mut() {
            let texts: Vec<String> = group.records().map(LinkRecord::text).collect();
            let terms = extract_keywords(&texts, engine.model(), options.keywords_per_cluster);
            group.keywords = vocabulary.label(&terms);
        }
    }

    Ok(clusters)
}
