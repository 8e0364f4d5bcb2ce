// Tests for a full curation run with stub collaborators

use async_trait::async_trait;
use linkdigest_core::curate::{CurateOptions, post_for, run_curation};
use linkdigest_core::ledger::{Blacklist, LedgerState, ParsedCache, UrlLog};
use linkdigest_core::store::{DataPaths, FileStore, LedgerStore, SqliteStore};
use linkdigest_fetch::error::Result as FetchResult;
use linkdigest_fetch::feed::parse_batch;
use linkdigest_fetch::{Enricher, FetchError, LinkMention, LinkPost, LinkRecord, Poster};
use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use tempfile::TempDir;

/// Enricher that titles each page after its URL, or degrades to a
/// placeholder for URLs containing "timeout".
#[derive(Default)]
struct StubEnricher {
    calls: AtomicUsize,
}

#[async_trait]
impl Enricher for StubEnricher {
    async fn enrich(&self, url: &str) -> LinkRecord {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if url.contains("timeout") {
            return LinkRecord::placeholder(url);
        }
        LinkRecord::new(url, format!("Page {}", url), "fetched description")
    }
}

#[derive(Default)]
struct RecordingPoster {
    posts: Mutex<Vec<LinkPost>>,
}

#[async_trait]
impl Poster for RecordingPoster {
    fn platform(&self) -> &str {
        "recording"
    }

    async fn post(&self, post: &LinkPost) -> FetchResult<()> {
        self.posts.lock().unwrap().push(post.clone());
        Ok(())
    }
}

struct FailingPoster;

#[async_trait]
impl Poster for FailingPoster {
    fn platform(&self) -> &str {
        "broken"
    }

    async fn post(&self, _post: &LinkPost) -> FetchResult<()> {
        Err(FetchError::Rejected {
            platform: "broken".to_string(),
            reason: "503".to_string(),
        })
    }
}

fn mentions(uris: &[&str]) -> Vec<LinkMention> {
    uris.iter().map(|u| LinkMention::new(*u)).collect()
}

fn options(threshold: usize) -> CurateOptions {
    CurateOptions {
        threshold,
        parsed_capacity: 100,
        dry_run: false,
        show_progress: false,
    }
}

fn file_store() -> (TempDir, FileStore) {
    let temp_dir = TempDir::new().unwrap();
    let paths = DataPaths::new(temp_dir.path());
    paths.initialize().unwrap();
    (temp_dir, FileStore::new(paths))
}

const A: &str = "https://a.example/story";
const B: &str = "https://b.example/other";

// ============================================================================
// Pipeline Tests
// ============================================================================

#[tokio::test]
async fn test_run_admits_enriches_commits_and_posts() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = vec![Box::new(RecordingPoster::default())];

    let report = run_curation(
        mentions(&[A, A, A, A, A, B]),
        &Blacklist::default(),
        &store,
        &enricher,
        &posters,
        &options(5),
    )
    .await
    .unwrap();

    assert_eq!(report.observed, 6);
    assert_eq!(report.distinct, 2);
    assert_eq!(report.admitted, vec![A.to_string()]);
    assert_eq!(report.enriched, 1);
    assert_eq!(report.post_failures, 0);
    assert!(report.committed);
    assert_eq!(report.posts[0].title, format!("Page {}", A));

    let state = store.load().unwrap();
    assert_eq!(state.posted.entries(), &[A]);
    assert_eq!(state.seen.entries(), &[A, B]);
    assert!(state.parsed.contains(A));
    assert!(!state.parsed.contains(B));
}

#[tokio::test]
async fn test_second_run_does_not_repost() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = Vec::new();
    let batch = mentions(&[A, A]);

    let first = run_curation(batch.clone(), &Blacklist::default(), &store, &enricher, &posters, &options(2))
        .await
        .unwrap();
    let second = run_curation(batch, &Blacklist::default(), &store, &enricher, &posters, &options(2))
        .await
        .unwrap();

    assert_eq!(first.admitted.len(), 1);
    assert!(second.admitted.is_empty());
    assert_eq!(store.load().unwrap().posted.len(), 1);
}

#[tokio::test]
async fn test_malformed_batch_admits_nothing_and_completes() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = vec![Box::new(RecordingPoster::default())];
    let batch = parse_batch(
        r#"[{"uri": 7}, {"uri": null, "title": "x"}, {"feed": "broken"}, {"title": ["no uri"]}]"#,
    )
    .unwrap();

    let report = run_curation(batch, &Blacklist::default(), &store, &enricher, &posters, &options(1))
        .await
        .unwrap();

    assert_eq!(report.observed, 0);
    assert!(report.admitted.is_empty());
    assert!(report.posts.is_empty());
    assert!(report.committed);
    assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(store.load().unwrap(), LedgerState::default());
}

#[tokio::test]
async fn test_null_fields_in_batch_still_count() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = Vec::new();
    let batch = parse_batch(&format!(
        r#"[{{"uri": "{A}", "title": "A"}}, {{"uri": "{A}", "title": null, "description": null}}, {{"uri": "{B}"}}]"#
    ))
    .unwrap();

    let report = run_curation(batch, &Blacklist::default(), &store, &enricher, &posters, &options(2))
        .await
        .unwrap();

    assert_eq!(report.observed, 3);
    assert_eq!(report.admitted, vec![A.to_string()]);
}

#[tokio::test]
async fn test_cached_records_are_not_enriched_again() {
    let store = SqliteStore::in_memory().unwrap();
    let cached = LinkRecord::new(A, "Cached title", "cached");
    store
        .commit(&LedgerState {
            seen: UrlLog::new(),
            posted: UrlLog::new(),
            parsed: ParsedCache::from_records(vec![cached]),
        })
        .unwrap();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = Vec::new();

    let report = run_curation(mentions(&[A]), &Blacklist::default(), &store, &enricher, &posters, &options(1))
        .await
        .unwrap();

    assert_eq!(enricher.calls.load(Ordering::SeqCst), 0);
    assert_eq!(report.enriched, 0);
    assert_eq!(report.posts[0].title, "Cached title");
}

#[tokio::test]
async fn test_enrichment_timeout_degrades_to_placeholder() {
    let (_tmp, store) = file_store();
    let url = "https://slow.example/timeout";
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = Vec::new();

    let report = run_curation(mentions(&[url]), &Blacklist::default(), &store, &enricher, &posters, &options(1))
        .await
        .unwrap();

    assert_eq!(report.admitted, vec![url.to_string()]);
    let state = store.load().unwrap();
    let record = state.parsed.get(url).unwrap();
    assert_eq!(record.title, url);
    assert_eq!(record.description, "");
    assert!(state.posted.contains(url));
}

#[tokio::test]
async fn test_failing_poster_does_not_block_others() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = vec![Box::new(FailingPoster), Box::new(RecordingPoster::default())];

    let report = run_curation(
        mentions(&[A, B]),
        &Blacklist::default(),
        &store,
        &enricher,
        &posters,
        &options(1),
    )
    .await
    .unwrap();

    assert_eq!(report.admitted.len(), 2);
    assert_eq!(report.post_failures, 2);
    assert!(report.committed);
    let state = store.load().unwrap();
    assert!(state.posted.contains(A));
    assert!(state.posted.contains(B));
}

#[tokio::test]
async fn test_every_poster_receives_every_post() {
    use std::sync::Arc;

    struct Shared(Arc<RecordingPoster>);

    #[async_trait]
    impl Poster for Shared {
        fn platform(&self) -> &str {
            self.0.platform()
        }

        async fn post(&self, post: &LinkPost) -> FetchResult<()> {
            self.0.post(post).await
        }
    }

    let (_tmp, store) = file_store();
    let recorder = Arc::new(RecordingPoster::default());
    let posters: Vec<Box<dyn Poster>> = vec![
        Box::new(FailingPoster),
        Box::new(Shared(Arc::clone(&recorder))),
    ];

    run_curation(
        mentions(&[B, A, A]),
        &Blacklist::default(),
        &store,
        &StubEnricher::default(),
        &posters,
        &options(1),
    )
    .await
    .unwrap();

    let posted: Vec<String> = recorder.posts.lock().unwrap().iter().map(|p| p.url.clone()).collect();
    assert_eq!(posted, vec![A.to_string(), B.to_string()]);
}

#[tokio::test]
async fn test_dry_run_leaves_ledger_untouched() {
    let (_tmp, store) = file_store();
    let enricher = StubEnricher::default();
    let posters: Vec<Box<dyn Poster>> = vec![Box::new(FailingPoster)];
    let mut opts = options(1);
    opts.dry_run = true;

    let report = run_curation(mentions(&[A]), &Blacklist::default(), &store, &enricher, &posters, &opts)
        .await
        .unwrap();

    assert_eq!(report.admitted, vec![A.to_string()]);
    assert_eq!(report.posts.len(), 1);
    assert_eq!(report.post_failures, 0);
    assert!(!report.committed);
    assert_eq!(store.load().unwrap(), LedgerState::default());
}

#[tokio::test]
async fn test_blacklisted_links_are_seen_but_not_posted() {
    let (_tmp, store) = file_store();
    let posters: Vec<Box<dyn Poster>> = Vec::new();

    let report = run_curation(
        mentions(&[A, A, A]),
        &Blacklist::new(["a.example"]),
        &store,
        &StubEnricher::default(),
        &posters,
        &options(1),
    )
    .await
    .unwrap();

    assert!(report.admitted.is_empty());
    let state = store.load().unwrap();
    assert!(state.seen.contains(A));
    assert!(state.posted.is_empty());
}

#[tokio::test]
async fn test_sqlite_run_is_recorded() {
    let store = SqliteStore::in_memory().unwrap();
    let posters: Vec<Box<dyn Poster>> = vec![Box::new(FailingPoster)];

    run_curation(
        mentions(&[A, A]),
        &Blacklist::default(),
        &store,
        &StubEnricher::default(),
        &posters,
        &options(2),
    )
    .await
    .unwrap();

    let runs = store.get_runs(5).unwrap();
    assert_eq!(runs.len(), 1);
    assert_eq!(runs[0].2, 1);
    assert_eq!(runs[0].3, 1);
}

// ============================================================================
// Post Construction Tests
// ============================================================================

#[test]
fn test_post_for_prefers_enriched_fields() {
    let record = LinkRecord::new(A, "Real title", "Real description").with_thumbnail("https://img/1");
    let mut mention = LinkMention::new(A);
    mention.title = "Embed title".to_string();
    mention.thumb = Some("https://img/embed".to_string());

    let post = post_for(&record, Some(&mention));

    assert_eq!(post.title, "Real title");
    assert_eq!(post.description, "Real description");
    assert_eq!(post.thumbnail.as_deref(), Some("https://img/1"));
    assert_eq!(post.url, A);
}

#[test]
fn test_post_for_placeholder_falls_back_to_embed() {
    let record = LinkRecord::placeholder(A);
    let mut mention = LinkMention::new(A);
    mention.title = "Embed title".to_string();
    mention.description = "Embed description".to_string();
    mention.thumb = Some("https://img/embed".to_string());

    let post = post_for(&record, Some(&mention));

    assert_eq!(post.title, "Embed title");
    assert_eq!(post.description, "Embed description");
    assert_eq!(post.thumbnail.as_deref(), Some("https://img/embed"));
}

#[test]
fn test_post_for_placeholder_without_embed() {
    let post = post_for(&LinkRecord::placeholder(A), None);

    assert_eq!(post.title, A);
    assert_eq!(post.description, A);
    assert_eq!(post.url, A);
    assert_eq!(post.thumbnail, None);
}

#[test]
fn test_post_for_uses_canonical_link() {
    let mut record = LinkRecord::new(A, "T", "D");
    record.link = "https://a.example/canonical".to_string();

    let post = post_for(&record, None);

    assert_eq!(post.url, "https://a.example/canonical");
}
