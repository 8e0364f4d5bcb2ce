use chrono::{TimeZone, Utc};
use linkdigest::handlers::*;
use linkdigest_core::cluster::{Cluster, MemberOrder};
use linkdigest_core::config::{DigestSettings, PosterSettings, Settings, StoreBackend};
use linkdigest_core::curate::CurateReport;
use linkdigest_core::ledger::{LedgerState, ParsedCache, UrlLog};
use linkdigest_core::similarity::TokenPolicy;
use linkdigest_core::store::{DataPaths, LedgerStore, SqliteStore};
use linkdigest_fetch::{LinkPost, LinkRecord, Poster};
use std::fs;
use std::path::PathBuf;
use tempfile::TempDir;
use url::Url;

#[test]
fn test_resolve_data_dir_plain_path() {
    assert_eq!(resolve_data_dir("/tmp/linkdigest"), PathBuf::from("/tmp/linkdigest"));
}

#[test]
fn test_resolve_data_dir_expands_tilde() {
    let resolved = resolve_data_dir("~/.config/linkdigest");
    assert!(!resolved.to_string_lossy().starts_with('~'));
    assert!(resolved.ends_with(".config/linkdigest"));
}

#[test]
fn test_load_settings_prefers_explicit_file() -> Result<(), Box<dyn std::error::Error>> {
    let temp_dir = TempDir::new()?;
    let paths = DataPaths::new(temp_dir.path());
    fs::write(&paths.settings, "[curate]\nthreshold = 7\n")?;
    let explicit = temp_dir.path().join("other.toml");
    fs::write(&explicit, "[curate]\nthreshold = 2\n")?;

    assert_eq!(load_settings(&paths, None)?.curate.threshold, 7);
    assert_eq!(load_settings(&paths, Some(explicit.as_path()))?.curate.threshold, 2);
    Ok(())
}

#[test]
fn test_load_settings_missing_explicit_file_fails() {
    let temp_dir = TempDir::new().unwrap();
    let paths = DataPaths::new(temp_dir.path());

    let result = load_settings(&paths, Some(temp_dir.path().join("missing.toml").as_path()));

    assert!(result.is_err());
    assert!(result.unwrap_err().to_string().contains("missing.toml"));
}

#[test]
fn test_default_settings_toml_parses_back() {
    let text = default_settings_toml().unwrap();
    let parsed: Settings = toml_roundtrip(&text);

    assert!(text.starts_with("# linkdigest settings"));
    assert_eq!(parsed, Settings::default());
}

fn toml_roundtrip(text: &str) -> Settings {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("linkdigest.toml");
    fs::write(&path, text).unwrap();
    Settings::load(&path).unwrap()
}

#[test]
fn test_parsers() {
    assert_eq!(parse_backend("sqlite").unwrap(), StoreBackend::Sqlite);
    assert!(parse_backend("mongo").is_err());
    assert_eq!(parse_member_order("seed-first").unwrap(), MemberOrder::SeedFirst);
    assert!(parse_member_order("random").is_err());
    assert_eq!(parse_tokenizer("all-words").unwrap(), TokenPolicy::AllWords);
    assert!(parse_tokenizer("bigrams").is_err());
}

#[test]
fn test_digest_overrides_apply_only_given_values() {
    let mut digest = DigestSettings::default();
    let overrides = DigestOverrides {
        sim_threshold: Some(0.3),
        member_order: Some(MemberOrder::SeedFirst),
        ..Default::default()
    };

    overrides.apply(&mut digest);

    assert_eq!(digest.sim_threshold, 0.3);
    assert_eq!(digest.member_order, MemberOrder::SeedFirst);
    assert_eq!(digest.max_clusters, 10);
    assert_eq!(digest.display_window, 50);
}

#[test]
fn test_build_posters_defaults_to_log() {
    let posters = build_posters(&Settings::default()).unwrap();
    assert_eq!(posters.len(), 1);
    assert_eq!(posters[0].platform(), "log");
}

#[test]
fn test_build_posters_from_settings() {
    let mut settings = Settings::default();
    settings.posters.push(PosterSettings {
        name: "chat".to_string(),
        webhook: "https://hooks.example/abc".to_string(),
    });

    let posters = build_posters(&settings).unwrap();

    assert_eq!(posters.len(), 1);
    assert_eq!(posters[0].platform(), "chat");
}

#[test]
fn test_build_posters_rejects_bad_webhook() {
    let mut settings = Settings::default();
    settings.posters.push(PosterSettings {
        name: "broken".to_string(),
        webhook: "not a url".to_string(),
    });

    assert!(build_posters(&settings).is_err());
}

#[test]
fn test_feed_source_requires_input() {
    let result = feed_source(None, None, 5);
    assert!(result.is_err());
    assert!(
        result
            .err()
            .unwrap()
            .to_string()
            .contains("Either --feed-file or --feed-url must be provided")
    );
}

#[test]
fn test_feed_source_accepts_file_or_url() {
    let path = PathBuf::from("batch.json");
    let url = Url::parse("https://feed.example/batch.json").unwrap();

    assert!(feed_source(Some(&path), None, 5).is_ok());
    assert!(feed_source(None, Some(&url), 5).is_ok());
}

#[test]
fn test_open_store_sqlite_creates_database() {
    let temp_dir = TempDir::new().unwrap();
    let paths = DataPaths::new(temp_dir.path());

    let store = open_store(&paths, StoreBackend::Sqlite).unwrap();

    assert!(SqliteStore::exists(&paths.database));
    assert_eq!(store.load().unwrap(), LedgerState::default());
}

#[test]
fn test_reset_ledger_keeps_configuration() {
    let temp_dir = TempDir::new().unwrap();
    let paths = DataPaths::new(temp_dir.path());
    paths.initialize().unwrap();
    fs::write(&paths.blacklist, "spam.example\n").unwrap();
    fs::write(&paths.posted, "https://a.example/\n").unwrap();

    let removed = reset_ledger(&paths).unwrap();

    assert!(removed.contains(&paths.posted));
    assert!(!paths.posted.exists());
    assert!(paths.blacklist.exists());
}

#[test]
fn test_digest_json_shape() {
    let clusters = vec![Cluster {
        representative: LinkRecord::new("u1", "Alpha", "first"),
        members: vec![LinkRecord::new("u2", "Alpha again", "second")],
        keywords: vec!["alpha".to_string()],
    }];
    let generated_at = Utc.with_ymd_and_hms(2024, 6, 1, 8, 0, 0).unwrap();

    let json = digest_json(&clusters, generated_at).unwrap();
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();

    assert_eq!(value["links"], 2);
    assert_eq!(value["clusters"][0]["representative"]["url"], "u1");
    assert_eq!(value["clusters"][0]["members"][0]["title"], "Alpha again");
    assert_eq!(value["clusters"][0]["keywords"][0], "alpha");
    assert!(value["generated_at"].as_str().unwrap().starts_with("2024-06-01T08:00:00"));
}

#[test]
fn test_render_curate_summary() {
    let report = CurateReport {
        observed: 12,
        distinct: 4,
        admitted: vec!["https://a.example/".to_string()],
        enriched: 1,
        posts: vec![LinkPost {
            title: "A story".to_string(),
            description: "About a".to_string(),
            url: "https://a.example/".to_string(),
            thumbnail: None,
        }],
        post_failures: 0,
        committed: true,
    };

    let summary = render_curate_summary(&report);

    assert!(summary.contains("Mentions observed: 12"));
    assert!(summary.contains("Admitted: 1"));
    assert!(summary.contains("A story"));
    assert!(!summary.contains("Dry run"));
}

#[test]
fn test_render_curate_summary_dry_run() {
    let summary = render_curate_summary(&CurateReport::default());
    assert!(summary.contains("Dry run"));
}

#[test]
fn test_render_status_lists_recent_posts() {
    let state = LedgerState {
        seen: UrlLog::from_entries(["u1", "u2", "u3"]),
        posted: UrlLog::from_entries(["u1", "u2"]),
        parsed: ParsedCache::from_records(vec![
            LinkRecord::new("u1", "First", ""),
            LinkRecord::placeholder("u2"),
        ]),
    };

    let status = render_status(&state, 10);

    assert!(status.contains("Seen links: 3"));
    assert!(status.contains("Posted links: 2"));
    assert!(status.contains("Parsed cache: 2"));
    let u2 = status.find("• u2").unwrap();
    let first = status.find("• First").unwrap();
    assert!(u2 < first);
}

#[test]
fn test_render_status_limit_zero_hides_list() {
    let state = LedgerState {
        posted: UrlLog::from_entries(["u1"]),
        ..Default::default()
    };
    assert!(!render_status(&state, 0).contains("Recently posted"));
}

#[test]
fn test_render_runs() {
    let runs = vec![(
        "0123456789abcdef".to_string(),
        Utc.with_ymd_and_hms(2024, 6, 1, 8, 30, 0).unwrap().timestamp(),
        3,
        1,
    )];

    let text = render_runs(&runs);

    assert!(text.contains("01234567 2024-06-01 08:30"));
    assert!(text.contains("admitted 3, post failures 1"));
}
