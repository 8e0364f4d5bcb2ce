use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use clap::ArgMatches;
use colored::Colorize;
use linkdigest_core::cluster::{Cluster, MemberOrder};
use linkdigest_core::config::{DigestSettings, Settings, StoreBackend};
use linkdigest_core::curate::{CurateOptions, CurateReport, run_curation};
use linkdigest_core::digest::{DigestOptions, build_digest};
use linkdigest_core::ledger::LedgerState;
use linkdigest_core::similarity::TokenPolicy;
use linkdigest_core::store::{DataPaths, FileStore, LedgerStore, SqliteStore};
use linkdigest_fetch::{FeedSource, HttpEnricher, HttpFeed, JsonFileFeed, LogPoster, Poster, WebhookPoster};
use serde::Serialize;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use tracing::Level;
use url::Url;

const SETTINGS_HEADER: &str = "\
# linkdigest settings
#
# Every value below is the default; remove what you do not want to change.
# Webhook posters are added as:
#
# [[posters]]
# name = \"chat\"
# webhook = \"https://hooks.example/...\"

";

/// Installs the fmt subscriber on stderr. Safe to call more than once.
pub fn init_tracing(verbose: bool) {
    let level = if verbose { Level::DEBUG } else { Level::WARN };
    let _ = tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

/// Expands `~` in the data directory argument.
pub fn resolve_data_dir(raw: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(raw).as_ref())
}

/// Settings from `config`, or from the data directory's settings file, or
/// defaults when neither exists. An explicit `config` must exist.
pub fn load_settings(paths: &DataPaths, config: Option<&Path>) -> Result<Settings> {
    match config {
        Some(path) => Settings::load(path)
            .with_context(|| format!("Failed to load settings from {}", path.display())),
        None => Settings::load_or_default(&paths.settings)
            .with_context(|| format!("Failed to load settings from {}", paths.settings.display())),
    }
}

pub fn default_settings_toml() -> Result<String> {
    Ok(format!("{}{}", SETTINGS_HEADER, Settings::default().to_toml()?))
}

pub fn parse_backend(raw: &str) -> Result<StoreBackend> {
    raw.parse::<StoreBackend>().with_context(|| format!("Unknown ledger backend '{}'", raw))
}

pub fn parse_member_order(raw: &str) -> Result<MemberOrder> {
    match raw {
        "newest-first" => Ok(MemberOrder::NewestFirst),
        "seed-first" => Ok(MemberOrder::SeedFirst),
        other => bail!("Unknown member order '{}'", other),
    }
}

pub fn parse_tokenizer(raw: &str) -> Result<TokenPolicy> {
    match raw {
        "capitalized" => Ok(TokenPolicy::Capitalized),
        "all-words" => Ok(TokenPolicy::AllWords),
        other => bail!("Unknown tokenizer '{}'", other),
    }
}

/// Command-line values that replace settings for one digest run.
#[derive(Debug, Clone, Default)]
pub struct DigestOverrides {
    pub sim_threshold: Option<f64>,
    pub max_clusters: Option<usize>,
    pub display_window: Option<usize>,
    pub corpus_window: Option<usize>,
    pub member_order: Option<MemberOrder>,
    pub tokenizer: Option<TokenPolicy>,
}

impl DigestOverrides {
    pub fn from_args(args: &ArgMatches) -> Result<Self> {
        Ok(Self {
            sim_threshold: args.get_one::<f64>("sim-threshold").copied(),
            max_clusters: args.get_one::<usize>("max-clusters").copied(),
            display_window: args.get_one::<usize>("display-window").copied(),
            corpus_window: args.get_one::<usize>("corpus-window").copied(),
            member_order: args
                .get_one::<String>("member-order")
                .map(|s| parse_member_order(s))
                .transpose()?,
            tokenizer: args
                .get_one::<String>("tokenizer")
                .map(|s| parse_tokenizer(s))
                .transpose()?,
        })
    }

    pub fn apply(&self, digest: &mut DigestSettings) {
        if let Some(v) = self.sim_threshold {
            digest.sim_threshold = v;
        }
        if let Some(v) = self.max_clusters {
            digest.max_clusters = v;
        }
        if let Some(v) = self.display_window {
            digest.display_window = v;
        }
        if let Some(v) = self.corpus_window {
            digest.corpus_window = v;
        }
        if let Some(v) = self.member_order {
            digest.member_order = v;
        }
        if let Some(v) = self.tokenizer {
            digest.tokenizer = v;
        }
    }
}

pub fn open_store(paths: &DataPaths, backend: StoreBackend) -> Result<Box<dyn LedgerStore>> {
    Ok(match backend {
        StoreBackend::Files => Box::new(FileStore::new(paths.clone())),
        StoreBackend::Sqlite => Box::new(
            SqliteStore::open(&paths.database)
                .with_context(|| format!("Failed to open {}", paths.database.display()))?,
        ),
    })
}

/// One webhook poster per configured entry; a log-only poster when none are
/// configured.
pub fn build_posters(settings: &Settings) -> Result<Vec<Box<dyn Poster>>> {
    if settings.posters.is_empty() {
        return Ok(vec![Box::new(LogPoster)]);
    }
    settings
        .posters
        .iter()
        .map(|p| -> Result<Box<dyn Poster>> {
            let poster = WebhookPoster::new(&p.name, &p.webhook, settings.curate.post_timeout_secs)
                .with_context(|| format!("Invalid poster '{}'", p.name))?;
            Ok(Box::new(poster) as Box<dyn Poster>)
        })
        .collect()
}

pub fn feed_source(
    file: Option<&PathBuf>,
    url: Option<&Url>,
    timeout_secs: u64,
) -> Result<Box<dyn FeedSource>> {
    if let Some(path) = file {
        Ok(Box::new(JsonFileFeed::new(path.clone())))
    } else if let Some(url) = url {
        Ok(Box::new(HttpFeed::new(url.as_str(), timeout_secs)?))
    } else {
        bail!("Either --feed-file or --feed-url must be provided")
    }
}

#[derive(Serialize)]
struct DigestDocument<'a> {
    generated_at: DateTime<Utc>,
    links: usize,
    clusters: &'a [Cluster],
}

/// The digest as handed to the renderer.
pub fn digest_json(clusters: &[Cluster], generated_at: DateTime<Utc>) -> Result<String> {
    let document = DigestDocument {
        generated_at,
        links: clusters.iter().map(Cluster::size).sum(),
        clusters,
    };
    Ok(serde_json::to_string_pretty(&document)?)
}

pub fn render_curate_summary(report: &CurateReport) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Mentions observed: {}\n", report.observed));
    out.push_str(&format!("  Distinct links: {}\n", report.distinct));
    out.push_str(&format!("  Admitted: {}\n", report.admitted.len()));
    out.push_str(&format!("  Newly enriched: {}\n", report.enriched));
    if report.committed {
        out.push_str(&format!("  Post failures: {}\n", report.post_failures));
    } else {
        out.push_str("  Dry run: nothing saved or posted\n");
    }
    if !report.posts.is_empty() {
        out.push('\n');
        for post in &report.posts {
            out.push_str(&format!("  • {}\n    {}\n", post.title, post.url));
        }
    }
    out
}

pub fn render_status(state: &LedgerState, limit: usize) -> String {
    let mut out = String::new();
    out.push_str(&format!("  Seen links: {}\n", state.seen.len()));
    out.push_str(&format!("  Posted links: {}\n", state.posted.len()));
    out.push_str(&format!("  Parsed cache: {}\n", state.parsed.len()));

    if limit > 0 && !state.posted.is_empty() {
        out.push_str("\n  Recently posted:\n");
        for url in state.posted.recent().take(limit) {
            match state.parsed.get(url) {
                Some(record) if !record.is_placeholder() => {
                    out.push_str(&format!("  • {}\n    {}\n", record.title, url))
                }
                _ => out.push_str(&format!("  • {}\n", url)),
            }
        }
    }
    out
}

pub fn render_runs(runs: &[(String, i64, i64, i64)]) -> String {
    let mut out = String::from("\n  Recent runs:\n");
    for (id, start, admitted, failures) in runs {
        let when = DateTime::from_timestamp(*start, 0)
            .map(|t| t.format("%Y-%m-%d %H:%M").to_string())
            .unwrap_or_else(|| start.to_string());
        let short_id: String = id.chars().take(8).collect();
        out.push_str(&format!(
            "  {} {}  admitted {}, post failures {}\n",
            short_id, when, admitted, failures
        ));
    }
    out
}

/// Removes the ledger files and database. Configuration lists stay.
pub fn reset_ledger(paths: &DataPaths) -> Result<Vec<PathBuf>> {
    let mut removed = Vec::new();
    for path in [&paths.posted, &paths.seen, &paths.parsed] {
        if path.exists() {
            fs::remove_file(path).with_context(|| format!("Failed to remove {}", path.display()))?;
            removed.push(path.clone());
        }
    }
    if SqliteStore::exists(&paths.database) {
        SqliteStore::drop(&paths.database)?;
        removed.push(paths.database.clone());
    }
    Ok(removed)
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn config_path(args: &ArgMatches) -> Option<&Path> {
    args.get_one::<PathBuf>("config").map(PathBuf::as_path)
}

fn data_paths(args: &ArgMatches) -> DataPaths {
    let raw = args
        .get_one::<String>("data-dir")
        .map(String::as_str)
        .unwrap_or("~/.config/linkdigest/");
    DataPaths::new(resolve_data_dir(raw))
}

fn backend_for(args: &ArgMatches, settings: &Settings) -> Result<StoreBackend> {
    match args.get_one::<String>("backend") {
        Some(raw) => parse_backend(raw),
        None => Ok(settings.store.backend),
    }
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    let paths = data_paths(args);
    let force = args.get_flag("force");

    print_divider();
    println!("{}", "  LINKDIGEST INITIALIZATION".bright_white().bold());
    print_divider();
    println!();
    println!(
        "{} Target: {}",
        "→".blue(),
        paths.root.display().to_string().bright_white()
    );

    if force {
        for path in reset_ledger(&paths)? {
            println!(
                "  {} removed {}",
                "✗".yellow(),
                path.display().to_string().bright_white()
            );
        }
    }

    let created = paths
        .initialize()
        .with_context(|| format!("Failed to initialize {}", paths.root.display()))?;
    for path in &created {
        println!(
            "  {} {}",
            "✓".green(),
            path.display().to_string().bright_white()
        );
    }

    if force || !paths.settings.exists() {
        fs::write(&paths.settings, default_settings_toml()?)
            .with_context(|| format!("Failed to write {}", paths.settings.display()))?;
        println!(
            "  {} {}",
            "✓".green(),
            paths.settings.display().to_string().bright_white()
        );
    } else {
        println!(
            "  {} keeping existing {}",
            "→".blue(),
            paths.settings.display().to_string().bright_white()
        );
    }

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!(
        "{} Add blocked domains to {}",
        "ℹ".blue(),
        paths.blacklist.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

pub async fn handle_curate(args: &ArgMatches, show_progress: bool) -> Result<()> {
    let paths = data_paths(args);
    let mut settings = load_settings(&paths, config_path(args))?;
    if let Some(threshold) = args.get_one::<usize>("threshold") {
        settings.curate.threshold = *threshold;
    }
    settings.validate()?;

    // Missing blacklist aborts before anything is read for mutation
    let blacklist = paths
        .load_blacklist()
        .context("Run `linkdigest init` to create the data directory")?;

    let source = feed_source(
        args.get_one::<PathBuf>("feed-file"),
        args.get_one::<Url>("feed-url"),
        settings.curate.enrich_timeout_secs,
    )?;
    let batch = source.fetch_batch().await.context("Failed to read feed")?;

    let enricher = HttpEnricher::with_timeout(settings.curate.enrich_timeout_secs)?;
    let posters = build_posters(&settings)?;
    let store = open_store(&paths, backend_for(args, &settings)?)?;

    let options = CurateOptions {
        threshold: settings.curate.threshold,
        parsed_capacity: settings.curate.parsed_capacity,
        dry_run: args.get_flag("dry-run"),
        show_progress,
    };
    let report = run_curation(batch, &blacklist, store.as_ref(), &enricher, &posters, &options).await?;

    println!("\n{} Curation complete!\n", "✓".green().bold());
    print!("{}", render_curate_summary(&report));
    println!();
    Ok(())
}

pub fn handle_digest(args: &ArgMatches) -> Result<()> {
    let paths = data_paths(args);
    let mut settings = load_settings(&paths, config_path(args))?;
    DigestOverrides::from_args(args)?.apply(&mut settings.digest);
    settings.validate()?;

    let store = open_store(&paths, backend_for(args, &settings)?)?;
    let state = store.load()?;
    let stopwords = paths.load_stopwords()?;
    let mut vocabulary = paths.load_vocabulary()?;

    let clusters = build_digest(
        &state,
        &stopwords,
        &mut vocabulary,
        &DigestOptions::from(&settings.digest),
    )?;
    if vocabulary.is_changed() {
        paths.save_vocabulary(&vocabulary)?;
    }

    let json = digest_json(&clusters, Utc::now())?;
    match args.get_one::<PathBuf>("output") {
        Some(path) => {
            fs::write(path, json).with_context(|| format!("Failed to write {}", path.display()))?;
            println!(
                "{} Digest with {} clusters written to {}",
                "✓".green().bold(),
                clusters.len(),
                path.display().to_string().bright_white()
            );
        }
        None => {
            let mut stdout = io::stdout().lock();
            writeln!(stdout, "{}", json)?;
        }
    }
    Ok(())
}

pub fn handle_status(args: &ArgMatches) -> Result<()> {
    let paths = data_paths(args);
    let settings = load_settings(&paths, config_path(args))?;
    let limit = args.get_one::<usize>("limit").copied().unwrap_or(10);
    let backend = backend_for(args, &settings)?;

    let (state, runs) = match backend {
        StoreBackend::Files => (FileStore::new(paths.clone()).load()?, Vec::new()),
        StoreBackend::Sqlite => {
            let store = SqliteStore::open(&paths.database)?;
            (store.load()?, store.get_runs(5)?)
        }
    };

    println!(
        "{} {}\n",
        "Ledger:".bright_blue().bold(),
        paths.root.display().to_string().bright_white()
    );
    print!("{}", render_status(&state, limit));
    if !runs.is_empty() {
        print!("{}", render_runs(&runs));
    }
    println!();
    Ok(())
}
