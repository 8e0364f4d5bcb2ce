pub mod cluster;
pub mod config;
pub mod curate;
pub mod digest;
pub mod error;
pub mod keywords;
pub mod ledger;
pub mod normalize;
pub mod similarity;
pub mod store;

use colored::Colorize;

pub use cluster::{Cluster, ClusterParams, MemberOrder, cluster, partition};
pub use config::Settings;
pub use curate::{CurateOptions, CurateReport, run_curation};
pub use digest::{DigestOptions, build_digest, recent_records};
pub use error::CoreError;
pub use keywords::{KeywordVocabulary, extract_keywords};
pub use ledger::{Blacklist, LedgerState, ParsedCache, UrlLog, admit, merge_parsed, record_posted};
pub use normalize::normalize;
pub use similarity::{SimilarityEngine, SimilarityMatrix, TfidfModel, TokenPolicy, build_similarity};
pub use store::{DataPaths, FileStore, LedgerStore, SqliteStore};

pub fn print_banner() {
    let banner = r#"
  _ _       _     _ _                 _
 | (_)_ __ | | __| (_) __ _  ___  ___| |_
 | | | '_ \| |/ / _` | |/ _` |/ _ \/ __| __|
 | | | | | |   < (_| | | (_| |  __/\__ \ |_
 |_|_|_| |_|_|\_\__,_|_|\__, |\___||___/\__|
                        |___/
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}\n",
        "popular links, grouped by topic".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}
