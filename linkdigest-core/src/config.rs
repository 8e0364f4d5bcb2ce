// Run settings, read from linkdigest.toml when present

use crate::cluster::{ClusterParams, MemberOrder};
use crate::error::{CoreError, Result};
use crate::ledger::{DEFAULT_PARSED_CAPACITY, DEFAULT_THRESHOLD};
use crate::similarity::TokenPolicy;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::str::FromStr;
use tracing::debug;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub curate: CurateSettings,
    pub digest: DigestSettings,
    pub store: StoreSettings,
    pub posters: Vec<PosterSettings>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CurateSettings {
    /// Mentions needed in one batch before a link is posted
    pub threshold: usize,
    /// Maximum entries kept in the parsed-link cache
    pub parsed_capacity: usize,
    pub enrich_timeout_secs: u64,
    pub post_timeout_secs: u64,
}

impl Default for CurateSettings {
    fn default() -> Self {
        Self {
            threshold: DEFAULT_THRESHOLD,
            parsed_capacity: DEFAULT_PARSED_CAPACITY,
            enrich_timeout_secs: 10,
            post_timeout_secs: 10,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DigestSettings {
    pub sim_threshold: f64,
    pub max_clusters: usize,
    /// Most recent posted links shown in the digest
    pub display_window: usize,
    /// Most recent posted links the TF-IDF model is fitted on
    pub corpus_window: usize,
    pub member_order: MemberOrder,
    /// 0 disables keyword labels
    pub keywords_per_cluster: usize,
    pub tokenizer: TokenPolicy,
}

impl Default for DigestSettings {
    fn default() -> Self {
        Self {
            sim_threshold: 0.15,
            max_clusters: 10,
            display_window: 50,
            corpus_window: 500,
            member_order: MemberOrder::NewestFirst,
            keywords_per_cluster: 3,
            tokenizer: TokenPolicy::Capitalized,
        }
    }
}

impl DigestSettings {
    pub fn cluster_params(&self) -> ClusterParams {
        ClusterParams {
            sim_threshold: self.sim_threshold,
            max_clusters: self.max_clusters,
            member_order: self.member_order,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    #[default]
    Files,
    Sqlite,
}

impl FromStr for StoreBackend {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "files" | "file" => Ok(StoreBackend::Files),
            "sqlite" | "db" => Ok(StoreBackend::Sqlite),
            other => Err(CoreError::InvalidConfig(format!(
                "unknown store backend '{}' (expected files or sqlite)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub backend: StoreBackend,
}

/// A webhook to publish admitted links to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PosterSettings {
    pub name: String,
    pub webhook: String,
}

impl Settings {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&raw)?;
        settings.validate()?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Loads `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            debug!("No settings at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    pub fn validate(&self) -> Result<()> {
        let sim = self.digest.sim_threshold;
        if !sim.is_finite() || !(0.0..=1.0).contains(&sim) {
            return Err(CoreError::InvalidConfig(format!(
                "digest.sim_threshold must be within [0, 1], got {}",
                sim
            )));
        }
        if self.curate.threshold == 0 {
            return Err(CoreError::InvalidConfig(
                "curate.threshold must be at least 1".to_string(),
            ));
        }
        if self.curate.parsed_capacity == 0 {
            return Err(CoreError::InvalidConfig(
                "curate.parsed_capacity must be at least 1".to_string(),
            ));
        }
        Ok(())
    }

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}
