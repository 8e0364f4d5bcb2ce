use crate::error::{CoreError, Result};
use crate::similarity::SimilarityMatrix;
use linkdigest_fetch::LinkRecord;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::{debug, info};

/// How the links inside one cluster are ordered.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum MemberOrder {
    /// The seed stays the representative; others follow in pool order.
    SeedFirst,
    /// Most recently published first; undated links go last.
    #[default]
    NewestFirst,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ClusterParams {
    /// Pairs must score strictly above this to be grouped.
    pub sim_threshold: f64,
    pub max_clusters: usize,
    pub member_order: MemberOrder,
}

impl Default for ClusterParams {
    fn default() -> Self {
        Self {
            sim_threshold: 0.15,
            max_clusters: 10,
            member_order: MemberOrder::NewestFirst,
        }
    }
}

/// A topic group: one link for primary display plus related ones.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Cluster {
    pub representative: LinkRecord,
    pub members: Vec<LinkRecord>,
    pub keywords: Vec<String>,
}

impl Cluster {
    /// Number of links, representative included.
    pub fn size(&self) -> usize {
        self.members.len() + 1
    }

    /// Representative first, then members.
    pub fn records(&self) -> impl Iterator<Item = &LinkRecord> {
        std::iter::once(&self.representative).chain(self.members.iter())
    }
}

/// Greedy, seed-ordered partition of `0..similarity.len()`.
///
/// The first index still in the pool seeds a group that takes every other
/// pooled index scoring strictly above `sim_threshold` against the seed.
/// Stops after `max_clusters` groups or when the pool is empty; leftovers are
/// dropped. Each group lists the seed first, then members in pool order.
pub fn partition(similarity: &SimilarityMatrix, sim_threshold: f64, max_clusters: usize) -> Vec<Vec<usize>> {
    let n = similarity.len();
    let mut in_pool = vec![true; n];
    let mut remaining = n;
    let mut next_seed = 0;
    let mut groups = Vec::new();

    while groups.len() < max_clusters && remaining > 0 {
        while !in_pool[next_seed] {
            next_seed += 1;
        }
        let seed = next_seed;
        in_pool[seed] = false;
        remaining -= 1;

        let mut group = vec![seed];
        for candidate in seed + 1..n {
            if in_pool[candidate] && similarity.get(seed, candidate) > sim_threshold {
                in_pool[candidate] = false;
                remaining -= 1;
                group.push(candidate);
            }
        }
        groups.push(group);
    }

    if remaining > 0 {
        debug!("Cluster cap reached, {} links left unassigned", remaining);
    }
    groups
}

/// Groups `records` into at most `params.max_clusters` clusters.
pub fn cluster(records: &[LinkRecord], similarity: &SimilarityMatrix, params: &ClusterParams) -> Result<Vec<Cluster>> {
    if records.len() != similarity.len() {
        return Err(CoreError::DimensionMismatch {
            matrix: similarity.len(),
            records: records.len(),
        });
    }

    let clusters: Vec<Cluster> = partition(similarity, params.sim_threshold, params.max_clusters)
        .into_iter()
        .filter_map(|mut group| {
            if params.member_order == MemberOrder::NewestFirst {
                group.sort_by(|&a, &b| newest_first(&records[a], &records[b]));
            }
            let mut linked = group.into_iter().map(|idx| records[idx].clone());
            let representative = linked.next()?;
            Some(Cluster {
                representative,
                members: linked.collect(),
                keywords: Vec::new(),
            })
        })
        .collect();

    info!(
        "Clustered {} links into {} groups (threshold {}, cap {})",
        records.len(),
        clusters.len(),
        params.sim_threshold,
        params.max_clusters
    );
    Ok(clusters)
}

fn newest_first(a: &LinkRecord, b: &LinkRecord) -> Ordering {
    match (a.published, b.published) {
        (Some(x), Some(y)) => y.cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
