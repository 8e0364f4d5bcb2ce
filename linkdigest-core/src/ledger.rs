// Dedup / popularity ledger: which links were seen, enriched and posted

use crate::normalize::normalize;
use linkdigest_fetch::{LinkMention, LinkRecord};
use std::cmp::Reverse;
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;

pub const DEFAULT_THRESHOLD: usize = 5;
pub const DEFAULT_PARSED_CAPACITY: usize = 10_000;

/// Domain patterns whose links are never admitted.
///
/// A pattern matches when it occurs anywhere in the lower-cased URL, not just
/// in the host.
#[derive(Debug, Clone, Default)]
pub struct Blacklist {
    patterns: Vec<String>,
}

impl Blacklist {
    pub fn new<I, S>(patterns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let patterns = patterns
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { patterns }
    }

    pub fn matches(&self, url: &str) -> bool {
        let url = url.to_lowercase();
        self.patterns.iter().any(|p| url.contains(p.as_str()))
    }

    pub fn len(&self) -> usize {
        self.patterns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }
}

/// Append-only, insertion-ordered set of canonical URLs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UrlLog {
    entries: Vec<String>,
    index: HashSet<String>,
}

impl UrlLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a log from persisted lines; later duplicates are ignored.
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut log = Self::new();
        for entry in entries {
            log.push(entry);
        }
        log
    }

    /// Appends `url` unless it is already present. Returns whether it was added.
    pub fn push(&mut self, url: impl Into<String>) -> bool {
        let url = url.into();
        if url.is_empty() || self.index.contains(&url) {
            return false;
        }
        self.index.insert(url.clone());
        self.entries.push(url);
        true
    }

    pub fn contains(&self, url: &str) -> bool {
        self.index.contains(url)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in insertion order.
    pub fn entries(&self) -> &[String] {
        &self.entries
    }

    /// Most recently appended entries first.
    pub fn recent(&self) -> impl Iterator<Item = &String> {
        self.entries.iter().rev()
    }
}

/// Bounded map of canonical URL to enriched record, oldest-inserted first.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedCache {
    order: VecDeque<String>,
    records: HashMap<String, LinkRecord>,
}

impl ParsedCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads persisted records in their stored order; the first record for a
    /// URL wins. No truncation happens here.
    pub fn from_records<I>(records: I) -> Self
    where
        I: IntoIterator<Item = LinkRecord>,
    {
        let mut cache = Self::new();
        for record in records {
            cache.insert(record);
        }
        cache
    }

    fn insert(&mut self, record: LinkRecord) -> bool {
        if record.url.is_empty() || self.records.contains_key(&record.url) {
            return false;
        }
        self.order.push_back(record.url.clone());
        self.records.insert(record.url.clone(), record);
        true
    }

    pub fn get(&self, url: &str) -> Option<&LinkRecord> {
        self.records.get(url)
    }

    pub fn contains(&self, url: &str) -> bool {
        self.records.contains_key(url)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Records from oldest to newest insertion.
    pub fn iter(&self) -> impl Iterator<Item = &LinkRecord> {
        self.order.iter().filter_map(|url| self.records.get(url))
    }

    fn truncate_oldest(&mut self, capacity: usize) -> usize {
        let mut evicted = 0;
        while self.order.len() > capacity {
            if let Some(url) = self.order.pop_front() {
                self.records.remove(&url);
                evicted += 1;
            }
        }
        evicted
    }
}

/// Everything the ledger persists between runs.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerState {
    pub seen: UrlLog,
    pub posted: UrlLog,
    pub parsed: ParsedCache,
}

/// Decides which links of a batch get surfaced.
///
/// Mentions are grouped by canonical URL and counted. A URL is admitted when
/// its count reaches `threshold`, it matches no blacklist pattern and it was
/// never posted. Output is ordered by descending count, ties by first
/// appearance in the batch.
pub fn admit(
    batch: &[LinkMention],
    blacklist: &Blacklist,
    threshold: usize,
    posted: &UrlLog,
) -> Vec<String> {
    let mut counts: Vec<(String, usize)> = Vec::new();
    let mut slots: HashMap<String, usize> = HashMap::new();

    for mention in batch {
        let url = normalize(&mention.uri);
        if url.is_empty() {
            continue;
        }
        match slots.get(&url) {
            Some(&slot) => counts[slot].1 += 1,
            None => {
                slots.insert(url.clone(), counts.len());
                counts.push((url, 1));
            }
        }
    }

    // stable: equal counts keep first-seen order
    counts.sort_by_key(|(_, count)| Reverse(*count));

    let admitted: Vec<String> = counts
        .into_iter()
        .filter(|(url, count)| {
            if blacklist.matches(url) {
                debug!("Blacklisted: {}", url);
                return false;
            }
            *count >= threshold && !posted.contains(url)
        })
        .map(|(url, _)| url)
        .collect();

    debug!(
        "Admission: {} mentions, {} distinct, {} admitted (threshold {})",
        batch.len(),
        slots.len(),
        admitted.len(),
        threshold
    );
    admitted
}

/// Appends newly posted URLs in emission order. Existing entries are never
/// reordered or removed. Returns the number of URLs added.
pub fn record_posted(urls: &[String], posted: &mut UrlLog) -> usize {
    urls.iter().filter(|url| posted.push(url.as_str())).count()
}

/// Merges newly enriched records into the cache.
///
/// A URL already present keeps its first record. Afterwards the cache is cut
/// down to the `capacity` most recently inserted entries. Returns the number
/// of records inserted.
pub fn merge_parsed<I>(existing: &mut ParsedCache, newly_enriched: I, capacity: usize) -> usize
where
    I: IntoIterator<Item = LinkRecord>,
{
    let mut inserted = 0;
    for record in newly_enriched {
        if existing.insert(record) {
            inserted += 1;
        }
    }

    let evicted = existing.truncate_oldest(capacity);
    if evicted > 0 {
        debug!("Parsed cache evicted {} oldest entries", evicted);
    }
    inserted
}
