// Cluster labels from the fitted TF-IDF model

use crate::similarity::TfidfModel;
use std::collections::{BTreeMap, BTreeSet, HashMap};

/// Top `top_n` terms of a cluster by summed TF-IDF weight across its texts.
///
/// Ties keep feature order. Terms whose summed weight is zero are never
/// returned.
pub fn extract_keywords<S: AsRef<str>>(texts: &[S], model: &TfidfModel, top_n: usize) -> Vec<String> {
    let mut sums: HashMap<usize, f64> = HashMap::new();
    for text in texts {
        for (index, weight) in model.transform(text.as_ref()) {
            *sums.entry(index).or_default() += weight;
        }
    }

    let mut ranked: Vec<(usize, f64)> = sums.into_iter().filter(|(_, w)| *w > 0.0).collect();
    ranked.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));

    ranked
        .into_iter()
        .take(top_n)
        .map(|(index, _)| model.terms()[index].clone())
        .collect()
}

/// Persistent mapping of lower-case keyword to its display form, plus the
/// keywords never to show.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeywordVocabulary {
    display: BTreeMap<String, String>,
    deny: BTreeSet<String>,
    changed: bool,
}

impl KeywordVocabulary {
    pub fn new<D, N>(display: D, deny: N) -> Self
    where
        D: IntoIterator<Item = (String, String)>,
        N: IntoIterator<Item = String>,
    {
        Self {
            display: display
                .into_iter()
                .map(|(k, v)| (k.trim().to_lowercase(), v.trim().to_string()))
                .filter(|(k, _)| !k.is_empty())
                .collect(),
            deny: deny
                .into_iter()
                .map(|w| w.trim().to_lowercase())
                .filter(|w| !w.is_empty())
                .collect(),
            changed: false,
        }
    }

    /// Display forms for `terms`, dropping denied ones. Unknown terms are
    /// added with themselves as display form.
    pub fn label(&mut self, terms: &[String]) -> Vec<String> {
        let mut labels = Vec::with_capacity(terms.len());
        for term in terms {
            let key = term.to_lowercase();
            if self.deny.contains(&key) {
                continue;
            }
            let display = self.display.entry(key).or_insert_with(|| {
                self.changed = true;
                term.clone()
            });
            labels.push(display.clone());
        }
        labels
    }

    pub fn display_of(&self, term: &str) -> Option<&str> {
        self.display.get(&term.to_lowercase()).map(String::as_str)
    }

    pub fn is_denied(&self, term: &str) -> bool {
        self.deny.contains(&term.to_lowercase())
    }

    /// `(keyword, display)` pairs in keyword order.
    pub fn entries(&self) -> impl Iterator<Item = (&str, &str)> {
        self.display.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.display.len()
    }

    pub fn is_empty(&self) -> bool {
        self.display.is_empty()
    }

    /// Whether `label` added entries since load.
    pub fn is_changed(&self) -> bool {
        self.changed
    }
}
