//! TF-IDF vectors and pairwise cosine similarity over link texts.
//!
//! Each record's text (`title + " " + description`) is first reduced to a
//! signal by the configured [`TokenPolicy`], then lower-cased, split into
//! word tokens of two or more characters and stripped of stopwords. The
//! model can be fitted on a larger historical corpus than the window it
//! scores, so document frequencies reflect more than the displayed links.

use linkdigest_fetch::LinkRecord;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};
use std::sync::LazyLock;
use tracing::debug;

// Upper-case initial (German umlauts included) followed by lower-case letters
static CAPITALIZED: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b[A-ZÄÖÜ][a-zäöüß]+\b").expect("capitalized-word pattern"));

static WORD: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\b\w\w+\b").expect("word pattern"));

/// How the similarity signal is extracted from a record's text.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TokenPolicy {
    /// Keep only capitalized words, which favours named entities and topic
    /// nouns over filler.
    #[default]
    Capitalized,
    /// Keep the full text.
    AllWords,
}

impl TokenPolicy {
    pub fn signal(&self, text: &str) -> String {
        match self {
            TokenPolicy::Capitalized => CAPITALIZED
                .find_iter(text)
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(" "),
            TokenPolicy::AllWords => text.to_string(),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPolicy::Capitalized => "capitalized",
            TokenPolicy::AllWords => "all-words",
        }
    }
}

/// Sparse, L2-normalised term-weight vector sorted by feature index.
pub type SparseVector = Vec<(usize, f64)>;

/// A fitted term-weighting model.
#[derive(Debug, Clone)]
pub struct TfidfModel {
    policy: TokenPolicy,
    stopwords: HashSet<String>,
    vocabulary: BTreeMap<String, usize>,
    terms: Vec<String>,
    idf: Vec<f64>,
}

impl TfidfModel {
    /// Fits document frequencies on `texts`. Stopwords compare
    /// case-insensitively. Feature order is lexicographic term order.
    pub fn fit<S: AsRef<str>>(texts: &[S], stopwords: &HashSet<String>, policy: TokenPolicy) -> Self {
        let stopwords: HashSet<String> = stopwords.iter().map(|w| w.to_lowercase()).collect();

        let documents: Vec<BTreeSet<String>> = texts
            .iter()
            .map(|t| analyze(&policy.signal(t.as_ref()), &stopwords).into_iter().collect())
            .collect();

        let mut document_frequency: BTreeMap<String, usize> = BTreeMap::new();
        for doc in &documents {
            for term in doc {
                *document_frequency.entry(term.clone()).or_default() += 1;
            }
        }

        let n = documents.len() as f64;
        let mut vocabulary = BTreeMap::new();
        let mut terms = Vec::with_capacity(document_frequency.len());
        let mut idf = Vec::with_capacity(document_frequency.len());
        for (index, (term, df)) in document_frequency.into_iter().enumerate() {
            idf.push(((1.0 + n) / (1.0 + df as f64)).ln() + 1.0);
            vocabulary.insert(term.clone(), index);
            terms.push(term);
        }

        debug!(
            "TF-IDF fitted: {} documents, {} terms ({})",
            texts.len(),
            terms.len(),
            policy.as_str()
        );

        Self {
            policy,
            stopwords,
            vocabulary,
            terms,
            idf,
        }
    }

    /// Weights `text` against the fitted vocabulary; unknown terms are ignored.
    pub fn transform(&self, text: &str) -> SparseVector {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for token in analyze(&self.policy.signal(text), &self.stopwords) {
            if let Some(&index) = self.vocabulary.get(&token) {
                *counts.entry(index).or_default() += 1.0;
            }
        }

        let mut vector: SparseVector = counts
            .into_iter()
            .map(|(index, tf)| (index, tf * self.idf[index]))
            .collect();

        let norm = vector.iter().map(|(_, w)| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, w) in vector.iter_mut() {
                *w /= norm;
            }
        } else {
            vector.clear();
        }
        vector
    }

    /// Terms in feature order.
    pub fn terms(&self) -> &[String] {
        &self.terms
    }

    pub fn vocabulary_len(&self) -> usize {
        self.terms.len()
    }

    pub fn policy(&self) -> TokenPolicy {
        self.policy
    }
}

fn analyze(signal: &str, stopwords: &HashSet<String>) -> Vec<String> {
    let lowered = signal.to_lowercase();
    WORD.find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .filter(|t| !stopwords.contains(t))
        .collect()
}

/// Cosine similarity of two normalised sparse vectors, 0 when either is empty.
pub fn cosine(a: &SparseVector, b: &SparseVector) -> f64 {
    let (mut i, mut j) = (0, 0);
    let mut dot = 0.0;
    while i < a.len() && j < b.len() {
        match a[i].0.cmp(&b[j].0) {
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
            std::cmp::Ordering::Equal => {
                dot += a[i].1 * b[j].1;
                i += 1;
                j += 1;
            }
        }
    }
    dot.clamp(0.0, 1.0)
}

/// Symmetric N×N matrix of similarities in `[0, 1]`.
#[derive(Debug, Clone, PartialEq)]
pub struct SimilarityMatrix {
    size: usize,
    values: Vec<f64>,
}

impl SimilarityMatrix {
    pub fn zeros(size: usize) -> Self {
        Self {
            size,
            values: vec![0.0; size * size],
        }
    }

    pub fn from_vectors(vectors: &[SparseVector]) -> Self {
        let mut matrix = Self::zeros(vectors.len());
        for i in 0..vectors.len() {
            for j in i..vectors.len() {
                let s = cosine(&vectors[i], &vectors[j]);
                matrix.set(i, j, s);
            }
        }
        matrix
    }

    /// Sets both `(i, j)` and `(j, i)`.
    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        self.values[i * self.size + j] = value;
        self.values[j * self.size + i] = value;
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.values[i * self.size + j]
    }

    pub fn len(&self) -> usize {
        self.size
    }

    pub fn is_empty(&self) -> bool {
        self.size == 0
    }
}

/// A model fitted on a corpus, scoring any window of records against it.
#[derive(Debug, Clone)]
pub struct SimilarityEngine {
    model: TfidfModel,
}

impl SimilarityEngine {
    pub fn fit(corpus: &[LinkRecord], stopwords: &HashSet<String>, policy: TokenPolicy) -> Self {
        let texts: Vec<String> = corpus.iter().map(LinkRecord::text).collect();
        Self {
            model: TfidfModel::fit(&texts, stopwords, policy),
        }
    }

    pub fn score(&self, window: &[LinkRecord]) -> SimilarityMatrix {
        let vectors: Vec<SparseVector> = window
            .iter()
            .map(|r| self.model.transform(&r.text()))
            .collect();
        SimilarityMatrix::from_vectors(&vectors)
    }

    pub fn model(&self) -> &TfidfModel {
        &self.model
    }
}

/// Fits on `records` and scores the same records.
pub fn build_similarity(
    records: &[LinkRecord],
    stopwords: &HashSet<String>,
    policy: TokenPolicy,
) -> SimilarityMatrix {
    SimilarityEngine::fit(records, stopwords, policy).score(records)
}
