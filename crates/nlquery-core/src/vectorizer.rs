//! TF-IDF vectorizer and sparse vector utilities.
//!
//! The vectorizer maps text into a fixed vocabulary space. It is fitted once
//! by the ingestion pipeline, persisted next to the document vectors, and
//! used by the retriever to place questions in the same space.
//!
//! # Weighting
//!
//! - term frequency: raw counts
//! - inverse document frequency (smoothed): `ln((1 + n) / (1 + df)) + 1`
//! - every vector is L2-normalized, so cosine similarity reduces to a dot
//!   product for well-formed vectors

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

/// English stop words excluded from the vocabulary, sorted for binary search.
const STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst", "amoungst",
    "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway", "anywhere",
    "are", "around", "as", "at", "back", "be", "became", "because", "become", "becomes", "becoming",
    "been", "before", "beforehand", "behind", "being", "below", "beside", "besides", "between",
    "beyond", "bill", "both", "bottom", "but", "by", "call", "can", "cannot", "cant", "co", "con",
    "could", "couldnt", "cry", "de", "describe", "detail", "do", "done", "down", "due", "during",
    "each", "eg", "eight", "either", "eleven", "else", "elsewhere", "empty", "enough", "etc",
    "even", "ever", "every", "everyone", "everything", "everywhere", "except", "few", "fifteen",
    "fifty", "fill", "find", "fire", "first", "five", "for", "former", "formerly", "forty", "found",
    "four", "from", "front", "full", "further", "get", "give", "go", "had", "has", "hasnt", "have",
    "he", "hence", "her", "here", "hereafter", "hereby", "herein", "hereupon", "hers", "herself",
    "him", "himself", "his", "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed",
    "interest", "into", "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least",
    "less", "ltd", "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more",
    "moreover", "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely",
    "neither", "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor",
    "not", "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own", "part",
    "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed", "seeming",
    "seems", "serious", "several", "she", "should", "show", "side", "since", "sincere", "six",
    "sixty", "so", "some", "somehow", "someone", "something", "sometime", "sometimes", "somewhere",
    "still", "such", "system", "take", "ten", "than", "that", "the", "their", "them", "themselves",
    "then", "thence", "there", "thereafter", "thereby", "therefore", "therein", "thereupon",
    "these", "they", "thick", "thin", "third", "this", "those", "though", "three", "through",
    "throughout", "thru", "thus", "to", "together", "too", "top", "toward", "towards", "twelve",
    "twenty", "two", "un", "under", "until", "up", "upon", "us", "very", "via", "was", "we", "well",
    "were", "what", "whatever", "when", "whence", "whenever", "where", "whereafter", "whereas",
    "whereby", "wherein", "whereupon", "wherever", "whether", "which", "while", "whither", "who",
    "whoever", "whole", "whom", "whose", "why", "will", "with", "within", "without", "would", "yet",
    "you", "your", "yours", "yourself", "yourselves",
];

/// A sparse vector: parallel column indices and weights.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SparseVector {
    pub indices: Vec<usize>,
    pub values: Vec<f32>,
}

impl SparseVector {
    pub fn is_empty(&self) -> bool {
        self.indices.is_empty()
    }

    /// A vector is well-formed when its indices and values line up and
    /// every index fits in `n_features` columns.
    pub fn is_well_formed(&self, n_features: usize) -> bool {
        self.indices.len() == self.values.len() && self.indices.iter().all(|&i| i < n_features)
    }

    fn norm(&self) -> f32 {
        self.values.iter().map(|v| v * v).sum::<f32>().sqrt()
    }

    fn as_map(&self) -> HashMap<usize, f32> {
        self.indices
            .iter()
            .copied()
            .zip(self.values.iter().copied())
            .collect()
    }
}

/// Compute cosine similarity between two sparse vectors.
///
/// Returns `0.0` when either vector is empty or has zero magnitude.
pub fn cosine_similarity(a: &SparseVector, b: &SparseVector) -> f32 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }

    let (small, large) = if a.indices.len() <= b.indices.len() {
        (a, b)
    } else {
        (b, a)
    };
    let lookup = large.as_map();
    let dot: f32 = small
        .indices
        .iter()
        .zip(small.values.iter())
        .filter_map(|(i, v)| lookup.get(i).map(|w| v * w))
        .sum();

    let denom = a.norm() * b.norm();
    if denom < f32::EPSILON {
        return 0.0;
    }
    dot / denom
}

/// Split text into lower-cased terms of at least two word characters,
/// dropping stop words.
pub fn tokenize(text: &str) -> Vec<String> {
    text.to_lowercase()
        .split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| t.chars().count() >= 2 && STOP_WORDS.binary_search(t).is_err())
        .map(str::to_string)
        .collect()
}

/// A fitted TF-IDF model.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    /// Term → column index.
    pub vocabulary: HashMap<String, usize>,
    /// Inverse document frequency per column.
    pub idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fit a vocabulary of at most `max_features` terms over `documents` and
    /// return the model together with the vector of every document.
    ///
    /// The most frequent terms (by total count, ties by term) are kept;
    /// columns are assigned in alphabetical order.
    pub fn fit<S: AsRef<str>>(documents: &[S], max_features: usize) -> (Self, Vec<SparseVector>) {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(d.as_ref())).collect();

        let mut totals: HashMap<&str, usize> = HashMap::new();
        let mut doc_freq: HashMap<&str, usize> = HashMap::new();
        for terms in &tokenized {
            let mut seen: HashSet<&str> = HashSet::new();
            for t in terms {
                *totals.entry(t.as_str()).or_default() += 1;
                if seen.insert(t.as_str()) {
                    *doc_freq.entry(t.as_str()).or_default() += 1;
                }
            }
        }

        let mut ranked: Vec<(&str, usize)> = totals.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));
        ranked.truncate(max_features);

        let mut kept: Vec<&str> = ranked.into_iter().map(|(t, _)| t).collect();
        kept.sort_unstable();

        let n = documents.len() as f32;
        let vocabulary: HashMap<String, usize> = kept
            .iter()
            .enumerate()
            .map(|(i, t)| (t.to_string(), i))
            .collect();
        let idf = kept
            .iter()
            .map(|t| {
                let df = doc_freq.get(t).copied().unwrap_or(0) as f32;
                ((1.0 + n) / (1.0 + df)).ln() + 1.0
            })
            .collect();

        let model = Self { vocabulary, idf };
        let vectors = tokenized.iter().map(|terms| model.weigh(terms)).collect();
        (model, vectors)
    }

    /// Number of columns in the vector space.
    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    /// Map text into the fitted vector space.
    pub fn transform(&self, text: &str) -> SparseVector {
        self.weigh(&tokenize(text))
    }

    fn weigh(&self, terms: &[String]) -> SparseVector {
        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        for t in terms {
            if let Some(&col) = self.vocabulary.get(t) {
                *counts.entry(col).or_default() += 1.0;
            }
        }

        let mut vector = SparseVector::default();
        for (col, tf) in counts {
            let idf = self.idf.get(col).copied().unwrap_or(0.0);
            vector.indices.push(col);
            vector.values.push(tf * idf);
        }

        let norm = vector.norm();
        if norm > f32::EPSILON {
            for v in &mut vector.values {
                *v /= norm;
            }
        }
        vector
    }
}
