// ============================================
// Text Feature Builder (TF-IDF)
// ============================================
//
// title + author + description + categories
//   → clean → tokens (unigrams + bigrams, stop words removed)
//   → df pruning → vocabulary cap → tf × idf → L2-normalised CSR rows

use super::rating_matrix::IdIndex;
use super::stop_words::is_stop_word;
use crate::config::EngineConfig;
use crate::error::{AppError, Result};
use crate::models::Book;
use serde::{Deserialize, Serialize};
use sprs::{CsMat, CsVec, TriMat};
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, info};

/// Lowercase, turn everything but ASCII letters and whitespace into spaces,
/// collapse whitespace runs and trim.
pub fn clean_text(text: &str) -> String {
    let replaced: String = text
        .to_lowercase()
        .chars()
        .map(|c| {
            if c.is_ascii_alphabetic() || c.is_whitespace() {
                c
            } else {
                ' '
            }
        })
        .collect();
    replaced.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unigrams and bigrams of the alphanumeric runs (length ≥ 2) that are not stop words
pub fn tokenize(text: &str) -> Vec<String> {
    let words: Vec<&str> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| w.chars().count() >= 2 && !is_stop_word(w))
        .collect();

    let mut terms: Vec<String> = words.iter().map(|w| w.to_string()).collect();
    terms.extend(words.windows(2).map(|pair| format!("{} {}", pair[0], pair[1])));
    terms
}

fn term_counts(text: &str) -> HashMap<String, u32> {
    let mut counts = HashMap::new();
    for term in tokenize(text) {
        *counts.entry(term).or_insert(0) += 1;
    }
    counts
}

/// Document-frequency pruning and vocabulary size limits
#[derive(Debug, Clone, Copy)]
pub struct VectorizerParams {
    pub max_features: usize,
    pub min_df: usize,
    /// Fraction of documents
    pub max_df: f64,
}

impl From<&EngineConfig> for VectorizerParams {
    fn from(config: &EngineConfig) -> Self {
        Self {
            max_features: config.content_features,
            min_df: config.content_min_df,
            max_df: config.content_max_df,
        }
    }
}

/// Fitted TF-IDF vocabulary and inverse document frequencies
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f32>,
}

impl TfidfVectorizer {
    /// Fit on already-cleaned documents and return the weighted matrix alongside
    pub fn fit_transform(docs: &[String], params: VectorizerParams) -> Result<(Self, CsMat<f32>)> {
        let n_docs = docs.len();
        if n_docs == 0 {
            return Err(AppError::NoContent);
        }

        let counts: Vec<HashMap<String, u32>> = docs.iter().map(|d| term_counts(d)).collect();

        // term → (document frequency, corpus count)
        let mut stats: BTreeMap<&str, (usize, u64)> = BTreeMap::new();
        for doc in &counts {
            for (term, &count) in doc {
                let entry = stats.entry(term.as_str()).or_insert((0, 0));
                entry.0 += 1;
                entry.1 += u64::from(count);
            }
        }

        let max_doc_count = params.max_df * n_docs as f64;
        if max_doc_count < params.min_df as f64 {
            return Err(AppError::Training(
                "max_df corresponds to fewer documents than min_df".to_string(),
            ));
        }

        let mut kept: Vec<(&str, usize, u64)> = stats
            .into_iter()
            .filter(|(_, (df, _))| *df >= params.min_df && *df as f64 <= max_doc_count)
            .map(|(term, (df, total))| (term, df, total))
            .collect();
        if kept.is_empty() {
            return Err(AppError::Training(
                "After pruning, no terms remain; try a lower min_df or a higher max_df".to_string(),
            ));
        }

        if kept.len() > params.max_features {
            // Stable sort keeps alphabetical order among equal counts
            kept.sort_by(|a, b| b.2.cmp(&a.2));
            kept.truncate(params.max_features);
            kept.sort_by(|a, b| a.0.cmp(b.0));
        }

        let mut vocabulary = HashMap::with_capacity(kept.len());
        let mut idf = Vec::with_capacity(kept.len());
        for (position, (term, df, _)) in kept.iter().enumerate() {
            vocabulary.insert(term.to_string(), position);
            idf.push((((1 + n_docs) as f64 / (1 + df) as f64).ln() + 1.0) as f32);
        }

        let vectorizer = Self { vocabulary, idf };

        let mut tri = TriMat::new((n_docs, vectorizer.len()));
        for (row, doc) in counts.iter().enumerate() {
            for (col, weight) in vectorizer.weigh(doc) {
                tri.add_triplet(row, col, weight);
            }
        }

        debug!(terms = vectorizer.len(), docs = n_docs, "Fitted TF-IDF vocabulary");
        Ok((vectorizer, tri.to_csr()))
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    /// L2-normalised `(column, weight)` pairs sorted by column
    fn weigh(&self, counts: &HashMap<String, u32>) -> Vec<(usize, f32)> {
        let mut weights: Vec<(usize, f32)> = counts
            .iter()
            .filter_map(|(term, &count)| {
                self.vocabulary
                    .get(term)
                    .map(|&col| (col, count as f32 * self.idf[col]))
            })
            .collect();
        weights.sort_by_key(|&(col, _)| col);

        let norm = weights.iter().map(|(_, w)| w * w).sum::<f32>().sqrt();
        if norm > 0.0 {
            for (_, w) in &mut weights {
                *w /= norm;
            }
        }
        weights
    }

    /// Map raw text into the fitted vector space
    pub fn transform(&self, text: &str) -> CsVec<f32> {
        let (indices, data): (Vec<usize>, Vec<f32>) = self
            .weigh(&term_counts(&clean_text(text)))
            .into_iter()
            .unzip();
        CsVec::new(self.len(), indices, data)
    }
}

/// Content features of every book with usable text
#[derive(Debug, Clone)]
pub struct ContentFeatures {
    pub vectorizer: TfidfVectorizer,
    pub matrix: CsMat<f32>,
    /// ISBN ↔ matrix row
    pub ids: IdIndex,
}

impl ContentFeatures {
    /// Books whose cleaned text is empty stay out of the matrix
    pub fn build(books: &[Book], params: VectorizerParams) -> Result<Self> {
        let mut ids = IdIndex::new();
        let mut docs = Vec::with_capacity(books.len());
        for book in books {
            let text = clean_text(&book.content_text());
            if text.is_empty() || ids.contains(&book.isbn) {
                continue;
            }
            ids.insert(&book.isbn);
            docs.push(text);
        }

        if docs.is_empty() {
            return Err(AppError::NoContent);
        }

        let (vectorizer, matrix) = TfidfVectorizer::fit_transform(&docs, params)?;

        info!(
            books = ids.len(),
            skipped = books.len() - ids.len(),
            features = vectorizer.len(),
            "Built content features"
        );

        Ok(Self {
            vectorizer,
            matrix,
            ids,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(min_df: usize, max_df: f64) -> VectorizerParams {
        VectorizerParams {
            max_features: 5000,
            min_df,
            max_df,
        }
    }

    fn book(isbn: &str, title: &str) -> Book {
        Book {
            isbn: isbn.to_string(),
            title: title.to_string(),
            author: String::new(),
            year: String::new(),
            description: String::new(),
            categories: String::new(),
            average_rating: 0.0,
            ratings_count: 0,
        }
    }

    #[test]
    fn test_clean_text() {
        assert_eq!(clean_text("  Dune: Book #1!\n\tby Frank  "), "dune book by frank");
        assert_eq!(clean_text("123 !!!"), "");
    }

    #[test]
    fn test_tokenize_removes_stop_words_and_adds_bigrams() {
        let tokens = tokenize("the space opera of a hero");
        assert_eq!(tokens, vec!["space", "opera", "hero", "space opera", "opera hero"]);
    }

    #[test]
    fn test_tokenize_drops_single_letters() {
        assert!(tokenize("x y z").is_empty());
    }

    #[test]
    fn test_fit_idf_and_normalisation() {
        let docs = vec![
            "space opera heroes".to_string(),
            "space opera villains".to_string(),
            "cooking recipes".to_string(),
        ];
        let (vectorizer, matrix) = TfidfVectorizer::fit_transform(&docs, params(1, 1.0)).unwrap();

        let space = vectorizer.vocabulary["space"];
        let expected = ((4.0f64 / 3.0).ln() + 1.0) as f32;
        assert!((vectorizer.idf[space] - expected).abs() < 1e-6);

        for row in matrix.outer_iterator() {
            let norm: f32 = row.data().iter().map(|w| w * w).sum::<f32>().sqrt();
            assert!((norm - 1.0).abs() < 1e-5);
        }
    }

    #[test]
    fn test_vocabulary_is_alphabetical() {
        let docs = vec!["zebra apple".to_string(), "apple mango".to_string()];
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&docs, params(1, 1.0)).unwrap();
        assert!(vectorizer.vocabulary["apple"] < vectorizer.vocabulary["mango"]);
        assert!(vectorizer.vocabulary["mango"] < vectorizer.vocabulary["zebra"]);
    }

    #[test]
    fn test_max_features_keeps_most_frequent() {
        let docs = vec!["alpha alpha beta".to_string(), "alpha gamma".to_string()];
        let capped = VectorizerParams {
            max_features: 1,
            min_df: 1,
            max_df: 1.0,
        };
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&docs, capped).unwrap();
        assert_eq!(vectorizer.len(), 1);
        assert!(vectorizer.vocabulary.contains_key("alpha"));
    }

    #[test]
    fn test_pruning_errors() {
        let docs = vec!["alpha".to_string(), "beta".to_string()];
        assert!(matches!(
            TfidfVectorizer::fit_transform(&docs, params(2, 1.0)),
            Err(AppError::Training(_))
        ));
        assert!(matches!(
            TfidfVectorizer::fit_transform(&docs, params(2, 0.5)),
            Err(AppError::Training(_))
        ));
    }

    #[test]
    fn test_transform_ignores_unknown_terms() {
        let docs = vec!["space opera".to_string(), "cooking recipes".to_string()];
        let (vectorizer, _) = TfidfVectorizer::fit_transform(&docs, params(1, 1.0)).unwrap();
        let v = vectorizer.transform("Space! and dragons");
        assert_eq!(v.nnz(), 1);
        assert_eq!(v.dim(), vectorizer.len());
        assert!(vectorizer.transform("???").nnz() == 0);
    }

    #[test]
    fn test_build_skips_books_without_text() {
        let books = vec![
            book("1", "Space Opera"),
            book("2", "1984"),
            book("3", "Cooking Recipes"),
        ];
        let features = ContentFeatures::build(&books, params(1, 1.0)).unwrap();
        assert_eq!(features.ids.len(), 2);
        assert_eq!(features.ids.position("3"), Some(1));
        assert!(!features.ids.contains("2"));
        assert_eq!(features.matrix.rows(), 2);
    }

    #[test]
    fn test_build_without_content() {
        let books = vec![book("1", "1984")];
        assert!(matches!(
            ContentFeatures::build(&books, params(1, 1.0)),
            Err(AppError::NoContent)
        ));
    }
}
