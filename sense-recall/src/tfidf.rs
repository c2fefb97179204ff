// ---------------------------------------------------------------------------
// TF-IDF Text Index
// ---------------------------------------------------------------------------
//
// Fits a word n-gram TF-IDF vector space over a corpus and answers ranked
// cosine-similarity queries against it. An index is immutable once built;
// callers replace it wholesale on rebuild.
// ---------------------------------------------------------------------------

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use crate::cosine::{dot, SparseVector};
use crate::error::RecallError;
use crate::text_search::{ngram_counts, NgramRange};
use crate::types::IndexDocument;

// ---------------------------------------------------------------------------
// Vectorizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct VectorizerOptions {
	pub ngram_range: NgramRange,
	/// Keep only this many terms, the most frequent across the corpus.
	pub max_features: Option<usize>,
	/// Tokens shorter than this many characters are ignored.
	pub min_token_len: usize,
}

impl Default for VectorizerOptions {
	fn default() -> Self {
		Self {
			ngram_range: NgramRange::new(1, 1),
			max_features: None,
			min_token_len: 1,
		}
	}
}

/// A fitted TF-IDF model: vocabulary plus smoothed inverse document
/// frequencies.
#[derive(Debug, Clone)]
pub struct TfidfVectorizer {
	options: VectorizerOptions,
	/// term -> column
	vocabulary: HashMap<String, usize>,
	/// column -> idf
	idf: Vec<f64>,
}

impl TfidfVectorizer {
	/// Fit on `corpus` and return the model with the L2-normalised weight
	/// row of every document, in corpus order.
	///
	/// idf = ln((1 + n) / (1 + df)) + 1, so a term present in every
	/// document still carries a positive weight. Columns are ordered
	/// alphabetically; the feature cap breaks frequency ties alphabetically.
	pub fn fit_transform(
		corpus: &[&str],
		options: VectorizerOptions,
	) -> Result<(Self, Vec<SparseVector>), RecallError> {
		if corpus.is_empty() {
			return Err(RecallError::EmptyCorpus);
		}

		let doc_counts: Vec<HashMap<String, usize>> = corpus
			.iter()
			.map(|text| ngram_counts(text, options.ngram_range, options.min_token_len))
			.collect();

		// term -> (corpus frequency, document frequency)
		let mut totals: HashMap<&str, (usize, usize)> = HashMap::new();
		for counts in &doc_counts {
			for (term, &count) in counts {
				let entry = totals.entry(term.as_str()).or_insert((0, 0));
				entry.0 += count;
				entry.1 += 1;
			}
		}

		let mut terms: Vec<(&str, usize, usize)> =
			totals.into_iter().map(|(t, (tf, df))| (t, tf, df)).collect();

		if let Some(limit) = options.max_features {
			if terms.len() > limit {
				terms.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
				terms.truncate(limit);
			}
		}

		if terms.is_empty() {
			return Err(RecallError::BuildFailure(
				"empty vocabulary: documents contain no usable tokens".to_string(),
			));
		}

		terms.sort_by(|a, b| a.0.cmp(b.0));

		let n = corpus.len() as f64;
		let vocabulary = terms
			.iter()
			.enumerate()
			.map(|(col, &(term, _, _))| (term.to_string(), col))
			.collect();
		let idf = terms
			.iter()
			.map(|&(_, _, df)| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
			.collect();

		let vectorizer = Self {
			options,
			vocabulary,
			idf,
		};
		let matrix = doc_counts.iter().map(|counts| vectorizer.weigh(counts)).collect();
		Ok((vectorizer, matrix))
	}

	/// Project `text` into the fitted space. Unknown terms are ignored, so
	/// the result may be the zero vector.
	pub fn transform(&self, text: &str) -> SparseVector {
		let counts = ngram_counts(text, self.options.ngram_range, self.options.min_token_len);
		self.weigh(&counts)
	}

	fn weigh(&self, counts: &HashMap<String, usize>) -> SparseVector {
		let pairs = counts
			.iter()
			.filter_map(|(term, &count)| {
				self.vocabulary
					.get(term)
					.map(|&col| (col, count as f64 * self.idf[col]))
			})
			.collect();
		let mut v = SparseVector::from_pairs(pairs);
		v.normalize();
		v
	}

	pub fn vocabulary_size(&self) -> usize {
		self.vocabulary.len()
	}

	pub fn idf(&self, term: &str) -> Option<f64> {
		self.vocabulary.get(term).map(|&col| self.idf[col])
	}
}

// ---------------------------------------------------------------------------
// TextIndex
// ---------------------------------------------------------------------------

/// A fitted vector space over a set of documents. Row `i` of the matrix is
/// the weight vector of `documents[i]`.
#[derive(Debug, Clone)]
pub struct TextIndex<D> {
	vectorizer: TfidfVectorizer,
	matrix: Vec<SparseVector>,
	documents: Vec<D>,
	built_at_count: u64,
	built_at: DateTime<Utc>,
}

impl<D: IndexDocument> TextIndex<D> {
	/// Fit an index over `documents`.
	///
	/// `built_at_count` is the record count observed when the rebuild was
	/// decided, `built_at` the time it happened.
	pub fn build(
		documents: Vec<D>,
		options: VectorizerOptions,
		built_at_count: u64,
		built_at: DateTime<Utc>,
	) -> Result<Self, RecallError> {
		let corpus: Vec<&str> = documents.iter().map(|d| d.index_text()).collect();
		let (vectorizer, matrix) = TfidfVectorizer::fit_transform(&corpus, options)?;
		Ok(Self {
			vectorizer,
			matrix,
			documents,
			built_at_count,
			built_at,
		})
	}
}

impl<D> TextIndex<D> {
	/// Score every document against `text`, best first. Equal scores keep
	/// document order.
	pub fn query(&self, text: &str) -> Vec<(usize, f64)> {
		let q = self.vectorizer.transform(text);
		let mut scores: Vec<(usize, f64)> = self
			.matrix
			.iter()
			.enumerate()
			.map(|(i, row)| (i, dot(&q, row).clamp(-1.0, 1.0)))
			.collect();
		scores.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
		scores
	}

	/// Highest-scoring document; the earliest one wins a tie.
	pub fn best_match(&self, text: &str) -> Option<(usize, f64)> {
		let q = self.vectorizer.transform(text);
		let mut best: Option<(usize, f64)> = None;
		for (i, row) in self.matrix.iter().enumerate() {
			let score = dot(&q, row).clamp(-1.0, 1.0);
			if best.is_none_or(|(_, s)| score > s) {
				best = Some((i, score));
			}
		}
		best
	}

	pub fn documents(&self) -> &[D] {
		&self.documents
	}

	pub fn document(&self, idx: usize) -> Option<&D> {
		self.documents.get(idx)
	}

	pub fn len(&self) -> usize {
		self.documents.len()
	}

	pub fn is_empty(&self) -> bool {
		self.documents.is_empty()
	}

	pub fn built_at_count(&self) -> u64 {
		self.built_at_count
	}

	pub fn built_at(&self) -> DateTime<Utc> {
		self.built_at
	}

	pub fn vectorizer(&self) -> &TfidfVectorizer {
		&self.vectorizer
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
