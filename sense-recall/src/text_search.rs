// ---------------------------------------------------------------------------
// Text Search Utilities
// ---------------------------------------------------------------------------
//
// Tokenisation and word n-gram extraction shared by every text index.
// ---------------------------------------------------------------------------

use std::collections::HashMap;
use std::sync::LazyLock;

use regex::Regex;

static WORD: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\w+").expect("static regex"));

// ---------------------------------------------------------------------------
// N-gram range
// ---------------------------------------------------------------------------

/// Inclusive span of token-sequence lengths used as vocabulary units.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NgramRange {
	pub min: usize,
	pub max: usize,
}

impl NgramRange {
	/// Build a range, clamping `min` to at least 1 and `max` to at least `min`.
	pub fn new(min: usize, max: usize) -> Self {
		let min = min.max(1);
		Self { min, max: max.max(min) }
	}
}

impl Default for NgramRange {
	fn default() -> Self {
		Self::new(1, 1)
	}
}

// ---------------------------------------------------------------------------
// Tokenisation
// ---------------------------------------------------------------------------

/// Split text into lowercased word tokens.
///
/// A token is every maximal run of word characters. Tokens shorter than
/// `min_len` characters are dropped. No stemming or stop-word removal.
pub fn tokenize(text: &str, min_len: usize) -> Vec<String> {
	let lower = text.to_lowercase();
	WORD.find_iter(&lower)
		.map(|m| m.as_str())
		.filter(|t| t.chars().count() >= min_len)
		.map(|t| t.to_string())
		.collect()
}

/// Expand a token sequence into every contiguous n-gram whose length lies
/// in `range`. Grams are space-joined.
pub fn word_ngrams(tokens: &[String], range: NgramRange) -> Vec<String> {
	let mut grams = Vec::new();
	for n in range.min..=range.max {
		if n > tokens.len() {
			break;
		}
		for window in tokens.windows(n) {
			grams.push(window.join(" "));
		}
	}
	grams
}

/// Tokenize `text` and count its n-grams.
pub fn ngram_counts(text: &str, range: NgramRange, min_token_len: usize) -> HashMap<String, usize> {
	let tokens = tokenize(text, min_token_len);
	let mut counts = HashMap::new();
	for gram in word_ngrams(&tokens, range) {
		*counts.entry(gram).or_insert(0) += 1;
	}
	counts
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
