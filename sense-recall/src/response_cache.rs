// ---------------------------------------------------------------------------
// ResponseCache -- reuse of past replies
// ---------------------------------------------------------------------------
//
// Indexes the request side of stored request/response pairs. When the
// generator is unavailable, the reply to the most similar past request is
// handed back instead.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ResponseCacheConfig;
use crate::slot::{IndexSlot, RefreshOutcome};
use crate::source::RecordSource;
use crate::tfidf::TextIndex;
use crate::types::ResponsePair;

pub struct ResponseCache {
	source: Arc<dyn RecordSource>,
	clock: Arc<dyn Clock>,
	config: ResponseCacheConfig,
	slot: IndexSlot<ResponsePair>,
}

impl ResponseCache {
	pub fn new(source: Arc<dyn RecordSource>, config: ResponseCacheConfig) -> Self {
		Self::with_clock(source, config, Arc::new(SystemClock))
	}

	pub fn with_clock(
		source: Arc<dyn RecordSource>,
		config: ResponseCacheConfig,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			source,
			clock,
			config,
			slot: IndexSlot::new("responses"),
		}
	}

	pub fn config(&self) -> &ResponseCacheConfig {
		&self.config
	}

	pub async fn refresh(&self) -> RefreshOutcome {
		let count = self.source.count_response_pairs().await;
		let source = &self.source;
		self.slot
			.refresh(
				&self.config.policy,
				self.clock.as_ref(),
				count,
				self.config.vectorizer_options(),
				|| async move { source.list_response_pairs().await },
			)
			.await
	}

	/// The stored reply whose request best matches `query`, if its
	/// similarity reaches `threshold`.
	pub async fn find_best_response(&self, query: &str, threshold: f64) -> Option<String> {
		self.refresh().await;
		let index = self.slot.current()?;
		best_response(&index, query, threshold)
	}

	/// `find_best_response` with the configured threshold.
	pub async fn lookup(&self, query: &str) -> Option<String> {
		self.find_best_response(query, self.config.default_threshold).await
	}

	pub fn retained(&self) -> Option<Arc<TextIndex<ResponsePair>>> {
		self.slot.current()
	}

	pub fn rebuilds(&self) -> u64 {
		self.slot.rebuilds()
	}
}

/// Reply of the single best-scoring pair. Among equal scores the pair built
/// into the index first wins.
pub fn best_response(index: &TextIndex<ResponsePair>, query: &str, threshold: f64) -> Option<String> {
	let (idx, score) = index.best_match(query)?;
	if score < threshold {
		return None;
	}
	index.document(idx).map(|pair| pair.response_content.clone())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
