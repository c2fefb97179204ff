// ---------------------------------------------------------------------------
// ContextCache -- conversational context recall
// ---------------------------------------------------------------------------
//
// Indexes past user messages and returns the ones most similar to a query,
// one entry per distinct message text. Never fails: every fault degrades to
// the retained index or to an empty result.
// ---------------------------------------------------------------------------

use std::collections::HashSet;
use std::sync::Arc;

use crate::clock::{Clock, SystemClock};
use crate::config::ContextCacheConfig;
use crate::error::RecallError;
use crate::slot::{IndexSlot, RefreshOutcome};
use crate::source::RecordSource;
use crate::tfidf::TextIndex;
use crate::types::{ContextMatch, ConversationRecord};

pub struct ContextCache {
	source: Arc<dyn RecordSource>,
	clock: Arc<dyn Clock>,
	config: ContextCacheConfig,
	slot: IndexSlot<ConversationRecord>,
}

impl ContextCache {
	pub fn new(source: Arc<dyn RecordSource>, config: ContextCacheConfig) -> Self {
		Self::with_clock(source, config, Arc::new(SystemClock))
	}

	pub fn with_clock(
		source: Arc<dyn RecordSource>,
		config: ContextCacheConfig,
		clock: Arc<dyn Clock>,
	) -> Self {
		Self {
			source,
			clock,
			config,
			slot: IndexSlot::new("context"),
		}
	}

	pub fn config(&self) -> &ContextCacheConfig {
		&self.config
	}

	/// Rebuild the conversation index if it is stale. Reads the record count
	/// once, and all conversations only when a rebuild happens.
	pub async fn refresh(&self) -> RefreshOutcome {
		let count = self.source.count_conversations().await;
		let source = &self.source;
		let config = &self.config;
		self.slot
			.refresh(
				&config.policy,
				self.clock.as_ref(),
				count,
				config.vectorizer_options(),
				|| async move {
					let records = source.list_conversations().await?;
					let eligible: Vec<ConversationRecord> = records
						.into_iter()
						.filter(|r| config.is_eligible(&r.content))
						.collect();
					Ok::<_, RecallError>(eligible)
				},
			)
			.await
	}

	/// Past messages most similar to `query`, best first: at most `limit`
	/// entries, none scoring below `threshold`, no repeated content.
	pub async fn find_context(&self, query: &str, limit: usize, threshold: f64) -> Vec<ContextMatch> {
		self.refresh().await;
		match self.slot.current() {
			Some(index) => rank_context(&index, query, limit, threshold),
			None => Vec::new(),
		}
	}

	/// `find_context` with the configured limit and threshold.
	pub async fn search(&self, query: &str) -> Vec<ContextMatch> {
		self.find_context(query, self.config.default_limit, self.config.default_threshold)
			.await
	}

	pub fn retained(&self) -> Option<Arc<TextIndex<ConversationRecord>>> {
		self.slot.current()
	}

	pub fn rebuilds(&self) -> u64 {
		self.slot.rebuilds()
	}
}

/// Walk `index` results best-first, stopping at the first score below
/// `threshold`. The first (highest-scoring) record of each distinct content
/// string is kept.
pub fn rank_context(
	index: &TextIndex<ConversationRecord>,
	query: &str,
	limit: usize,
	threshold: f64,
) -> Vec<ContextMatch> {
	let mut results = Vec::new();
	if limit == 0 {
		return results;
	}
	let mut seen: HashSet<&str> = HashSet::new();

	for (idx, score) in index.query(query) {
		if score < threshold {
			break;
		}
		let Some(record) = index.document(idx) else {
			continue;
		};
		if !seen.insert(record.content.as_str()) {
			continue;
		}
		results.push(ContextMatch {
			record: record.clone(),
			score,
		});
		if results.len() >= limit {
			break;
		}
	}
	results
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
	use super::*;
	use crate::clock::ManualClock;
	use crate::source::MemorySource;
	use async_trait::async_trait;
	use chrono::Utc;

	fn record(user: &str, content: &str) -> ConversationRecord {
		ConversationRecord {
			user_id: user.into(),
			channel_id: "general".into(),
			content: content.into(),
			category: "General".into(),
			timestamp: Utc::now(),
		}
	}

	fn cache_over(records: &[(&str, &str)]) -> (Arc<MemorySource>, Arc<ManualClock>, ContextCache) {
		let source = Arc::new(MemorySource::new());
		for (user, content) in records {
			source.push_conversation(record(user, content));
		}
		let clock = Arc::new(ManualClock::default());
		let cache = ContextCache::with_clock(source.clone(), ContextCacheConfig::default(), clock.clone());
		(source, clock, cache)
	}

	#[tokio::test]
	async fn short_messages_are_not_indexed() {
		let (_, _, cache) = cache_over(&[("u1", "hi")]);
		assert!(cache.find_context("hi", 3, 0.0).await.is_empty());
		assert!(cache.find_context("anything at all", 3, 0.2).await.is_empty());
		assert!(cache.retained().is_none());
	}

	#[tokio::test]
	async fn commands_are_not_indexed() {
		let (_, _, cache) = cache_over(&[("u1", "!register please"), ("u2", "where do i register")]);
		let results = cache.find_context("register", 5, 0.0).await;
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].record.content, "where do i register");
	}

	#[tokio::test]
	async fn results_are_ordered_bounded_and_above_threshold() {
		let (_, _, cache) = cache_over(&[
			("u1", "the raid starts at nine tonight"),
			("u2", "raid tonight who is coming"),
			("u3", "i baked bread this morning"),
			("u4", "nine people joined the raid"),
			("u5", "raid raid raid"),
		]);
		let results = cache.find_context("raid tonight", 3, 0.05).await;
		assert!(!results.is_empty());
		assert!(results.len() <= 3);
		for pair in results.windows(2) {
			assert!(pair[0].score >= pair[1].score);
		}
		assert!(results.iter().all(|m| m.score >= 0.05));
		assert!(results.iter().all(|m| m.record.content != "i baked bread this morning"));
	}

	#[tokio::test]
	async fn duplicate_content_is_returned_once() {
		let (_, _, cache) = cache_over(&[
			("u1", "anyone want to play tonight"),
			("u2", "anyone want to play tonight"),
			("u3", "want to play something tonight"),
		]);
		let results = cache.find_context("anyone want to play tonight", 5, 0.0).await;
		let contents: Vec<&str> = results.iter().map(|m| m.record.content.as_str()).collect();
		assert_eq!(contents, vec!["anyone want to play tonight", "want to play something tonight"]);
		// the first occurrence in build order wins
		assert_eq!(results[0].record.user_id, "u1");
	}

	#[tokio::test]
	async fn stops_at_first_score_below_threshold() {
		let (_, _, cache) = cache_over(&[
			("u1", "minecraft server address please"),
			("u2", "cooking pasta for dinner"),
		]);
		let results = cache.find_context("minecraft server", 3, 0.2).await;
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].record.user_id, "u1");
	}

	#[tokio::test]
	async fn zero_limit_returns_nothing() {
		let (_, _, cache) = cache_over(&[("u1", "minecraft server address please")]);
		assert!(cache.find_context("minecraft", 0, 0.0).await.is_empty());
	}

	#[tokio::test]
	async fn new_messages_wait_for_debounce() {
		let (source, clock, cache) = cache_over(&[("u1", "first message in the log")]);
		assert_eq!(cache.refresh().await, RefreshOutcome::Rebuilt { documents: 1 });

		source.push_conversation(record("u2", "second message arrives later"));
		clock.advance_secs(10);
		assert_eq!(cache.refresh().await, RefreshOutcome::Fresh);
		assert!(cache.find_context("arrives later", 3, 0.1).await.is_empty());

		clock.advance_secs(21);
		let results = cache.find_context("arrives later", 3, 0.1).await;
		assert_eq!(results.len(), 1);
		assert_eq!(results[0].record.user_id, "u2");
		assert_eq!(cache.rebuilds(), 2);
	}

	#[tokio::test]
	async fn ceiling_rebuilds_without_new_messages() {
		let (_, clock, cache) = cache_over(&[("u1", "first message in the log")]);
		cache.refresh().await;
		clock.advance_secs(299);
		assert_eq!(cache.refresh().await, RefreshOutcome::Fresh);
		clock.advance_secs(2);
		assert_eq!(cache.refresh().await, RefreshOutcome::Rebuilt { documents: 1 });
	}

	struct FlakySource {
		inner: MemorySource,
		down: std::sync::atomic::AtomicBool,
	}

	#[async_trait]
	impl RecordSource for FlakySource {
		async fn count_conversations(&self) -> Result<u64, RecallError> {
			if self.down.load(std::sync::atomic::Ordering::SeqCst) {
				return Err(RecallError::source_unavailable("database is locked"));
			}
			self.inner.count_conversations().await
		}
		async fn count_response_pairs(&self) -> Result<u64, RecallError> {
			self.inner.count_response_pairs().await
		}
		async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, RecallError> {
			self.inner.list_conversations().await
		}
		async fn list_actions(&self) -> Result<Vec<crate::types::ActionRecord>, RecallError> {
			self.inner.list_actions().await
		}
		async fn list_response_pairs(&self) -> Result<Vec<crate::types::ResponsePair>, RecallError> {
			self.inner.list_response_pairs().await
		}
	}

	#[tokio::test]
	async fn source_outage_serves_retained_index() {
		let source = Arc::new(FlakySource {
			inner: MemorySource::new(),
			down: std::sync::atomic::AtomicBool::new(false),
		});
		source.inner.push_conversation(record("u1", "patch notes are out now"));
		let cache = ContextCache::new(source.clone(), ContextCacheConfig::default());

		assert_eq!(cache.search("patch notes").await.len(), 1);
		source.down.store(true, std::sync::atomic::Ordering::SeqCst);
		assert_eq!(cache.search("patch notes").await.len(), 1);
	}

	/// Source whose whole message log can be swapped out.
	#[derive(Default)]
	struct SwappableSource {
		records: std::sync::Mutex<Vec<ConversationRecord>>,
	}

	impl SwappableSource {
		fn set(&self, records: Vec<ConversationRecord>) {
			*self.records.lock().unwrap() = records;
		}
	}

	#[async_trait]
	impl RecordSource for SwappableSource {
		async fn count_conversations(&self) -> Result<u64, RecallError> {
			Ok(self.records.lock().unwrap().len() as u64)
		}
		async fn count_response_pairs(&self) -> Result<u64, RecallError> {
			Ok(0)
		}
		async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, RecallError> {
			Ok(self.records.lock().unwrap().clone())
		}
		async fn list_actions(&self) -> Result<Vec<crate::types::ActionRecord>, RecallError> {
			Ok(Vec::new())
		}
		async fn list_response_pairs(&self) -> Result<Vec<crate::types::ResponsePair>, RecallError> {
			Ok(Vec::new())
		}
	}

	#[tokio::test]
	async fn rebuild_with_nothing_eligible_clears_results() {
		let source = Arc::new(SwappableSource::default());
		source.set(vec![record("u1", "patch notes are out now")]);
		let clock = Arc::new(ManualClock::default());
		let cache = ContextCache::with_clock(source.clone(), ContextCacheConfig::default(), clock.clone());
		assert_eq!(cache.find_context("patch notes", 3, 0.2).await.len(), 1);

		source.set(vec![record("u2", "hi"), record("u3", "!cmd x")]);
		clock.advance_secs(31);
		assert_eq!(cache.refresh().await, RefreshOutcome::Empty);
		assert!(cache.find_context("patch notes", 3, 0.2).await.is_empty());
		assert!(cache.retained().is_none());

		// the empty check is stamped, so nothing is refetched until new data
		clock.advance_secs(100);
		assert_eq!(cache.refresh().await, RefreshOutcome::Fresh);
	}

	#[tokio::test]
	async fn source_outage_on_cold_cache_is_empty() {
		let source = Arc::new(FlakySource {
			inner: MemorySource::new(),
			down: std::sync::atomic::AtomicBool::new(true),
		});
		let cache = ContextCache::new(source, ContextCacheConfig::default());
		assert!(cache.search("patch notes").await.is_empty());
	}
}
