// ---------------------------------------------------------------------------
// IndexSlot -- retained index with single-writer rebuilds
// ---------------------------------------------------------------------------
//
// Holds the current `TextIndex` behind an `Arc`. The read/write lock only
// guards cloning or swapping that `Arc`, never a build, so readers always
// see either the whole old index or the whole new one. A separate async
// gate lets one rebuild run at a time.
//
// Contention policy: a caller that finds a rebuild in flight serves the
// retained index if there is one; on a cold slot it waits for the gate and
// re-evaluates staleness, so a burst of cold callers builds once.
// ---------------------------------------------------------------------------

use std::future::Future;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::Instant;

use serde::Serialize;
use tokio::sync::Mutex;

use crate::clock::Clock;
use crate::error::RecallError;
use crate::staleness::{BuildStamp, StalenessPolicy};
use crate::tfidf::{TextIndex, VectorizerOptions};
use crate::types::IndexDocument;

/// What a call to `refresh` did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum RefreshOutcome {
	/// The retained index is current enough.
	Fresh,
	Rebuilt { documents: usize },
	/// Another caller is rebuilding; the retained index was left in place.
	InFlight,
	/// No eligible documents; any previous index was dropped.
	Empty,
	/// The rebuild failed; the previous index (if any) is still retained.
	Failed { code: &'static str },
}

/// The retained index and the stamp of the last completed check. The stamp
/// outlives the index when a check found nothing to index.
struct Retained<D> {
	index: Option<Arc<TextIndex<D>>>,
	checked: Option<BuildStamp>,
}

pub struct IndexSlot<D> {
	name: &'static str,
	current: RwLock<Retained<D>>,
	build_gate: Mutex<()>,
	rebuilds: AtomicU64,
}

impl<D> IndexSlot<D> {
	pub fn new(name: &'static str) -> Self {
		Self {
			name,
			current: RwLock::new(Retained {
				index: None,
				checked: None,
			}),
			build_gate: Mutex::new(()),
			rebuilds: AtomicU64::new(0),
		}
	}

	pub fn current(&self) -> Option<Arc<TextIndex<D>>> {
		self.current.read().unwrap_or_else(|e| e.into_inner()).index.clone()
	}

	/// Count and time of the last build, or of the last check that found
	/// no eligible documents.
	pub fn stamp(&self) -> Option<BuildStamp> {
		self.current.read().unwrap_or_else(|e| e.into_inner()).checked
	}

	/// Swap in a fully built index.
	fn replace(&self, index: TextIndex<D>) {
		let checked = BuildStamp {
			count: index.built_at_count(),
			at: index.built_at(),
		};
		let index = Arc::new(index);
		*self.current.write().unwrap_or_else(|e| e.into_inner()) = Retained {
			index: Some(index),
			checked: Some(checked),
		};
		self.rebuilds.fetch_add(1, Ordering::Relaxed);
	}

	/// Drop the retained index: the corpus no longer has anything to index.
	fn clear(&self, checked: BuildStamp) {
		*self.current.write().unwrap_or_else(|e| e.into_inner()) = Retained {
			index: None,
			checked: Some(checked),
		};
	}

	/// Number of indexes swapped in since creation.
	pub fn rebuilds(&self) -> u64 {
		self.rebuilds.load(Ordering::Relaxed)
	}

	fn absorb(&self, err: &RecallError) -> RefreshOutcome {
		tracing::warn!(
			cache = self.name,
			code = err.code(),
			error = %err,
			retained = self.current().is_some(),
			"index refresh failed"
		);
		RefreshOutcome::Failed { code: err.code() }
	}
}

impl<D: IndexDocument + Send + Sync + 'static> IndexSlot<D> {
	/// Rebuild the index if `policy` says so.
	///
	/// `current_count` is the record count just read from the source.
	/// `load` fetches and filters the documents to index; it only runs when
	/// a rebuild actually happens. Never fails: errors are logged and
	/// reported through the outcome.
	pub async fn refresh<F, Fut>(
		&self,
		policy: &StalenessPolicy,
		clock: &dyn Clock,
		current_count: Result<u64, RecallError>,
		options: VectorizerOptions,
		load: F,
	) -> RefreshOutcome
	where
		F: FnOnce() -> Fut,
		Fut: Future<Output = Result<Vec<D>, RecallError>>,
	{
		let count = match current_count {
			Ok(count) => count,
			Err(e) => return self.absorb(&e),
		};
		if !policy.should_rebuild(self.stamp(), count, clock.now()) {
			return RefreshOutcome::Fresh;
		}

		let _gate = match self.build_gate.try_lock() {
			Ok(guard) => guard,
			Err(_) if self.current().is_some() => {
				tracing::debug!(cache = self.name, "rebuild in flight; serving retained index");
				return RefreshOutcome::InFlight;
			}
			Err(_) => self.build_gate.lock().await,
		};
		// Whoever held the gate may have just rebuilt.
		if !policy.should_rebuild(self.stamp(), count, clock.now()) {
			return RefreshOutcome::Fresh;
		}

		let started = Instant::now();
		let documents = match load().await {
			Ok(documents) => documents,
			Err(e) => return self.absorb(&e),
		};
		if documents.is_empty() {
			tracing::debug!(cache = self.name, count, "no eligible documents to index");
			self.clear(BuildStamp {
				count,
				at: clock.now(),
			});
			return RefreshOutcome::Empty;
		}

		let built_at = clock.now();
		let built = tokio::task::spawn_blocking(move || {
			TextIndex::build(documents, options, count, built_at)
		})
		.await;
		let index = match built {
			Ok(Ok(index)) => index,
			Ok(Err(e)) => return self.absorb(&e),
			Err(join) => return self.absorb(&RecallError::BuildFailure(join.to_string())),
		};

		let documents = index.len();
		let vocabulary = index.vectorizer().vocabulary_size();
		self.replace(index);
		tracing::info!(
			cache = self.name,
			documents,
			vocabulary,
			count,
			elapsed_ms = started.elapsed().as_millis() as u64,
			"index rebuilt"
		);
		RefreshOutcome::Rebuilt { documents }
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
