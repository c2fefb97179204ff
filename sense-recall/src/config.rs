use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::RecallError;
use crate::staleness::StalenessPolicy;
use crate::text_search::NgramRange;
use crate::tfidf::VectorizerOptions;

// ---------------------------------------------------------------------------
// Context cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ContextCacheConfig {
	pub ngram_min: usize,
	pub ngram_max: usize,
	pub max_features: Option<usize>,
	pub min_token_len: usize,
	/// Messages must be strictly longer than this many characters.
	pub min_content_len: usize,
	/// Messages starting with this prefix are bot commands and not indexed.
	pub command_prefix: String,
	pub default_limit: usize,
	pub default_threshold: f64,
	pub policy: StalenessPolicy,
}

impl Default for ContextCacheConfig {
	fn default() -> Self {
		Self {
			ngram_min: 1,
			ngram_max: 3,
			max_features: Some(20_000),
			min_token_len: 1,
			min_content_len: 5,
			command_prefix: "!".to_string(),
			default_limit: 3,
			default_threshold: 0.2,
			policy: StalenessPolicy::context(),
		}
	}
}

impl ContextCacheConfig {
	pub fn vectorizer_options(&self) -> VectorizerOptions {
		VectorizerOptions {
			ngram_range: NgramRange::new(self.ngram_min, self.ngram_max),
			max_features: self.max_features,
			min_token_len: self.min_token_len,
		}
	}

	/// Whether a message belongs in the context corpus.
	pub fn is_eligible(&self, content: &str) -> bool {
		if content.chars().count() <= self.min_content_len {
			return false;
		}
		self.command_prefix.is_empty() || !content.starts_with(&self.command_prefix)
	}
}

// ---------------------------------------------------------------------------
// Response cache
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResponseCacheConfig {
	pub ngram_min: usize,
	pub ngram_max: usize,
	pub max_features: Option<usize>,
	pub min_token_len: usize,
	pub default_threshold: f64,
	pub policy: StalenessPolicy,
}

impl Default for ResponseCacheConfig {
	fn default() -> Self {
		Self {
			ngram_min: 1,
			ngram_max: 2,
			max_features: None,
			min_token_len: 2,
			default_threshold: 0.5,
			policy: StalenessPolicy::response(),
		}
	}
}

impl ResponseCacheConfig {
	pub fn vectorizer_options(&self) -> VectorizerOptions {
		VectorizerOptions {
			ngram_range: NgramRange::new(self.ngram_min, self.ngram_max),
			max_features: self.max_features,
			min_token_len: self.min_token_len,
		}
	}
}

// ---------------------------------------------------------------------------
// Clustering
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterConfig {
	pub k: usize,
	pub seed: u64,
	pub max_iterations: usize,
	/// Independent seeded restarts; the lowest-inertia run is kept.
	pub n_init: usize,
}

impl Default for ClusterConfig {
	fn default() -> Self {
		Self {
			k: 3,
			seed: 42,
			max_iterations: 300,
			n_init: 10,
		}
	}
}

// ---------------------------------------------------------------------------
// Reply orchestration
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReplyConfig {
	pub context_limit: usize,
	pub context_threshold: f64,
}

impl Default for ReplyConfig {
	fn default() -> Self {
		Self {
			context_limit: 10,
			context_threshold: 0.1,
		}
	}
}

// ---------------------------------------------------------------------------
// Aggregate
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecallConfig {
	pub context: ContextCacheConfig,
	pub responses: ResponseCacheConfig,
	pub clustering: ClusterConfig,
	pub reply: ReplyConfig,
}

impl RecallConfig {
	/// Load from a JSON file. Missing sections and fields keep their defaults.
	pub fn load(path: impl AsRef<Path>) -> Result<Self, RecallError> {
		let raw = std::fs::read_to_string(path)?;
		Ok(serde_json::from_str(&raw)?)
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn context_eligibility() {
		let config = ContextCacheConfig::default();
		assert!(!config.is_eligible(""));
		assert!(!config.is_eligible("hi"));
		assert!(!config.is_eligible("hello"));
		assert!(config.is_eligible("hello!"));
		assert!(!config.is_eligible("!register now please"));
	}

	#[test]
	fn eligibility_counts_characters_not_bytes() {
		let config = ContextCacheConfig::default();
		// five characters, ten bytes
		assert!(!config.is_eligible("ééééé"));
		assert!(config.is_eligible("éééééé"));
	}

	#[test]
	fn empty_command_prefix_excludes_nothing() {
		let config = ContextCacheConfig {
			command_prefix: String::new(),
			..Default::default()
		};
		assert!(config.is_eligible("!register now please"));
	}

	#[test]
	fn defaults_match_cache_roles() {
		let config = RecallConfig::default();
		assert_eq!(config.context.vectorizer_options().ngram_range, NgramRange::new(1, 3));
		assert_eq!(config.context.max_features, Some(20_000));
		assert_eq!(config.responses.vectorizer_options().ngram_range, NgramRange::new(1, 2));
		assert_eq!(config.responses.max_features, None);
		assert_eq!(config.context.policy.force_after_secs, Some(300));
		assert_eq!(config.responses.policy.force_after_secs, None);
		assert_eq!(config.clustering.k, 3);
	}

	#[test]
	fn load_partial_file() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("recall.json");
		std::fs::write(&path, r#"{"clustering": {"k": 4}, "context": {"default_limit": 5}}"#).unwrap();
		let config = RecallConfig::load(&path).unwrap();
		assert_eq!(config.clustering.k, 4);
		assert_eq!(config.clustering.seed, 42);
		assert_eq!(config.context.default_limit, 5);
		assert_eq!(config.context.default_threshold, 0.2);
		assert_eq!(config.responses, ResponseCacheConfig::default());
	}
}
