// ---------------------------------------------------------------------------
// Reply orchestration
// ---------------------------------------------------------------------------
//
// Context lookup, then a generator call, then the cached-response fallback
// when generation fails or comes back empty.
// ---------------------------------------------------------------------------

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

use crate::config::ReplyConfig;
use crate::context_cache::ContextCache;
use crate::error::RecallError;
use crate::response_cache::ResponseCache;
use crate::types::ContextMatch;

/// A live text generator (an LLM endpoint in production). `context` is the
/// rendered block from `format_context_block`, empty when nothing matched.
#[async_trait]
pub trait Generator: Send + Sync {
	async fn generate(&self, query: &str, context: &str) -> Result<String, RecallError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplySource {
	Generated,
	Cached,
	Unavailable,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Reply {
	pub text: Option<String>,
	pub source: ReplySource,
	pub context: Vec<ContextMatch>,
}

/// Render matches as a bullet list for prompt assembly.
pub fn format_context_block(matches: &[ContextMatch]) -> String {
	matches
		.iter()
		.map(|m| format!("- {}", m.record.content))
		.collect::<Vec<_>>()
		.join("\n")
}

pub struct ReplyOrchestrator {
	context: Arc<ContextCache>,
	responses: Arc<ResponseCache>,
	generator: Arc<dyn Generator>,
	config: ReplyConfig,
}

impl ReplyOrchestrator {
	pub fn new(
		context: Arc<ContextCache>,
		responses: Arc<ResponseCache>,
		generator: Arc<dyn Generator>,
		config: ReplyConfig,
	) -> Self {
		Self {
			context,
			responses,
			generator,
			config,
		}
	}

	pub async fn reply(&self, query: &str) -> Reply {
		let context = self
			.context
			.find_context(query, self.config.context_limit, self.config.context_threshold)
			.await;

		let block = format_context_block(&context);
		match self.generator.generate(query, &block).await {
			Ok(text) if !text.trim().is_empty() => {
				return Reply {
					text: Some(text),
					source: ReplySource::Generated,
					context,
				};
			}
			Ok(_) => tracing::warn!(code = "GENERATION_FAILED", "generator returned no text; trying cache"),
			Err(e) => tracing::warn!(code = e.code(), error = %e, "generation failed; trying cache"),
		}

		match self.responses.lookup(query).await {
			Some(text) => Reply {
				text: Some(text),
				source: ReplySource::Cached,
				context,
			},
			None => Reply {
				text: None,
				source: ReplySource::Unavailable,
				context,
			},
		}
	}
}
