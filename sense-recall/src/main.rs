use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use sense_recall::cli::{CliArgs, Command};
use sense_recall::{ClusterEngine, ContextCache, MemorySource, RecallConfig, RecordSource, ResponseCache};

#[tokio::main]
async fn main() -> Result<()> {
	let args = CliArgs::parse();

	// stdout carries the JSON result only
	tracing_subscriber::fmt()
		.with_writer(std::io::stderr)
		.with_env_filter(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&args.log_level)),
		)
		.init();

	let config = match &args.config {
		Some(path) => RecallConfig::load(path)
			.with_context(|| format!("failed to load config {}", path.display()))?,
		None => RecallConfig::default(),
	};
	let source: Arc<dyn RecordSource> = Arc::new(
		MemorySource::load(&args.snapshot)
			.with_context(|| format!("failed to load snapshot {}", args.snapshot.display()))?,
	);
	tracing::debug!(snapshot = %args.snapshot.display(), "records loaded");

	let output = match args.command {
		Command::Context {
			query,
			limit,
			threshold,
		} => {
			let limit = limit.unwrap_or(config.context.default_limit);
			let threshold = threshold.unwrap_or(config.context.default_threshold);
			let cache = ContextCache::new(source, config.context);
			serde_json::to_string_pretty(&cache.find_context(&query, limit, threshold).await)?
		}
		Command::Respond { query, threshold } => {
			let threshold = threshold.unwrap_or(config.responses.default_threshold);
			let cache = ResponseCache::new(source, config.responses);
			serde_json::to_string_pretty(&cache.find_best_response(&query, threshold).await)?
		}
		Command::Cluster { k } => {
			let k = k.unwrap_or(config.clustering.k);
			let engine = ClusterEngine::new(source, config.clustering);
			serde_json::to_string_pretty(&engine.cluster_users(k).await)?
		}
	};
	println!("{}", output);
	Ok(())
}
