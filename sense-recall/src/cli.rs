use std::path::PathBuf;

use clap::{Parser, Subcommand};

#[derive(Parser, Debug)]
#[command(
	name = "sense-recall",
	version,
	about = "Context recall, cached replies and user clustering over a record snapshot"
)]
pub struct CliArgs {
	/// JSON record snapshot (conversations, actions, interactions)
	#[arg(long, env = "SENSE_RECALL_SNAPSHOT")]
	pub snapshot: PathBuf,

	/// JSON config file; missing fields keep their defaults
	#[arg(long, env = "SENSE_RECALL_CONFIG")]
	pub config: Option<PathBuf>,

	/// Log level (trace, debug, info, warn, error)
	#[arg(long, default_value = "warn", env = "SENSE_RECALL_LOG_LEVEL")]
	pub log_level: String,

	#[command(subcommand)]
	pub command: Command,
}

#[derive(Subcommand, Debug, Clone, PartialEq)]
pub enum Command {
	/// Past messages most similar to a query
	Context {
		query: String,
		/// Defaults to the configured context limit
		#[arg(long)]
		limit: Option<usize>,
		/// Defaults to the configured context threshold
		#[arg(long)]
		threshold: Option<f64>,
	},
	/// Cached reply to the most similar past request
	Respond {
		query: String,
		#[arg(long)]
		threshold: Option<f64>,
	},
	/// Partition users by activity
	Cluster {
		#[arg(long)]
		k: Option<usize>,
	},
}
