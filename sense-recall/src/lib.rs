pub mod cli;
pub mod clock;
pub mod clustering;
pub mod config;
pub mod context_cache;
pub mod cosine;
pub mod error;
pub mod reply;
pub mod response_cache;
pub mod slot;
pub mod source;
pub mod staleness;
pub mod text_search;
pub mod tfidf;
pub mod types;

pub use clustering::{ClusterEngine, ClusterOutcome, ClusterReport};
pub use config::RecallConfig;
pub use context_cache::ContextCache;
pub use error::RecallError;
pub use reply::{Generator, Reply, ReplyOrchestrator, ReplySource};
pub use response_cache::ResponseCache;
pub use slot::RefreshOutcome;
pub use source::{MemorySource, RecordSnapshot, RecordSource};
pub use staleness::StalenessPolicy;
pub use types::{ActionRecord, ContextMatch, ConversationRecord, ResponsePair, StoredInteraction};
