// ---------------------------------------------------------------------------
// Record Source
// ---------------------------------------------------------------------------
//
// The read-only surface the recall layer needs from the record store, plus
// an in-memory implementation backed by a JSON snapshot.
// ---------------------------------------------------------------------------

use std::path::Path;
use std::sync::RwLock;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::RecallError;
use crate::types::{resolve_pairs, ActionRecord, ConversationRecord, ResponsePair, StoredInteraction};

#[async_trait]
pub trait RecordSource: Send + Sync {
	async fn count_conversations(&self) -> Result<u64, RecallError>;

	/// Number of stored interactions, including ones whose messages no
	/// longer resolve.
	async fn count_response_pairs(&self) -> Result<u64, RecallError>;

	async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, RecallError>;

	async fn list_actions(&self) -> Result<Vec<ActionRecord>, RecallError>;

	/// Resolved request/response pairs only.
	async fn list_response_pairs(&self) -> Result<Vec<ResponsePair>, RecallError>;
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// Everything a `MemorySource` holds, in its on-disk form.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RecordSnapshot {
	pub conversations: Vec<ConversationRecord>,
	pub actions: Vec<ActionRecord>,
	pub interactions: Vec<StoredInteraction>,
}

impl RecordSnapshot {
	pub fn load(path: impl AsRef<Path>) -> Result<Self, RecallError> {
		let path = path.as_ref();
		let raw = std::fs::read_to_string(path)?;
		serde_json::from_str(&raw)
			.map_err(|e| RecallError::InvalidSnapshot(format!("{}: {}", path.display(), e)))
	}
}

// ---------------------------------------------------------------------------
// MemorySource
// ---------------------------------------------------------------------------

/// Thread-safe in-memory record store.
#[derive(Debug, Default)]
pub struct MemorySource {
	records: RwLock<RecordSnapshot>,
}

impl MemorySource {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_snapshot(snapshot: RecordSnapshot) -> Self {
		Self {
			records: RwLock::new(snapshot),
		}
	}

	pub fn load(path: impl AsRef<Path>) -> Result<Self, RecallError> {
		Ok(Self::from_snapshot(RecordSnapshot::load(path)?))
	}

	pub fn push_conversation(&self, record: ConversationRecord) {
		self.write().conversations.push(record);
	}

	pub fn push_action(&self, record: ActionRecord) {
		self.write().actions.push(record);
	}

	pub fn push_interaction(&self, interaction: StoredInteraction) {
		self.write().interactions.push(interaction);
	}

	fn read(&self) -> std::sync::RwLockReadGuard<'_, RecordSnapshot> {
		self.records.read().unwrap_or_else(|e| e.into_inner())
	}

	fn write(&self) -> std::sync::RwLockWriteGuard<'_, RecordSnapshot> {
		self.records.write().unwrap_or_else(|e| e.into_inner())
	}
}

#[async_trait]
impl RecordSource for MemorySource {
	async fn count_conversations(&self) -> Result<u64, RecallError> {
		Ok(self.read().conversations.len() as u64)
	}

	async fn count_response_pairs(&self) -> Result<u64, RecallError> {
		Ok(self.read().interactions.len() as u64)
	}

	async fn list_conversations(&self) -> Result<Vec<ConversationRecord>, RecallError> {
		Ok(self.read().conversations.clone())
	}

	async fn list_actions(&self) -> Result<Vec<ActionRecord>, RecallError> {
		Ok(self.read().actions.clone())
	}

	async fn list_response_pairs(&self) -> Result<Vec<ResponsePair>, RecallError> {
		Ok(resolve_pairs(&self.read().interactions))
	}
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
