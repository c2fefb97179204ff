use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user-authored chat message as read from the message log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationRecord {
	pub user_id: String,
	pub channel_id: String,
	pub content: String,
	pub category: String,
	pub timestamp: DateTime<Utc>,
}

/// A tracked user interaction (button click, command, ...).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionRecord {
	pub user_id: String,
	pub action_type: String,
	pub timestamp: DateTime<Utc>,
}

/// A past request with the reply the bot gave to it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponsePair {
	pub request_content: String,
	pub response_content: String,
}

/// A persisted AI interaction. Either side is `None` when the message it
/// referenced no longer resolves.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredInteraction {
	pub request: Option<String>,
	pub response: Option<String>,
}

impl StoredInteraction {
	pub fn resolved(request: &str, response: &str) -> Self {
		Self {
			request: Some(request.to_string()),
			response: Some(response.to_string()),
		}
	}

	pub fn to_pair(&self) -> Option<ResponsePair> {
		match (&self.request, &self.response) {
			(Some(request), Some(response)) => Some(ResponsePair {
				request_content: request.clone(),
				response_content: response.clone(),
			}),
			_ => None,
		}
	}
}

/// Keep only interactions where both messages resolve.
pub fn resolve_pairs(interactions: &[StoredInteraction]) -> Vec<ResponsePair> {
	interactions.iter().filter_map(StoredInteraction::to_pair).collect()
}

/// A conversation record returned by context search, with its similarity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContextMatch {
	#[serde(flatten)]
	pub record: ConversationRecord,
	pub score: f64,
}

/// Anything that can be placed in a text index.
pub trait IndexDocument {
	fn index_text(&self) -> &str;
}

impl IndexDocument for ConversationRecord {
	fn index_text(&self) -> &str {
		&self.content
	}
}

impl IndexDocument for ResponsePair {
	fn index_text(&self) -> &str {
		&self.request_content
	}
}

impl IndexDocument for String {
	fn index_text(&self) -> &str {
		self
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn unresolved_interactions_are_dropped() {
		let interactions = vec![
			StoredInteraction::resolved("how do i join", "follow these steps"),
			StoredInteraction {
				request: Some("orphaned".into()),
				response: None,
			},
			StoredInteraction {
				request: None,
				response: Some("lost request".into()),
			},
		];
		let pairs = resolve_pairs(&interactions);
		assert_eq!(pairs.len(), 1);
		assert_eq!(pairs[0].request_content, "how do i join");
		assert_eq!(pairs[0].response_content, "follow these steps");
	}

	#[test]
	fn context_match_flattens_record() {
		let m = ContextMatch {
			record: ConversationRecord {
				user_id: "u1".into(),
				channel_id: "c1".into(),
				content: "server is up again".into(),
				category: "General".into(),
				timestamp: DateTime::from_timestamp(0, 0).unwrap_or_default(),
			},
			score: 0.5,
		};
		let json = serde_json::to_value(&m).unwrap();
		assert_eq!(json["userId"], "u1");
		assert_eq!(json["content"], "server is up again");
		assert_eq!(json["score"], 0.5);
	}
}
