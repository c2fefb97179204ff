use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecallError {
	#[error("Empty corpus: no eligible documents to index")]
	EmptyCorpus,
	#[error("Index build failed: {0}")]
	BuildFailure(String),
	#[error("Record source unavailable: {0}")]
	RecordSourceUnavailable(String),
	#[error("Generation failed: {0}")]
	Generation(String),
	#[error("Invalid snapshot: {0}")]
	InvalidSnapshot(String),
	#[error("IO error: {0}")]
	Io(#[from] std::io::Error),
	#[error("JSON error: {0}")]
	Json(#[from] serde_json::Error),
}

impl RecallError {
	pub fn code(&self) -> &'static str {
		match self {
			Self::EmptyCorpus => "EMPTY_CORPUS",
			Self::BuildFailure(_) => "BUILD_FAILURE",
			Self::RecordSourceUnavailable(_) => "RECORD_SOURCE_UNAVAILABLE",
			Self::Generation(_) => "GENERATION_FAILED",
			Self::InvalidSnapshot(_) => "INVALID_SNAPSHOT",
			Self::Io(_) => "IO_ERROR",
			Self::Json(_) => "JSON_ERROR",
		}
	}

	/// Wrap any displayable fault raised by a record store.
	pub fn source_unavailable(err: impl std::fmt::Display) -> Self {
		Self::RecordSourceUnavailable(err.to_string())
	}
}
