use serde::{Deserialize, Serialize};

/// One vector hit, read back from the point payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredChunk {
	pub chunk_id: String,
	pub document_id: String,
	pub content: String,
	pub score: f32,
	/// Character offsets of the chunk inside its source document, when ingestion recorded them.
	pub span: Option<(u64, u64)>,
}
