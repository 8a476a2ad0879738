use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use uuid::Uuid;

use sift_domain::QueryComplexity;

/// Message for the caller's "nothing found" answer path.
pub const NO_RELEVANT_DOCUMENTS: &str = "No relevant documents were found for this question.";

/// A stored chunk as produced by ingestion. Never mutated by retrieval.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Chunk {
	pub id: String,
	pub document_id: String,
	pub content: String,
	#[serde(default)]
	pub metadata: Map<String, Value>,
}
impl Chunk {
	/// Source-document offsets from `start_offset`/`end_offset` metadata, when both are present.
	pub fn span(&self) -> Option<ChunkSpan> {
		let start = self.metadata.get("start_offset")?.as_u64()?;
		let end = self.metadata.get("end_offset")?.as_u64()?;

		(start <= end).then_some(ChunkSpan { start, end })
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ChunkSpan {
	pub start: u64,
	pub end: u64,
}
impl ChunkSpan {
	pub fn contains(&self, other: &Self) -> bool {
		self.start <= other.start && other.end <= self.end
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CandidateResult {
	pub chunk_id: String,
	pub document_id: String,
	pub content: String,
	pub raw_score: f32,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub span: Option<ChunkSpan>,
}
impl CandidateResult {
	pub fn from_chunk(chunk: &Chunk, raw_score: f32) -> Self {
		Self {
			chunk_id: chunk.id.clone(),
			document_id: chunk.document_id.clone(),
			content: chunk.content.clone(),
			raw_score,
			span: chunk.span(),
		}
	}
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
	/// Scored by the relevance scorer.
	Judge,
	/// The scorer skipped this candidate; scored from its raw score.
	Default,
	/// The scorer failed; raw score used as is.
	Raw,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluatedCandidate {
	#[serde(flatten)]
	pub candidate: CandidateResult,
	pub relevance_score: f32,
	pub score_source: ScoreSource,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SearchFilters {
	/// Restrict retrieval to these documents. Empty means the whole corpus.
	#[serde(default)]
	pub document_ids: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextBundle {
	pub text: String,
	pub included_chunk_ids: Vec<String>,
	pub total_chars: usize,
}
impl ContextBundle {
	pub fn is_empty(&self) -> bool {
		self.included_chunk_ids.is_empty()
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Citation {
	/// 1-based, in inclusion order.
	pub index: usize,
	pub chunk_id: String,
	pub document_id: String,
	pub excerpt: String,
	pub score: f32,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
	Init,
	Retrieve,
	Evaluate,
	Refine,
	Assemble,
	Done,
	Failed,
}
impl PipelineState {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Init => "init",
			Self::Retrieve => "retrieve",
			Self::Evaluate => "evaluate",
			Self::Refine => "refine",
			Self::Assemble => "assemble",
			Self::Done => "done",
			Self::Failed => "failed",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Degradation {
	/// The rewriter failed, timed out, or returned nothing usable. The original query was kept.
	RefinementFailed { message: String },
	/// The relevance scorer failed or timed out. Raw scores were used for ranking.
	EvaluationDegraded { message: String },
	/// The rewrite lost key entities even after repair and was rejected.
	EntityCorruption { missing: Vec<String> },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
	pub trace_id: Uuid,
	pub complexity: QueryComplexity,
	pub state: PipelineState,
	pub states: Vec<PipelineState>,
	pub initial_threshold: f32,
	pub threshold_used: f32,
	pub min_context_fallback: bool,
	pub refinement_applied: bool,
	pub refined_query: Option<String>,
	pub degradations: Vec<Degradation>,
	pub candidate_count: usize,
	pub cache_hit: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetrievalRequest {
	pub query: String,
	#[serde(default)]
	pub filters: SearchFilters,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RetrievalResponse {
	pub context_bundle: ContextBundle,
	pub citations: Vec<Citation>,
	pub diagnostics: Diagnostics,
}
impl RetrievalResponse {
	/// True when nothing relevant was found. Callers should answer with
	/// [`NO_RELEVANT_DOCUMENTS`] rather than generate.
	pub fn is_empty(&self) -> bool {
		self.context_bundle.is_empty()
	}
}
