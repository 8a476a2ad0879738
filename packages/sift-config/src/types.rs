use serde::Deserialize;
use serde_json::{Map, Value};

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
	pub service: Service,
	pub storage: Storage,
	pub providers: Providers,
	#[serde(default)]
	pub analyzer: Analyzer,
	#[serde(default)]
	pub entities: Entities,
	#[serde(default)]
	pub retrieval: Retrieval,
	#[serde(default)]
	pub evaluation: Evaluation,
	#[serde(default)]
	pub assembly: Assembly,
	#[serde(default)]
	pub cache: Cache,
	#[serde(default)]
	pub timeouts: Timeouts,
	pub security: Security,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Service {
	pub http_bind: String,
	pub admin_bind: String,
	pub log_level: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Storage {
	pub qdrant: Qdrant,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Qdrant {
	pub url: String,
	pub collection: String,
	pub vector_dim: u32,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Providers {
	pub embedding: EmbeddingProviderConfig,
	/// Optional. Without a rewriter, refinement is recorded as failed and the original query is
	/// kept.
	pub rewriter: Option<LlmProviderConfig>,
	/// Required when `evaluation.mode = "llm"`.
	pub judge: Option<LlmProviderConfig>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EmbeddingProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub dimensions: u32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LlmProviderConfig {
	pub provider_id: String,
	pub api_base: String,
	pub api_key: String,
	pub path: String,
	pub model: String,
	pub temperature: f32,
	pub timeout_ms: u64,
	#[serde(default)]
	pub default_headers: Map<String, Value>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Analyzer {
	pub default_top_k: u32,
	pub complex_top_k_bonus: u32,
	pub max_top_k: u32,
	pub default_threshold: f32,
	pub complex_threshold_drop: f32,
	pub ambiguous_threshold_drop: f32,
	pub complex_min_tokens: u32,
	pub complex_min_clauses: u32,
	pub complex_min_entities: u32,
	pub simple_max_tokens: u32,
	pub ambiguous_max_tokens: u32,
}
impl Default for Analyzer {
	fn default() -> Self {
		Self {
			default_top_k: 15,
			complex_top_k_bonus: 5,
			max_top_k: 100,
			default_threshold: 0.7,
			complex_threshold_drop: 0.1,
			ambiguous_threshold_drop: 0.05,
			complex_min_tokens: 16,
			complex_min_clauses: 2,
			complex_min_entities: 3,
			simple_max_tokens: 6,
			ambiguous_max_tokens: 3,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Entities {
	/// Lower bound of the near-match band `[similarity_threshold, 1.0)` treated as a typo.
	pub similarity_threshold: f32,
	/// Below this similarity an entity counts as absent and is appended.
	pub presence_threshold: f32,
	pub min_entity_chars: u32,
}
impl Default for Entities {
	fn default() -> Self {
		Self { similarity_threshold: 0.75, presence_threshold: 0.5, min_entity_chars: 3 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Retrieval {
	pub min_chunks: u32,
	pub min_context_chars: u32,
	pub threshold_step: f32,
	pub threshold_floor: f32,
	pub refinement_enabled: bool,
}
impl Default for Retrieval {
	fn default() -> Self {
		Self {
			min_chunks: 3,
			min_context_chars: 1_000,
			threshold_step: 0.1,
			threshold_floor: 0.2,
			refinement_enabled: true,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Evaluation {
	/// One of `passthrough` or `llm`.
	pub mode: String,
	pub missing_score_factor: f32,
	/// Per-candidate content cap in the judge prompt.
	pub max_candidate_chars: u32,
}
impl Default for Evaluation {
	fn default() -> Self {
		Self {
			mode: "passthrough".to_string(),
			missing_score_factor: 0.9,
			max_candidate_chars: 1_200,
		}
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Assembly {
	pub max_context_chars: u32,
	pub excerpt_chars: u32,
}
impl Default for Assembly {
	fn default() -> Self {
		Self { max_context_chars: 12_000, excerpt_chars: 240 }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Cache {
	pub enabled: bool,
	pub ttl_secs: u64,
	pub max_entries: u64,
	/// Initial corpus marker. Bumping it after ingestion orphans every cached entry.
	pub corpus_version: String,
}
impl Default for Cache {
	fn default() -> Self {
		Self { enabled: true, ttl_secs: 300, max_entries: 1_024, corpus_version: "v1".to_string() }
	}
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct Timeouts {
	pub embed_ms: u64,
	pub search_ms: u64,
	pub rewrite_ms: u64,
	pub score_ms: u64,
}
impl Default for Timeouts {
	fn default() -> Self {
		Self { embed_ms: 5_000, search_ms: 5_000, rewrite_ms: 8_000, score_ms: 12_000 }
	}
}

#[derive(Debug, Clone, Deserialize)]
pub struct Security {
	pub bind_localhost_only: bool,
	/// When set, `/v1/retrieve` requires `Authorization: Bearer <token>`.
	#[serde(default)]
	pub api_auth_token: Option<String>,
}
