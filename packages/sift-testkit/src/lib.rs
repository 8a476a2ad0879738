//! Deterministic in-memory collaborators for exercising the retrieval pipeline without a vector
//! database or model endpoints.

use std::{
	sync::{
		Arc, Mutex,
		atomic::{AtomicUsize, Ordering},
	},
	time::Duration,
};

use color_eyre::eyre;
use serde_json::Map;

use sift_config::{
	Analyzer, Assembly, Cache, Config, EmbeddingProviderConfig, Entities, Evaluation, Providers,
	Qdrant, Retrieval, Security, Service, Storage, Timeouts,
};
use sift_service::{
	BoxFuture, CandidateResult, Chunk, Collaborators, Embedder, Judgment, QueryRewriter,
	RelevanceScorer, ScoreCandidate, SearchFilters, SiftService, VectorIndex,
};

pub const TEST_VECTOR_DIM: u32 = 8;

/// How a fake collaborator answers a call.
#[derive(Debug, Clone)]
pub enum Behavior {
	Ready,
	Fail(String),
	/// Sleep before answering. Pair with a paused tokio clock.
	Stall(Duration),
}
impl Behavior {
	async fn apply(&self) -> color_eyre::Result<()> {
		match self {
			Self::Ready => Ok(()),
			Self::Fail(message) => Err(eyre::eyre!("{message}")),
			Self::Stall(duration) => {
				tokio::time::sleep(*duration).await;

				Ok(())
			},
		}
	}
}

/// Returns scripted pools: call `n` gets `pools[n]`, later calls repeat the last pool.
pub struct InMemoryIndex {
	pools: Vec<Vec<CandidateResult>>,
	behavior: Behavior,
	calls: AtomicUsize,
	filters_seen: Mutex<Vec<SearchFilters>>,
}
impl InMemoryIndex {
	pub fn new(pool: Vec<CandidateResult>) -> Self {
		Self::scripted(vec![pool])
	}

	pub fn scripted(pools: Vec<Vec<CandidateResult>>) -> Self {
		Self {
			pools,
			behavior: Behavior::Ready,
			calls: AtomicUsize::new(0),
			filters_seen: Mutex::new(Vec::new()),
		}
	}

	pub fn from_chunks(chunks: &[(Chunk, f32)]) -> Self {
		Self::new(
			chunks.iter().map(|(chunk, score)| CandidateResult::from_chunk(chunk, *score)).collect(),
		)
	}

	pub fn with_behavior(mut self, behavior: Behavior) -> Self {
		self.behavior = behavior;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}

	pub fn filters_seen(&self) -> Vec<SearchFilters> {
		self.filters_seen.lock().unwrap_or_else(|err| err.into_inner()).clone()
	}
}
impl VectorIndex for InMemoryIndex {
	fn search<'a>(
		&'a self,
		_embedding: &'a [f32],
		top_k: u32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CandidateResult>>> {
		let call = self.calls.fetch_add(1, Ordering::SeqCst);

		self.filters_seen.lock().unwrap_or_else(|err| err.into_inner()).push(filters.clone());

		Box::pin(async move {
			self.behavior.apply().await?;

			let pool = self
				.pools
				.get(call)
				.or_else(|| self.pools.last())
				.cloned()
				.unwrap_or_default();
			// Reverse so callers cannot rely on index order.
			let mut out: Vec<CandidateResult> = pool
				.into_iter()
				.filter(|candidate| {
					filters.document_ids.is_empty()
						|| filters.document_ids.contains(&candidate.document_id)
				})
				.rev()
				.collect();

			out.truncate(top_k as usize);

			Ok(out)
		})
	}
}

pub struct FixedEmbedder {
	dim: usize,
	behavior: Behavior,
	calls: AtomicUsize,
}
impl FixedEmbedder {
	pub fn new(dim: u32) -> Self {
		Self { dim: (dim as usize).max(1), behavior: Behavior::Ready, calls: AtomicUsize::new(0) }
	}

	pub fn with_behavior(mut self, behavior: Behavior) -> Self {
		self.behavior = behavior;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl Embedder for FixedEmbedder {
	fn embed<'a>(&'a self, _text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.behavior.apply().await?;

			Ok(vec![0.0; self.dim])
		})
	}
}

pub struct ScriptedRewriter {
	reply: String,
	behavior: Behavior,
	calls: AtomicUsize,
}
impl ScriptedRewriter {
	pub fn new(reply: &str) -> Self {
		Self { reply: reply.to_string(), behavior: Behavior::Ready, calls: AtomicUsize::new(0) }
	}

	pub fn with_behavior(mut self, behavior: Behavior) -> Self {
		self.behavior = behavior;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl QueryRewriter for ScriptedRewriter {
	fn rewrite<'a>(&'a self, _query: &'a str) -> BoxFuture<'a, color_eyre::Result<String>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.behavior.apply().await?;

			Ok(self.reply.clone())
		})
	}
}

/// Replays fixed judgments regardless of the candidates shown.
pub struct ScriptedScorer {
	judgments: Vec<Judgment>,
	behavior: Behavior,
	calls: AtomicUsize,
}
impl ScriptedScorer {
	pub fn new(judgments: Vec<Judgment>) -> Self {
		Self { judgments, behavior: Behavior::Ready, calls: AtomicUsize::new(0) }
	}

	pub fn with_behavior(mut self, behavior: Behavior) -> Self {
		self.behavior = behavior;

		self
	}

	pub fn calls(&self) -> usize {
		self.calls.load(Ordering::SeqCst)
	}
}
impl RelevanceScorer for ScriptedScorer {
	fn score<'a>(
		&'a self,
		_query: &'a str,
		_candidates: &'a [ScoreCandidate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Judgment>>> {
		self.calls.fetch_add(1, Ordering::SeqCst);

		Box::pin(async move {
			self.behavior.apply().await?;

			Ok(self.judgments.clone())
		})
	}
}

pub fn judgment(ordinal: usize, relevance_score: f32) -> Judgment {
	Judgment { ordinal, relevance_score, rationale: None }
}

pub fn candidate(
	chunk_id: &str,
	document_id: &str,
	content: &str,
	raw_score: f32,
) -> CandidateResult {
	CandidateResult {
		chunk_id: chunk_id.to_string(),
		document_id: document_id.to_string(),
		content: content.to_string(),
		raw_score,
		span: None,
	}
}

/// Collaborators around `index` with a fixed embedder and no rewriter.
pub fn collaborators(
	index: Arc<dyn VectorIndex>,
	scorer: Arc<dyn RelevanceScorer>,
) -> Collaborators {
	Collaborators::new(index, Arc::new(FixedEmbedder::new(TEST_VECTOR_DIM)), None, scorer)
}

pub fn service(cfg: Config, collaborators: Collaborators) -> SiftService {
	SiftService::with_collaborators(cfg, collaborators)
}

pub fn test_config() -> Config {
	Config {
		service: Service {
			http_bind: "127.0.0.1:8080".to_string(),
			admin_bind: "127.0.0.1:8081".to_string(),
			log_level: "info".to_string(),
		},
		storage: Storage {
			qdrant: Qdrant {
				url: "http://localhost:6334".to_string(),
				collection: "sift_chunks".to_string(),
				vector_dim: TEST_VECTOR_DIM,
			},
		},
		providers: Providers {
			embedding: EmbeddingProviderConfig {
				provider_id: "test".to_string(),
				api_base: "http://localhost".to_string(),
				api_key: "test-key".to_string(),
				path: "/embeddings".to_string(),
				model: "test-embedding".to_string(),
				dimensions: TEST_VECTOR_DIM,
				timeout_ms: 1_000,
				default_headers: Map::new(),
			},
			rewriter: None,
			judge: None,
		},
		analyzer: Analyzer::default(),
		entities: Entities::default(),
		retrieval: Retrieval::default(),
		evaluation: Evaluation::default(),
		assembly: Assembly::default(),
		cache: Cache::default(),
		timeouts: Timeouts::default(),
		security: Security { bind_localhost_only: true, api_auth_token: None },
	}
}
