pub mod assemble;
pub mod cache;
pub mod evaluate;
pub mod pipeline;
pub mod types;

mod error;

pub use cache::RetrievalCache;
pub use error::{Error, Result};
pub use evaluate::{ChunkEvaluator, EvaluationOutcome, PassthroughScorer};
pub use sift_providers::scorer::{Judgment, ScoreCandidate};
pub use types::{
	CandidateResult, Chunk, ChunkSpan, Citation, ContextBundle, Degradation, Diagnostics,
	EvaluatedCandidate, NO_RELEVANT_DOCUMENTS, PipelineState, RetrievalRequest, RetrievalResponse,
	ScoreSource, SearchFilters,
};

use std::{future::Future, pin::Pin, sync::Arc};

use sift_config::{Config, EmbeddingProviderConfig, LlmProviderConfig};
use sift_providers::{embedding, rewriter, scorer};
use sift_storage::qdrant::QdrantStore;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

pub trait VectorIndex
where
	Self: Send + Sync,
{
	/// Nearest chunks for `embedding`, at most `top_k`. Ordering is not relied upon.
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CandidateResult>>>;
}

pub trait Embedder
where
	Self: Send + Sync,
{
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>>;
}

pub trait QueryRewriter
where
	Self: Send + Sync,
{
	fn rewrite<'a>(&'a self, query: &'a str) -> BoxFuture<'a, color_eyre::Result<String>>;
}

pub trait RelevanceScorer
where
	Self: Send + Sync,
{
	/// Judgments keyed by the 1-based ordinal of each candidate. The result may omit candidates,
	/// repeat ordinals, or name ordinals that do not exist.
	fn score<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [ScoreCandidate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Judgment>>>;
}

#[derive(Clone)]
pub struct Collaborators {
	pub index: Arc<dyn VectorIndex>,
	pub embedder: Arc<dyn Embedder>,
	/// Without a rewriter every refinement attempt is recorded as failed.
	pub rewriter: Option<Arc<dyn QueryRewriter>>,
	pub scorer: Arc<dyn RelevanceScorer>,
}
impl Collaborators {
	pub fn new(
		index: Arc<dyn VectorIndex>,
		embedder: Arc<dyn Embedder>,
		rewriter: Option<Arc<dyn QueryRewriter>>,
		scorer: Arc<dyn RelevanceScorer>,
	) -> Self {
		Self { index, embedder, rewriter, scorer }
	}

	/// HTTP providers from `cfg`. The scorer follows `evaluation.mode`.
	pub fn from_config(cfg: &Config, index: Arc<dyn VectorIndex>) -> Self {
		let embedder = Arc::new(HttpEmbedder { cfg: cfg.providers.embedding.clone() });
		let rewriter = cfg
			.providers
			.rewriter
			.clone()
			.map(|cfg| Arc::new(HttpRewriter { cfg }) as Arc<dyn QueryRewriter>);
		let scorer: Arc<dyn RelevanceScorer> =
			match (cfg.evaluation.mode.as_str(), cfg.providers.judge.clone()) {
				("llm", Some(judge)) => Arc::new(LlmJudge { cfg: judge }),
				_ => Arc::new(PassthroughScorer),
			};

		Self { index, embedder, rewriter, scorer }
	}
}

pub struct SiftService {
	pub cfg: Config,
	pub collaborators: Collaborators,
	pub cache: RetrievalCache,
}
impl SiftService {
	pub fn new(cfg: Config, qdrant: QdrantStore) -> Self {
		let collaborators = Collaborators::from_config(&cfg, Arc::new(qdrant));

		Self::with_collaborators(cfg, collaborators)
	}

	pub fn with_collaborators(cfg: Config, collaborators: Collaborators) -> Self {
		let cache = RetrievalCache::new(&cfg.cache);

		Self { cfg, collaborators, cache }
	}

	pub fn corpus_version(&self) -> String {
		self.cache.corpus_version()
	}

	/// Marks the corpus as changed. Every cached entry becomes unreachable.
	pub fn set_corpus_version(&self, version: &str) -> Result<()> {
		let version = version.trim();

		if version.is_empty() {
			return Err(Error::InvalidRequest {
				message: "corpus_version must be non-empty.".to_string(),
			});
		}

		self.cache.set_corpus_version(version);

		Ok(())
	}
}

struct HttpEmbedder {
	cfg: EmbeddingProviderConfig,
}
impl Embedder for HttpEmbedder {
	fn embed<'a>(&'a self, text: &'a str) -> BoxFuture<'a, color_eyre::Result<Vec<f32>>> {
		Box::pin(embedding::embed_query(&self.cfg, text))
	}
}

struct HttpRewriter {
	cfg: LlmProviderConfig,
}
impl QueryRewriter for HttpRewriter {
	fn rewrite<'a>(&'a self, query: &'a str) -> BoxFuture<'a, color_eyre::Result<String>> {
		Box::pin(rewriter::rewrite(&self.cfg, query))
	}
}

struct LlmJudge {
	cfg: LlmProviderConfig,
}
impl RelevanceScorer for LlmJudge {
	fn score<'a>(
		&'a self,
		query: &'a str,
		candidates: &'a [ScoreCandidate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Judgment>>> {
		Box::pin(scorer::score(&self.cfg, query, candidates))
	}
}

impl VectorIndex for QdrantStore {
	fn search<'a>(
		&'a self,
		embedding: &'a [f32],
		top_k: u32,
		filters: &'a SearchFilters,
	) -> BoxFuture<'a, color_eyre::Result<Vec<CandidateResult>>> {
		Box::pin(async move {
			let hits =
				QdrantStore::search(self, embedding.to_vec(), top_k as u64, &filters.document_ids)
					.await?;

			Ok(hits
				.into_iter()
				.map(|hit| CandidateResult {
					chunk_id: hit.chunk_id,
					document_id: hit.document_id,
					content: hit.content,
					raw_score: hit.score,
					span: hit.span.map(|(start, end)| ChunkSpan { start, end }),
				})
				.collect())
		})
	}
}
