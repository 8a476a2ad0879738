//! Request orchestration: retrieve, evaluate, optionally refine once, then assemble.
//!
//! Everything mutable lives in a per-request [`RequestContext`]. The cache and the collaborators
//! are the only state shared between concurrent requests.

use std::{collections::HashSet, future::Future, time::Duration};

use color_eyre::eyre;
use uuid::Uuid;

use sift_domain::{QueryAnalysis, QueryComplexity, RefinementRejection, analyzer::round_threshold};

use crate::{
	Error, Result, SiftService,
	assemble::{self, assemble},
	cache::CacheScope,
	evaluate::{self, ChunkEvaluator, THRESHOLD_EPSILON},
	types::{
		CandidateResult, Citation, ContextBundle, Degradation, Diagnostics, EvaluatedCandidate,
		PipelineState, RetrievalResponse, SearchFilters,
	},
};

/// Per-request state threaded through the pipeline.
pub struct RequestContext {
	pub trace_id: Uuid,
	pub analysis: QueryAnalysis,
	pub states: Vec<PipelineState>,
	pub degradations: Vec<Degradation>,
	pub cache_hit: bool,
	pub refinement_applied: bool,
	pub refined_query: Option<String>,
	pub candidate_count: usize,
}
impl RequestContext {
	pub fn new(analysis: QueryAnalysis) -> Self {
		Self {
			trace_id: Uuid::new_v4(),
			analysis,
			states: vec![PipelineState::Init],
			degradations: Vec::new(),
			cache_hit: false,
			refinement_applied: false,
			refined_query: None,
			candidate_count: 0,
		}
	}

	fn enter(&mut self, state: PipelineState) {
		tracing::debug!(trace_id = %self.trace_id, state = state.as_str(), "Pipeline state entered.");

		self.states.push(state);
	}

	fn degrade(&mut self, degradation: Degradation) {
		tracing::warn!(trace_id = %self.trace_id, degradation = ?degradation, "Request degraded.");

		self.degradations.push(degradation);
	}

	fn into_response(
		self,
		context_bundle: ContextBundle,
		citations: Vec<Citation>,
		selection: &Selection,
	) -> RetrievalResponse {
		let state = self.states.last().copied().unwrap_or(PipelineState::Init);

		RetrievalResponse {
			context_bundle,
			citations,
			diagnostics: Diagnostics {
				trace_id: self.trace_id,
				complexity: self.analysis.complexity,
				state,
				states: self.states,
				initial_threshold: self.analysis.relevance_threshold,
				threshold_used: selection.threshold_used,
				min_context_fallback: selection.fallback,
				refinement_applied: self.refinement_applied,
				refined_query: self.refined_query,
				degradations: self.degradations,
				candidate_count: self.candidate_count,
				cache_hit: self.cache_hit,
			},
		}
	}
}

/// Candidates chosen for assembly and how they were chosen.
#[derive(Debug, Clone, PartialEq)]
pub struct Selection {
	pub selected: Vec<EvaluatedCandidate>,
	pub threshold_used: f32,
	/// The floor was reached without meeting the minimum and the top raw-score chunks were
	/// taken regardless of threshold.
	pub fallback: bool,
}

impl SiftService {
	pub async fn process(&self, query: &str, filters: &SearchFilters) -> Result<RetrievalResponse> {
		let query = query.trim();

		if query.is_empty() {
			return Err(Error::InvalidRequest { message: "query must be non-empty.".to_string() });
		}

		let analysis =
			sift_domain::analyze(query, &self.cfg.analyzer, self.cfg.retrieval.threshold_floor);
		let mut ctx = RequestContext::new(analysis);

		tracing::info!(
			trace_id = %ctx.trace_id,
			complexity = ctx.analysis.complexity.as_str(),
			top_k = ctx.analysis.top_k,
			threshold = ctx.analysis.relevance_threshold,
			"Retrieval started."
		);

		ctx.enter(PipelineState::Retrieve);

		let retrieved = self.retrieve(&mut ctx, query, filters).await;
		let pool = match retrieved {
			Ok(pool) => pool,
			Err(err) => return Err(self.fail(ctx, err.to_string(), &[])),
		};

		ctx.candidate_count = pool.len();
		ctx.enter(PipelineState::Evaluate);

		let mut evaluated = self.evaluate(&mut ctx, query, query, filters, &pool).await;

		if self.should_refine(&ctx, &evaluated) {
			ctx.enter(PipelineState::Refine);

			if let Some(refined) = self.refine(&mut ctx, query).await {
				ctx.enter(PipelineState::Retrieve);

				let retrieved = self.retrieve(&mut ctx, &refined, filters).await;
				let fresh = match retrieved {
					Ok(fresh) => fresh,
					Err(err) => return Err(self.fail(ctx, err.to_string(), &evaluated)),
				};

				ctx.refinement_applied = true;

				if fresh.is_empty() && !pool.is_empty() {
					tracing::info!(
						trace_id = %ctx.trace_id,
						"Refined query retrieved nothing; keeping the original candidates."
					);
				} else {
					ctx.candidate_count = fresh.len();
					ctx.enter(PipelineState::Evaluate);

					evaluated = self.evaluate(&mut ctx, query, &refined, filters, &fresh).await;
				}
			}
		}

		ctx.enter(PipelineState::Assemble);

		let selection = select_with_min_context(
			&evaluated,
			ctx.analysis.relevance_threshold,
			&self.cfg.retrieval,
		);
		let (bundle, citations) = assemble(&selection.selected, &self.cfg.assembly);

		ctx.enter(PipelineState::Done);

		tracing::info!(
			trace_id = %ctx.trace_id,
			chunks = bundle.included_chunk_ids.len(),
			total_chars = bundle.total_chars,
			threshold_used = selection.threshold_used,
			min_context_fallback = selection.fallback,
			refinement_applied = ctx.refinement_applied,
			cache_hit = ctx.cache_hit,
			"Retrieval finished."
		);

		Ok(ctx.into_response(bundle, citations, &selection))
	}

	fn should_refine(&self, ctx: &RequestContext, evaluated: &[EvaluatedCandidate]) -> bool {
		self.cfg.retrieval.refinement_enabled
			&& ctx.analysis.complexity == QueryComplexity::Complex
			&& evaluate::filter(evaluated, ctx.analysis.relevance_threshold).is_empty()
	}

	/// Embeds `query` and searches the index, sorted by raw score desc then chunk id asc.
	async fn retrieve(
		&self,
		ctx: &mut RequestContext,
		query: &str,
		filters: &SearchFilters,
	) -> color_eyre::Result<Vec<CandidateResult>> {
		let top_k = ctx.analysis.top_k;
		let scope =
			CacheScope { query, top_k, threshold: ctx.analysis.relevance_threshold, filters };
		let key = self.cache.candidate_key(scope);

		if let Some(key) = key.as_deref()
			&& let Some(hit) = self.cache.get_candidates(key)
		{
			ctx.cache_hit = true;

			return Ok(hit.as_ref().clone());
		}

		ctx.cache_hit = false;

		let timeouts = &self.cfg.timeouts;
		let embedding = with_timeout(
			timeouts.embed_ms,
			"Query embedding",
			self.collaborators.embedder.embed(query),
		)
		.await?;
		let mut pool = with_timeout(
			timeouts.search_ms,
			"Vector search",
			self.collaborators.index.search(&embedding, top_k, filters),
		)
		.await?;

		pool.retain(|candidate| candidate.raw_score.is_finite());
		pool.sort_by(evaluate::cmp_candidates);
		pool.truncate(top_k as usize);

		if let Some(key) = key {
			self.cache.put_candidates(key, pool.clone());
		}

		Ok(pool)
	}

	async fn evaluate(
		&self,
		ctx: &mut RequestContext,
		query: &str,
		scored_query: &str,
		filters: &SearchFilters,
		candidates: &[CandidateResult],
	) -> Vec<EvaluatedCandidate> {
		let scope = CacheScope {
			query,
			top_k: ctx.analysis.top_k,
			threshold: ctx.analysis.relevance_threshold,
			filters,
		};
		let key = self.cache.evaluation_key(scope, scored_query, candidates);

		if let Some(key) = key.as_deref()
			&& let Some(hit) = self.cache.get_evaluation(key)
		{
			return hit.as_ref().clone();
		}

		let evaluator = ChunkEvaluator::new(
			self.collaborators.scorer.as_ref(),
			&self.cfg.evaluation,
			Duration::from_millis(self.cfg.timeouts.score_ms),
		);
		let outcome = evaluator.evaluate(scored_query, candidates).await;

		if let Some(message) = outcome.degraded {
			ctx.degrade(Degradation::EvaluationDegraded { message });
		} else if let Some(key) = key {
			self.cache.put_evaluation(key, outcome.evaluated.clone());
		}

		outcome.evaluated
	}

	/// One rewrite attempt. Returns the validated query only when it differs from `query`.
	async fn refine(&self, ctx: &mut RequestContext, query: &str) -> Option<String> {
		let Some(rewriter) = self.collaborators.rewriter.as_ref() else {
			ctx.degrade(Degradation::RefinementFailed {
				message: "No query rewriter is configured.".to_string(),
			});

			return None;
		};
		let rewrite =
			with_timeout(self.cfg.timeouts.rewrite_ms, "Query rewrite", rewriter.rewrite(query));
		let rewritten = match rewrite.await {
			Ok(text) => text,
			Err(err) => {
				ctx.degrade(Degradation::RefinementFailed { message: err.to_string() });

				return None;
			},
		};
		let report = sift_domain::validate_refinement(query, &rewritten, &self.cfg.entities);

		for repair in &report.repairs {
			tracing::info!(
				trace_id = %ctx.trace_id,
				entity = %repair.entity,
				replaced = %repair.replaced,
				similarity = repair.similarity,
				"Repaired key entity in rewritten query."
			);
		}

		match report.rejection {
			Some(RefinementRejection::Empty) => {
				ctx.degrade(Degradation::RefinementFailed {
					message: "Rewriter returned no content words.".to_string(),
				});

				None
			},
			Some(RefinementRejection::EntityCorruption { missing }) => {
				ctx.degrade(Degradation::EntityCorruption { missing });

				None
			},
			None => {
				let text = report.refined.text;

				ctx.refined_query = Some(text.clone());

				if text == query {
					tracing::debug!(
						trace_id = %ctx.trace_id,
						"Rewrite equals the original query; skipping re-retrieval."
					);

					return None;
				}

				Some(text)
			},
		}
	}

	/// Builds the `RetrievalUnavailable` error with whatever can still be assembled.
	fn fail(
		&self,
		mut ctx: RequestContext,
		message: String,
		evaluated: &[EvaluatedCandidate],
	) -> Error {
		tracing::warn!(trace_id = %ctx.trace_id, error = %message, "Retrieval unavailable.");

		let selection = select_with_min_context(
			evaluated,
			ctx.analysis.relevance_threshold,
			&self.cfg.retrieval,
		);
		let (bundle, citations) = assemble(&selection.selected, &self.cfg.assembly);

		ctx.enter(PipelineState::Failed);

		Error::RetrievalUnavailable {
			message,
			partial: Box::new(ctx.into_response(bundle, citations, &selection)),
		}
	}
}

/// Filters `evaluated` at `initial_threshold`, stepping the threshold down towards the floor
/// until the minimum-context guarantee holds. Duplicates that assembly would drop are removed
/// first, so the guarantee is checked against what actually reaches the bundle.
pub fn select_with_min_context(
	evaluated: &[EvaluatedCandidate],
	initial_threshold: f32,
	cfg: &sift_config::Retrieval,
) -> Selection {
	let pool = assemble::distinct(evaluated);
	let mut threshold = initial_threshold;
	let mut selected = evaluate::filter(&pool, threshold);
	let mut steps = 0_u32;

	while !meets_min_context(&selected, cfg)
		&& threshold > cfg.threshold_floor + THRESHOLD_EPSILON
	{
		steps += 1;

		let lowered = initial_threshold - steps as f32 * cfg.threshold_step;

		threshold = round_threshold(lowered.max(cfg.threshold_floor));
		selected = evaluate::filter(&pool, threshold);

		tracing::debug!(threshold, selected = selected.len(), "Lowered relevance threshold.");
	}

	if meets_min_context(&selected, cfg) || pool.is_empty() {
		return Selection { selected, threshold_used: threshold, fallback: false };
	}

	let mut by_raw: Vec<&EvaluatedCandidate> = pool.iter().collect();

	by_raw.sort_by(|a, b| evaluate::cmp_candidates(&a.candidate, &b.candidate));

	let mut chosen: HashSet<&str> =
		selected.iter().map(|item| item.candidate.chunk_id.as_str()).collect();

	for item in by_raw.into_iter().take(cfg.min_chunks as usize) {
		chosen.insert(item.candidate.chunk_id.as_str());
	}

	let selected = pool
		.iter()
		.filter(|item| chosen.contains(item.candidate.chunk_id.as_str()))
		.cloned()
		.collect();

	Selection { selected, threshold_used: threshold, fallback: true }
}

fn meets_min_context(selected: &[EvaluatedCandidate], cfg: &sift_config::Retrieval) -> bool {
	let chars: usize = selected.iter().map(|item| item.candidate.content.chars().count()).sum();

	selected.len() >= cfg.min_chunks as usize || chars >= cfg.min_context_chars as usize
}

async fn with_timeout<T>(
	ms: u64,
	what: &str,
	fut: impl Future<Output = color_eyre::Result<T>>,
) -> color_eyre::Result<T> {
	match tokio::time::timeout(Duration::from_millis(ms), fut).await {
		Ok(result) => result,
		Err(_) => Err(eyre::eyre!("{what} timed out after {ms} ms.")),
	}
}
