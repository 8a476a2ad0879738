//! In-process TTL cache for candidate pools and evaluation results.
//!
//! Keys are blake3 hashes over the normalized query, the retrieval parameters and the current
//! corpus version. Changing the corpus version also drops every entry, so a stale pool can only
//! be served until the next ingestion bump.

use std::{
	sync::{Arc, RwLock},
	time::Duration,
};

use moka::sync::Cache;

use crate::types::{CandidateResult, EvaluatedCandidate, SearchFilters};

const SCHEMA_VERSION: u32 = 1;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheKind {
	Candidates,
	Evaluation,
}
impl CacheKind {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Candidates => "candidates",
			Self::Evaluation => "evaluation",
		}
	}
}

/// Parameters shared by both key kinds.
#[derive(Debug, Clone, Copy)]
pub struct CacheScope<'a> {
	pub query: &'a str,
	pub top_k: u32,
	pub threshold: f32,
	pub filters: &'a SearchFilters,
}

pub struct RetrievalCache {
	enabled: bool,
	candidates: Cache<String, Arc<Vec<CandidateResult>>>,
	evaluations: Cache<String, Arc<Vec<EvaluatedCandidate>>>,
	corpus_version: RwLock<String>,
}
impl RetrievalCache {
	pub fn new(cfg: &sift_config::Cache) -> Self {
		let ttl = Duration::from_secs(cfg.ttl_secs.max(1));
		let capacity = cfg.max_entries.max(1);

		Self {
			enabled: cfg.enabled,
			candidates: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
			evaluations: Cache::builder().max_capacity(capacity).time_to_live(ttl).build(),
			corpus_version: RwLock::new(cfg.corpus_version.clone()),
		}
	}

	pub fn enabled(&self) -> bool {
		self.enabled
	}

	pub fn corpus_version(&self) -> String {
		self.corpus_version.read().unwrap_or_else(|err| err.into_inner()).clone()
	}

	pub fn set_corpus_version(&self, version: &str) {
		{
			let mut current = self.corpus_version.write().unwrap_or_else(|err| err.into_inner());

			*current = version.to_string();
		}

		self.candidates.invalidate_all();
		self.evaluations.invalidate_all();

		tracing::info!(corpus_version = version, "Corpus version changed; cache invalidated.");
	}

	/// `None` when caching is disabled or the key cannot be encoded.
	pub fn candidate_key(&self, scope: CacheScope<'_>) -> Option<String> {
		if !self.enabled {
			return None;
		}

		let payload = serde_json::json!({
			"kind": CacheKind::Candidates.as_str(),
			"schema_version": SCHEMA_VERSION,
			"query": sift_domain::text::normalize_query(scope.query),
			"top_k": scope.top_k,
			"threshold": scope.threshold,
			"filters": scope.filters,
			"corpus_version": self.corpus_version(),
		});

		self.hash_key(CacheKind::Candidates, &payload)
	}

	/// Evaluation results depend on the exact candidate set and on the query the scorer saw.
	pub fn evaluation_key(
		&self,
		scope: CacheScope<'_>,
		scored_query: &str,
		candidates: &[CandidateResult],
	) -> Option<String> {
		if !self.enabled {
			return None;
		}

		let chunk_ids: Vec<&str> =
			candidates.iter().map(|candidate| candidate.chunk_id.as_str()).collect();
		let payload = serde_json::json!({
			"kind": CacheKind::Evaluation.as_str(),
			"schema_version": SCHEMA_VERSION,
			"query": sift_domain::text::normalize_query(scope.query),
			"scored_query": sift_domain::text::normalize_query(scored_query),
			"top_k": scope.top_k,
			"threshold": scope.threshold,
			"filters": scope.filters,
			"chunk_ids": chunk_ids,
			"corpus_version": self.corpus_version(),
		});

		self.hash_key(CacheKind::Evaluation, &payload)
	}

	pub fn get_candidates(&self, key: &str) -> Option<Arc<Vec<CandidateResult>>> {
		let value = self.candidates.get(key);

		log_lookup(CacheKind::Candidates, key, value.is_some());

		value
	}

	pub fn put_candidates(&self, key: String, candidates: Vec<CandidateResult>) {
		self.candidates.insert(key, Arc::new(candidates));
	}

	pub fn get_evaluation(&self, key: &str) -> Option<Arc<Vec<EvaluatedCandidate>>> {
		let value = self.evaluations.get(key);

		log_lookup(CacheKind::Evaluation, key, value.is_some());

		value
	}

	pub fn put_evaluation(&self, key: String, evaluated: Vec<EvaluatedCandidate>) {
		self.evaluations.insert(key, Arc::new(evaluated));
	}

	fn hash_key(&self, kind: CacheKind, payload: &serde_json::Value) -> Option<String> {
		match serde_json::to_vec(payload) {
			Ok(raw) => Some(blake3::hash(&raw).to_hex().to_string()),
			Err(err) => {
				tracing::warn!(error = %err, cache_kind = kind.as_str(), "Cache key build failed.");

				None
			},
		}
	}
}

pub fn cache_key_prefix(key: &str) -> &str {
	let len = key.len().min(12);

	&key[..len]
}

fn log_lookup(kind: CacheKind, key: &str, hit: bool) {
	if hit {
		tracing::info!(
			cache_kind = kind.as_str(),
			cache_key_prefix = cache_key_prefix(key),
			hit = true,
			"Cache hit."
		);
	} else {
		tracing::info!(
			cache_kind = kind.as_str(),
			cache_key_prefix = cache_key_prefix(key),
			hit = false,
			"Cache miss."
		);
	}
}
