mod error;
mod types;

pub use error::{Error, Result};
pub use types::{
	Analyzer, Assembly, Cache, Config, EmbeddingProviderConfig, Entities, Evaluation,
	LlmProviderConfig, Providers, Qdrant, Retrieval, Security, Service, Storage, Timeouts,
};

use std::{fs, path::Path};

pub fn load(path: &Path) -> Result<Config> {
	let raw = fs::read_to_string(path)
		.map_err(|err| Error::ReadConfig { path: path.to_path_buf(), source: err })?;

	let mut cfg: Config = toml::from_str(&raw)
		.map_err(|err| Error::ParseConfig { path: path.to_path_buf(), source: err })?;

	normalize(&mut cfg);

	validate(&cfg)?;

	Ok(cfg)
}

pub fn validate(cfg: &Config) -> Result<()> {
	if cfg.service.http_bind.trim().is_empty() {
		return Err(Error::Validation {
			message: "service.http_bind must be non-empty.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions == 0 {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must be greater than zero.".to_string(),
		});
	}
	if cfg.providers.embedding.dimensions != cfg.storage.qdrant.vector_dim {
		return Err(Error::Validation {
			message: "providers.embedding.dimensions must match storage.qdrant.vector_dim."
				.to_string(),
		});
	}

	validate_analyzer(cfg)?;
	validate_entities(cfg)?;
	validate_retrieval(cfg)?;

	let mode = cfg.evaluation.mode.as_str();

	if !matches!(mode, "passthrough" | "llm") {
		return Err(Error::Validation {
			message: "evaluation.mode must be one of passthrough or llm.".to_string(),
		});
	}
	if mode == "llm" && cfg.providers.judge.is_none() {
		return Err(Error::Validation {
			message: "providers.judge must be configured when evaluation.mode is llm.".to_string(),
		});
	}
	if !cfg.evaluation.missing_score_factor.is_finite()
		|| !(0.0..=1.0).contains(&cfg.evaluation.missing_score_factor)
	{
		return Err(Error::Validation {
			message: "evaluation.missing_score_factor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if cfg.evaluation.max_candidate_chars == 0 {
		return Err(Error::Validation {
			message: "evaluation.max_candidate_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.assembly.max_context_chars < cfg.retrieval.min_context_chars {
		return Err(Error::Validation {
			message: "assembly.max_context_chars must be at least retrieval.min_context_chars."
				.to_string(),
		});
	}
	if cfg.assembly.excerpt_chars == 0 {
		return Err(Error::Validation {
			message: "assembly.excerpt_chars must be greater than zero.".to_string(),
		});
	}
	if cfg.cache.enabled {
		if cfg.cache.ttl_secs == 0 {
			return Err(Error::Validation {
				message: "cache.ttl_secs must be greater than zero.".to_string(),
			});
		}
		if cfg.cache.max_entries == 0 {
			return Err(Error::Validation {
				message: "cache.max_entries must be greater than zero.".to_string(),
			});
		}
	}
	if cfg.cache.corpus_version.is_empty() {
		return Err(Error::Validation {
			message: "cache.corpus_version must be non-empty.".to_string(),
		});
	}

	for (label, value) in [
		("timeouts.embed_ms", cfg.timeouts.embed_ms),
		("timeouts.search_ms", cfg.timeouts.search_ms),
		("timeouts.rewrite_ms", cfg.timeouts.rewrite_ms),
		("timeouts.score_ms", cfg.timeouts.score_ms),
	] {
		if value == 0 {
			return Err(Error::Validation {
				message: format!("{label} must be greater than zero."),
			});
		}
	}

	let mut keys = vec![("embedding", &cfg.providers.embedding.api_key)];

	if let Some(rewriter) = cfg.providers.rewriter.as_ref() {
		keys.push(("rewriter", &rewriter.api_key));
	}
	if let Some(judge) = cfg.providers.judge.as_ref() {
		keys.push(("judge", &judge.api_key));
	}

	for (label, key) in keys {
		if key.trim().is_empty() {
			return Err(Error::Validation {
				message: format!("Provider {label} api_key must be non-empty."),
			});
		}
	}

	Ok(())
}

fn validate_analyzer(cfg: &Config) -> Result<()> {
	let analyzer = &cfg.analyzer;

	if analyzer.default_top_k == 0 {
		return Err(Error::Validation {
			message: "analyzer.default_top_k must be greater than zero.".to_string(),
		});
	}
	if analyzer.default_top_k + analyzer.complex_top_k_bonus > analyzer.max_top_k {
		return Err(Error::Validation {
			message: "analyzer.max_top_k must cover default_top_k plus complex_top_k_bonus."
				.to_string(),
		});
	}
	if !analyzer.default_threshold.is_finite()
		|| !(0.0..=1.0).contains(&analyzer.default_threshold)
	{
		return Err(Error::Validation {
			message: "analyzer.default_threshold must be in the range 0.0-1.0.".to_string(),
		});
	}

	for (label, value) in [
		("analyzer.complex_threshold_drop", analyzer.complex_threshold_drop),
		("analyzer.ambiguous_threshold_drop", analyzer.ambiguous_threshold_drop),
	] {
		if !value.is_finite() || value < 0.0 {
			return Err(Error::Validation {
				message: format!("{label} must be a finite number zero or greater."),
			});
		}
	}

	if analyzer.simple_max_tokens >= analyzer.complex_min_tokens {
		return Err(Error::Validation {
			message: "analyzer.simple_max_tokens must be less than analyzer.complex_min_tokens."
				.to_string(),
		});
	}

	Ok(())
}

fn validate_entities(cfg: &Config) -> Result<()> {
	let entities = &cfg.entities;

	if !entities.similarity_threshold.is_finite()
		|| entities.similarity_threshold <= 0.0
		|| entities.similarity_threshold >= 1.0
	{
		return Err(Error::Validation {
			message: "entities.similarity_threshold must be greater than 0.0 and less than 1.0."
				.to_string(),
		});
	}
	if !entities.presence_threshold.is_finite()
		|| entities.presence_threshold <= 0.0
		|| entities.presence_threshold > entities.similarity_threshold
	{
		return Err(Error::Validation {
			message: "entities.presence_threshold must be greater than 0.0 and at most entities.similarity_threshold."
				.to_string(),
		});
	}
	if entities.min_entity_chars == 0 {
		return Err(Error::Validation {
			message: "entities.min_entity_chars must be greater than zero.".to_string(),
		});
	}

	Ok(())
}

fn validate_retrieval(cfg: &Config) -> Result<()> {
	let retrieval = &cfg.retrieval;

	if retrieval.min_chunks == 0 {
		return Err(Error::Validation {
			message: "retrieval.min_chunks must be greater than zero.".to_string(),
		});
	}
	// Thresholds are reported at two decimals; a smaller step would not move them.
	if !retrieval.threshold_step.is_finite() || retrieval.threshold_step < 0.01 {
		return Err(Error::Validation {
			message: "retrieval.threshold_step must be a finite number of at least 0.01."
				.to_string(),
		});
	}
	if !retrieval.threshold_floor.is_finite() || !(0.0..=1.0).contains(&retrieval.threshold_floor)
	{
		return Err(Error::Validation {
			message: "retrieval.threshold_floor must be in the range 0.0-1.0.".to_string(),
		});
	}
	if retrieval.threshold_floor > cfg.analyzer.default_threshold {
		return Err(Error::Validation {
			message: "retrieval.threshold_floor must not exceed analyzer.default_threshold."
				.to_string(),
		});
	}

	Ok(())
}

fn normalize(cfg: &mut Config) {
	cfg.evaluation.mode = cfg.evaluation.mode.trim().to_ascii_lowercase();
	cfg.cache.corpus_version = cfg.cache.corpus_version.trim().to_string();

	if cfg.providers.rewriter.as_ref().map(|p| p.api_base.trim().is_empty()).unwrap_or(false) {
		cfg.providers.rewriter = None;
	}
	if cfg.providers.judge.as_ref().map(|p| p.api_base.trim().is_empty()).unwrap_or(false) {
		cfg.providers.judge = None;
	}

	cfg.security.api_auth_token = cfg
		.security
		.api_auth_token
		.take()
		.map(|token| token.trim().to_string())
		.filter(|token| !token.is_empty());
}
