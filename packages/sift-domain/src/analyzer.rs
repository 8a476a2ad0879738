use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::text;

const CONJUNCTION_PATTERN: &str =
	r"(?i)\b(and|or|but|versus|vs|while|whereas|because|although|compared)\b";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryComplexity {
	Simple,
	Moderate,
	Complex,
}
impl QueryComplexity {
	pub fn as_str(self) -> &'static str {
		match self {
			Self::Simple => "simple",
			Self::Moderate => "moderate",
			Self::Complex => "complex",
		}
	}
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryAnalysis {
	pub top_k: u32,
	pub relevance_threshold: f32,
	pub complexity: QueryComplexity,
	pub token_count: u32,
	pub clause_count: u32,
	pub capitalized_count: u32,
	pub ambiguous: bool,
}

/// Derives retrieval parameters from the raw query. Deterministic in `query` and `cfg`.
pub fn analyze(query: &str, cfg: &sift_config::Analyzer, threshold_floor: f32) -> QueryAnalysis {
	let tokens = text::word_tokens(query);
	let token_count = tokens.len() as u32;
	let clause_count = count_clauses(query);
	// The leading word is capitalized by sentence convention, not because it names something.
	let capitalized_count = tokens
		.iter()
		.skip(1)
		.filter(|token| token.chars().count() >= 3 && text::starts_uppercase(token))
		.count() as u32;
	let complexity = if token_count >= cfg.complex_min_tokens
		|| clause_count >= cfg.complex_min_clauses
		|| capitalized_count >= cfg.complex_min_entities
	{
		QueryComplexity::Complex
	} else if token_count <= cfg.simple_max_tokens && clause_count == 0 {
		QueryComplexity::Simple
	} else {
		QueryComplexity::Moderate
	};
	let ambiguous = token_count <= cfg.ambiguous_max_tokens && capitalized_count == 0;
	let mut top_k = cfg.default_top_k;
	let mut threshold = cfg.default_threshold;

	if complexity == QueryComplexity::Complex {
		top_k += cfg.complex_top_k_bonus;
		threshold -= cfg.complex_threshold_drop;
	}
	if ambiguous {
		threshold -= cfg.ambiguous_threshold_drop;
	}

	QueryAnalysis {
		top_k: top_k.clamp(1, cfg.max_top_k.max(1)),
		relevance_threshold: round_threshold(threshold.clamp(threshold_floor, 1.0)),
		complexity,
		token_count,
		clause_count,
		capitalized_count,
		ambiguous,
	}
}

pub fn count_clauses(query: &str) -> u32 {
	let conjunctions =
		Regex::new(CONJUNCTION_PATTERN).map(|re| re.find_iter(query).count()).unwrap_or(0);
	let separators = query.chars().filter(|ch| matches!(ch, ',' | ';')).count();
	let extra_questions = query.chars().filter(|ch| *ch == '?').count().saturating_sub(1);

	(conjunctions + separators + extra_questions) as u32
}

/// Snaps to two decimals so repeated float arithmetic yields stable cache keys.
pub fn round_threshold(value: f32) -> f32 {
	(value * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn counts_conjunctions_separators_and_extra_questions() {
		assert_eq!(count_clauses("What is Qdrant?"), 0);
		assert_eq!(count_clauses("Compare A and B, then C or D?"), 3);
		assert_eq!(count_clauses("Why? How?"), 1);
		assert_eq!(count_clauses("Brandon lives here"), 0);
	}

	#[test]
	fn round_threshold_snaps_float_noise() {
		assert!((round_threshold(0.7 - 0.1) - 0.6).abs() < f32::EPSILON);
	}
}
