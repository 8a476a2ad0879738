//! Relevance evaluation with chunk-id validation.
//!
//! The scorer sees candidates by ordinal only. The ordinal table is rebuilt for every call and
//! never outlives it, so a judgment can only ever land on a chunk from the current candidate set.

use std::{cmp::Ordering, time::Duration};

use crate::{
	BoxFuture, Judgment, RelevanceScorer, ScoreCandidate,
	types::{CandidateResult, EvaluatedCandidate, ScoreSource},
};

/// Slack for threshold comparisons so stepped thresholds like `0.7 - 0.1` match `0.6` scores.
pub const THRESHOLD_EPSILON: f32 = 1e-4;

/// Scores each candidate with its own raw score.
pub struct PassthroughScorer;
impl RelevanceScorer for PassthroughScorer {
	fn score<'a>(
		&'a self,
		_query: &'a str,
		candidates: &'a [ScoreCandidate],
	) -> BoxFuture<'a, color_eyre::Result<Vec<Judgment>>> {
		let judgments = candidates
			.iter()
			.map(|candidate| Judgment {
				ordinal: candidate.ordinal,
				relevance_score: candidate.raw_score,
				rationale: None,
			})
			.collect();

		Box::pin(async move { Ok(judgments) })
	}
}

#[derive(Debug, Clone, PartialEq)]
pub struct EvaluationOutcome {
	/// One entry per input candidate, ordered by [`cmp_evaluated`].
	pub evaluated: Vec<EvaluatedCandidate>,
	/// Set when the scorer failed and raw scores were used instead.
	pub degraded: Option<String>,
}

pub struct ChunkEvaluator<'a> {
	scorer: &'a dyn RelevanceScorer,
	cfg: &'a sift_config::Evaluation,
	timeout: Duration,
}
impl<'a> ChunkEvaluator<'a> {
	pub fn new(
		scorer: &'a dyn RelevanceScorer,
		cfg: &'a sift_config::Evaluation,
		timeout: Duration,
	) -> Self {
		Self { scorer, cfg, timeout }
	}

	pub async fn evaluate(&self, query: &str, candidates: &[CandidateResult]) -> EvaluationOutcome {
		if candidates.is_empty() {
			return EvaluationOutcome { evaluated: Vec::new(), degraded: None };
		}

		let max_chars = self.cfg.max_candidate_chars as usize;
		let presented: Vec<ScoreCandidate> = candidates
			.iter()
			.enumerate()
			.map(|(idx, candidate)| ScoreCandidate {
				ordinal: idx + 1,
				content: sift_domain::text::truncate_chars(&candidate.content, max_chars).to_string(),
				raw_score: candidate.raw_score,
			})
			.collect();
		let result = tokio::time::timeout(self.timeout, self.scorer.score(query, &presented)).await;
		let message = match result {
			Ok(Ok(judgments)) => {
				return EvaluationOutcome {
					evaluated: apply_judgments(
						candidates,
						&judgments,
						self.cfg.missing_score_factor,
					),
					degraded: None,
				};
			},
			Ok(Err(err)) => err.to_string(),
			Err(_) => format!("Relevance scorer timed out after {} ms.", self.timeout.as_millis()),
		};

		tracing::warn!(error = %message, "Relevance scoring failed; falling back to raw scores.");

		EvaluationOutcome { evaluated: raw_score_ranking(candidates), degraded: Some(message) }
	}
}

/// Maps ordinal judgments onto `candidates`.
///
/// Ordinals outside `1..=candidates.len()` and non-finite scores are dropped. The first judgment
/// for an ordinal wins. Candidates without a judgment get `raw_score * missing_score_factor`.
pub fn apply_judgments(
	candidates: &[CandidateResult],
	judgments: &[Judgment],
	missing_score_factor: f32,
) -> Vec<EvaluatedCandidate> {
	let mut scores: Vec<Option<f32>> = vec![None; candidates.len()];

	for judgment in judgments {
		let ordinal = judgment.ordinal;

		if ordinal == 0 || ordinal > candidates.len() {
			tracing::warn!(
				ordinal,
				candidate_count = candidates.len(),
				"Dropping judgment for an unknown ordinal."
			);

			continue;
		}
		if !judgment.relevance_score.is_finite() {
			tracing::warn!(ordinal, "Dropping judgment with a non-finite score.");

			continue;
		}

		let slot = &mut scores[ordinal - 1];

		if slot.is_some() {
			tracing::warn!(ordinal, "Dropping duplicate judgment.");

			continue;
		}

		*slot = Some(clamp_score(judgment.relevance_score));
	}

	let mut evaluated: Vec<EvaluatedCandidate> = candidates
		.iter()
		.zip(scores)
		.map(|(candidate, score)| match score {
			Some(relevance_score) => EvaluatedCandidate {
				candidate: candidate.clone(),
				relevance_score,
				score_source: ScoreSource::Judge,
			},
			None => EvaluatedCandidate {
				candidate: candidate.clone(),
				relevance_score: clamp_score(candidate.raw_score * missing_score_factor),
				score_source: ScoreSource::Default,
			},
		})
		.collect();

	evaluated.sort_by(cmp_evaluated);

	evaluated
}

/// Raw-score ranking used when the scorer is unavailable.
pub fn raw_score_ranking(candidates: &[CandidateResult]) -> Vec<EvaluatedCandidate> {
	let mut evaluated: Vec<EvaluatedCandidate> = candidates
		.iter()
		.map(|candidate| EvaluatedCandidate {
			candidate: candidate.clone(),
			relevance_score: clamp_score(candidate.raw_score),
			score_source: ScoreSource::Raw,
		})
		.collect();

	evaluated.sort_by(cmp_evaluated);

	evaluated
}

/// Candidates scoring at or above `threshold`, order preserved.
pub fn filter(evaluated: &[EvaluatedCandidate], threshold: f32) -> Vec<EvaluatedCandidate> {
	evaluated
		.iter()
		.filter(|item| item.relevance_score + THRESHOLD_EPSILON >= threshold)
		.cloned()
		.collect()
}

/// Relevance desc, then raw score desc, then chunk id asc.
pub fn cmp_evaluated(a: &EvaluatedCandidate, b: &EvaluatedCandidate) -> Ordering {
	cmp_f32_desc(a.relevance_score, b.relevance_score)
		.then_with(|| cmp_f32_desc(a.candidate.raw_score, b.candidate.raw_score))
		.then_with(|| a.candidate.chunk_id.cmp(&b.candidate.chunk_id))
}

/// Raw score desc, then chunk id asc.
pub fn cmp_candidates(a: &CandidateResult, b: &CandidateResult) -> Ordering {
	cmp_f32_desc(a.raw_score, b.raw_score).then_with(|| a.chunk_id.cmp(&b.chunk_id))
}

pub fn cmp_f32_desc(a: f32, b: f32) -> Ordering {
	match (a.is_nan(), b.is_nan()) {
		(true, true) => Ordering::Equal,
		(true, false) => Ordering::Greater,
		(false, true) => Ordering::Less,
		(false, false) => b.partial_cmp(&a).unwrap_or(Ordering::Equal),
	}
}

fn clamp_score(score: f32) -> f32 {
	if score.is_finite() { score.clamp(0.0, 1.0) } else { 0.0 }
}

#[cfg(test)]
mod tests {
	use super::*;

	fn candidate(id: &str, raw_score: f32) -> CandidateResult {
		CandidateResult {
			chunk_id: id.to_string(),
			document_id: "doc".to_string(),
			content: format!("content of {id}"),
			raw_score,
			span: None,
		}
	}

	fn judgment(ordinal: usize, relevance_score: f32) -> Judgment {
		Judgment { ordinal, relevance_score, rationale: None }
	}

	#[test]
	fn drops_unknown_ordinals_and_keeps_every_candidate() {
		let candidates: Vec<_> =
			(1..=5).map(|i| candidate(&format!("c{i}"), 0.5)).collect();
		let judgments = vec![judgment(7, 0.99), judgment(0, 0.99), judgment(2, 0.8)];
		let evaluated = apply_judgments(&candidates, &judgments, 0.9);

		assert_eq!(evaluated.len(), 5);
		assert_eq!(evaluated[0].candidate.chunk_id, "c2");
		assert_eq!(evaluated[0].score_source, ScoreSource::Judge);
		assert!(evaluated[1..].iter().all(|item| item.score_source == ScoreSource::Default));
		assert!(evaluated[1..].iter().all(|item| (item.relevance_score - 0.45).abs() < 1e-6));
	}

	#[test]
	fn first_judgment_wins_and_scores_are_clamped() {
		let candidates = vec![candidate("a", 0.3), candidate("b", 0.3)];
		let judgments =
			vec![judgment(1, 1.7), judgment(1, 0.1), judgment(2, f32::NAN), judgment(2, -0.5)];
		let evaluated = apply_judgments(&candidates, &judgments, 0.9);
		let a = evaluated.iter().find(|item| item.candidate.chunk_id == "a").expect("a");
		let b = evaluated.iter().find(|item| item.candidate.chunk_id == "b").expect("b");

		assert_eq!(a.relevance_score, 1.0);
		assert_eq!(b.relevance_score, 0.0);
		assert_eq!(b.score_source, ScoreSource::Judge);
	}

	#[test]
	fn ties_break_on_raw_score_then_chunk_id() {
		let candidates = vec![candidate("b", 0.4), candidate("a", 0.4), candidate("c", 0.6)];
		let judgments = vec![judgment(1, 0.5), judgment(2, 0.5), judgment(3, 0.5)];
		let order: Vec<String> = apply_judgments(&candidates, &judgments, 0.9)
			.into_iter()
			.map(|item| item.candidate.chunk_id)
			.collect();

		assert_eq!(order, vec!["c", "a", "b"]);
	}

	#[test]
	fn filter_matches_stepped_thresholds() {
		let evaluated = raw_score_ranking(&[candidate("a", 0.6), candidate("b", 0.59)]);
		let threshold = 0.7_f32 - 0.1;

		assert_eq!(filter(&evaluated, threshold).len(), 1);
	}

	#[test]
	fn nan_sorts_last() {
		assert_eq!(cmp_f32_desc(f32::NAN, 0.1), Ordering::Greater);
		assert_eq!(cmp_f32_desc(0.9, 0.1), Ordering::Less);
	}
}
