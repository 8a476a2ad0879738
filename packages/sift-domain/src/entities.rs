//! Key-entity preservation for rewritten queries.
//!
//! A key entity is a token of the original query that starts with an uppercase letter and is at
//! least `min_entity_chars` long once surrounding punctuation is stripped. A rewritten query is
//! accepted only when every key entity appears in it as a whole token; near-miss spellings are
//! repaired first and entities with no plausible counterpart are appended.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::{
	similarity::normalized_similarity,
	text::{self, TokenParts},
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefinedQuery {
	pub text: String,
	pub entities_preserved: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EntityRepair {
	pub entity: String,
	pub replaced: String,
	pub token_index: usize,
	pub similarity: f32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum RefinementRejection {
	/// The rewrite carried no content word.
	Empty,
	/// Entities still missing after repair.
	EntityCorruption { missing: Vec<String> },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RepairOutcome {
	pub text: String,
	pub repairs: Vec<EntityRepair>,
	pub appended: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RefinementReport {
	/// The query to use: the repaired rewrite when accepted, otherwise the original verbatim.
	pub refined: RefinedQuery,
	pub key_entities: Vec<String>,
	pub repairs: Vec<EntityRepair>,
	pub appended: Vec<String>,
	pub rejection: Option<RefinementRejection>,
}
impl RefinementReport {
	pub fn accepted(&self) -> bool {
		self.rejection.is_none()
	}
}

/// Key entities of `query` in order of first appearance, deduplicated.
pub fn extract_key_entities(query: &str, min_chars: usize) -> Vec<String> {
	let mut seen = HashSet::new();
	let mut out = Vec::new();

	for raw in query.split_whitespace() {
		let token = text::strip_punctuation(raw);

		if token.chars().count() < min_chars || !text::starts_uppercase(token) {
			continue;
		}
		if seen.insert(token) {
			out.push(token.to_string());
		}
	}

	out
}

/// Restores the original query's key entities inside `candidate`.
///
/// Each entity claims at most one candidate token: an exact token is pinned first, otherwise the
/// first unclaimed token whose similarity falls in `[similarity_threshold, 1.0)` is overwritten
/// with the entity. Entities with no unclaimed token at or above `presence_threshold` are
/// appended.
pub fn repair_entities(
	original: &str,
	candidate: &str,
	cfg: &sift_config::Entities,
) -> RepairOutcome {
	let entities = extract_key_entities(original, cfg.min_entity_chars as usize);
	let mut tokens: Vec<TokenParts> =
		candidate.split_whitespace().map(TokenParts::parse).collect();
	let mut claimed: HashSet<usize> = HashSet::new();
	let mut pending = Vec::new();

	for entity in &entities {
		let exact = tokens
			.iter()
			.enumerate()
			.find(|(idx, token)| !claimed.contains(idx) && token.core == *entity)
			.map(|(idx, _)| idx);

		match exact {
			Some(idx) => {
				claimed.insert(idx);
			},
			None => pending.push(entity),
		}
	}

	let mut repairs = Vec::new();
	let mut unresolved = Vec::new();

	for entity in pending {
		let near = tokens.iter().enumerate().find_map(|(idx, token)| {
			if claimed.contains(&idx) || token.core.is_empty() || token.core == *entity {
				return None;
			}

			let similarity = normalized_similarity(&token.core, entity);

			(similarity >= cfg.similarity_threshold).then_some((idx, similarity))
		});

		match near {
			Some((idx, similarity)) => {
				let replaced = std::mem::replace(&mut tokens[idx].core, entity.clone());

				claimed.insert(idx);
				repairs.push(EntityRepair {
					entity: entity.clone(),
					replaced,
					token_index: idx,
					similarity,
				});
			},
			None => unresolved.push(entity),
		}
	}

	let mut text = tokens.iter().map(TokenParts::render).collect::<Vec<_>>().join(" ");
	let mut appended = Vec::new();

	for entity in unresolved {
		let present = tokens.iter().enumerate().any(|(idx, token)| {
			!claimed.contains(&idx)
				&& !token.core.is_empty()
				&& normalized_similarity(&token.core, entity) >= cfg.presence_threshold
		});

		if present {
			continue;
		}
		if !text.is_empty() {
			text.push(' ');
		}

		text.push_str(entity);
		appended.push(entity.clone());
	}

	RepairOutcome { text, repairs, appended }
}

/// Repairs `candidate` and decides whether it may replace `original`.
pub fn validate_refinement(
	original: &str,
	candidate: &str,
	cfg: &sift_config::Entities,
) -> RefinementReport {
	let key_entities = extract_key_entities(original, cfg.min_entity_chars as usize);
	let outcome = repair_entities(original, candidate, cfg);

	if text::is_empty_or_stopwords(&outcome.text) {
		return rejected(original, key_entities, outcome, RefinementRejection::Empty);
	}

	let missing: Vec<String> = key_entities
		.iter()
		.filter(|entity| !contains_token(&outcome.text, entity))
		.cloned()
		.collect();

	if !missing.is_empty() {
		return rejected(
			original,
			key_entities,
			outcome,
			RefinementRejection::EntityCorruption { missing },
		);
	}

	RefinementReport {
		refined: RefinedQuery { text: outcome.text.trim().to_string(), entities_preserved: true },
		key_entities,
		repairs: outcome.repairs,
		appended: outcome.appended,
		rejection: None,
	}
}

/// Whether some whitespace token of `text`, minus surrounding punctuation, equals `entity`.
pub fn contains_token(text: &str, entity: &str) -> bool {
	text.split_whitespace().any(|raw| TokenParts::parse(raw).core == entity)
}

fn rejected(
	original: &str,
	key_entities: Vec<String>,
	outcome: RepairOutcome,
	rejection: RefinementRejection,
) -> RefinementReport {
	RefinementReport {
		refined: RefinedQuery { text: original.to_string(), entities_preserved: false },
		key_entities,
		repairs: outcome.repairs,
		appended: outcome.appended,
		rejection: Some(rejection),
	}
}
