use std::collections::{HashMap, HashSet};

use crate::types::{ChunkSpan, Citation, ContextBundle, EvaluatedCandidate};

const SECTION_SEPARATOR: &str = "\n\n";

struct Section<'a> {
	item: &'a EvaluatedCandidate,
	content: String,
}

/// Packs `selected` (already in ranking order) into a bounded context and its citations.
///
/// Chunks repeating an included chunk id or content hash are skipped, as are chunks whose span
/// lies inside an included span of the same document. A chunk overlapping the tail of an
/// included span contributes only the uncovered suffix.
pub fn assemble(
	selected: &[EvaluatedCandidate],
	cfg: &sift_config::Assembly,
) -> (ContextBundle, Vec<Citation>) {
	let budget = cfg.max_context_chars as usize;
	let mut seen_ids = HashSet::new();
	let mut seen_hashes = HashSet::new();
	let mut spans: HashMap<&str, Vec<ChunkSpan>> = HashMap::new();
	let mut included: Vec<Section<'_>> = Vec::new();
	let mut first_fit: Option<&EvaluatedCandidate> = None;
	let mut text = String::new();
	let mut used = 0_usize;

	for item in selected {
		let candidate = &item.candidate;

		if !seen_ids.insert(candidate.chunk_id.as_str()) {
			continue;
		}

		let hash = blake3::hash(candidate.content.trim().as_bytes());

		if seen_hashes.contains(&hash) {
			continue;
		}

		let doc_spans =
			spans.get(candidate.document_id.as_str()).map(Vec::as_slice).unwrap_or(&[]);
		let Some((content, span)) =
			uncovered_content(&candidate.content, candidate.span, doc_spans)
		else {
			tracing::debug!(
				chunk_id = %candidate.chunk_id,
				"Skipping chunk covered by an included span."
			);

			continue;
		};

		if first_fit.is_none() {
			first_fit = Some(item);
		}

		let section = format!("[{}] {}", included.len() + 1, content);
		let separator = if included.is_empty() { "" } else { SECTION_SEPARATOR };
		let cost = separator.chars().count() + section.chars().count();

		if used + cost > budget {
			continue;
		}

		text.push_str(separator);
		text.push_str(&section);
		used += cost;
		seen_hashes.insert(hash);

		if let Some(span) = span {
			spans.entry(candidate.document_id.as_str()).or_default().push(span);
		}

		included.push(Section { item, content });
	}

	// Nothing fit the budget. Truncate the best chunk rather than return an empty bundle.
	if included.is_empty()
		&& let Some(item) = first_fit
	{
		let prefix = "[1] ";
		let room = budget.saturating_sub(prefix.chars().count());
		let content =
			sift_domain::text::truncate_chars(&item.candidate.content, room).to_string();

		text = format!("{prefix}{content}");
		included.push(Section { item, content });
	}

	let citations = included
		.iter()
		.enumerate()
		.map(|(idx, section)| Citation {
			index: idx + 1,
			chunk_id: section.item.candidate.chunk_id.clone(),
			document_id: section.item.candidate.document_id.clone(),
			excerpt: excerpt(&section.content, cfg.excerpt_chars as usize),
			score: section.item.relevance_score,
		})
		.collect();
	let bundle = ContextBundle {
		total_chars: text.chars().count(),
		text,
		included_chunk_ids: included
			.iter()
			.map(|section| section.item.candidate.chunk_id.clone())
			.collect(),
	};

	(bundle, citations)
}

/// Drops candidates that repeat an earlier chunk id or content hash, or whose span lies inside
/// an earlier span of the same document. Order is preserved.
pub fn distinct(evaluated: &[EvaluatedCandidate]) -> Vec<EvaluatedCandidate> {
	let mut seen_ids = HashSet::new();
	let mut seen_hashes = HashSet::new();
	let mut spans: HashMap<&str, Vec<ChunkSpan>> = HashMap::new();
	let mut out = Vec::new();

	for item in evaluated {
		let candidate = &item.candidate;

		if seen_ids.contains(candidate.chunk_id.as_str()) {
			continue;
		}

		let hash = blake3::hash(candidate.content.trim().as_bytes());

		if seen_hashes.contains(&hash) {
			continue;
		}

		let doc_spans = spans.entry(candidate.document_id.as_str()).or_default();

		if let Some(span) = candidate.span {
			if doc_spans.iter().any(|other| other.contains(&span)) {
				continue;
			}

			doc_spans.push(span);
		}

		seen_ids.insert(candidate.chunk_id.as_str());
		seen_hashes.insert(hash);
		out.push(item.clone());
	}

	out
}

/// Content left after removing what `included` already covers, with its effective span.
/// `None` means the chunk is fully covered.
fn uncovered_content(
	content: &str,
	span: Option<ChunkSpan>,
	included: &[ChunkSpan],
) -> Option<(String, Option<ChunkSpan>)> {
	let Some(span) = span else {
		return Some((content.to_string(), None));
	};

	if included.iter().any(|other| other.contains(&span)) {
		return None;
	}

	let covered_until = included
		.iter()
		.filter(|other| other.start <= span.start && other.end > span.start)
		.map(|other| other.end)
		.max();
	let Some(covered_until) = covered_until else {
		return Some((content.to_string(), Some(span)));
	};
	let char_count = content.chars().count() as u64;

	// Offsets only map onto content when the chunk text is the verbatim source window.
	if char_count != span.end - span.start {
		return Some((content.to_string(), Some(span)));
	}

	let skip = (covered_until - span.start) as usize;
	let suffix: String = content.chars().skip(skip).collect();

	Some((suffix, Some(ChunkSpan { start: covered_until, end: span.end })))
}

/// First `max_chars` characters with whitespace collapsed, marked with `…` when cut.
pub fn excerpt(content: &str, max_chars: usize) -> String {
	let collapsed = content.split_whitespace().collect::<Vec<_>>().join(" ");

	if collapsed.chars().count() <= max_chars {
		return collapsed;
	}

	let mut out = sift_domain::text::truncate_chars(&collapsed, max_chars).trim_end().to_string();

	out.push('…');

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::types::{CandidateResult, ScoreSource};

	fn item(id: &str, doc: &str, content: &str, span: Option<(u64, u64)>) -> EvaluatedCandidate {
		EvaluatedCandidate {
			candidate: CandidateResult {
				chunk_id: id.to_string(),
				document_id: doc.to_string(),
				content: content.to_string(),
				raw_score: 0.8,
				span: span.map(|(start, end)| ChunkSpan { start, end }),
			},
			relevance_score: 0.8,
			score_source: ScoreSource::Judge,
		}
	}

	fn cfg(max_context_chars: u32) -> sift_config::Assembly {
		sift_config::Assembly { max_context_chars, excerpt_chars: 240 }
	}

	#[test]
	fn empty_selection_yields_empty_bundle() {
		let (bundle, citations) = assemble(&[], &cfg(100));

		assert_eq!(bundle, ContextBundle::default());
		assert!(citations.is_empty());
	}

	#[test]
	fn numbers_sections_and_citations_in_inclusion_order() {
		let selected = vec![item("b", "d1", "beta", None), item("a", "d2", "alpha", None)];
		let (bundle, citations) = assemble(&selected, &cfg(100));

		assert_eq!(bundle.text, "[1] beta\n\n[2] alpha");
		assert_eq!(bundle.included_chunk_ids, vec!["b", "a"]);
		assert_eq!(bundle.total_chars, bundle.text.chars().count());
		assert_eq!(citations[1].index, 2);
		assert_eq!(citations[1].chunk_id, "a");
	}

	#[test]
	fn duplicate_ids_and_content_are_collapsed() {
		let selected = vec![
			item("a", "d1", "same text", None),
			item("a", "d1", "other", None),
			item("b", "d2", "  same text ", None),
			item("c", "d3", "fresh", None),
		];
		let (bundle, _) = assemble(&selected, &cfg(100));

		assert_eq!(bundle.included_chunk_ids, vec!["a", "c"]);
	}

	#[test]
	fn contained_span_is_skipped_and_tail_overlap_is_trimmed() {
		let selected = vec![
			item("a", "d1", "0123456789", Some((0, 10))),
			item("b", "d1", "2345", Some((2, 6))),
			item("c", "d1", "89ABCD", Some((8, 14))),
			item("d", "d2", "2345", Some((2, 6))),
		];
		let (bundle, citations) = assemble(&selected, &cfg(200));

		assert_eq!(bundle.included_chunk_ids, vec!["a", "c", "d"]);
		assert_eq!(bundle.text, "[1] 0123456789\n\n[2] ABCD\n\n[3] 2345");
		assert_eq!(citations[1].excerpt, "ABCD");
	}

	#[test]
	fn oversize_section_is_skipped_for_a_smaller_one() {
		let long = "x".repeat(50);
		let selected = vec![
			item("a", "d1", "short", None),
			item("b", "d2", &long, None),
			item("c", "d3", "tiny", None),
		];
		let (bundle, _) = assemble(&selected, &cfg(30));

		assert_eq!(bundle.included_chunk_ids, vec!["a", "c"]);
		assert!(bundle.total_chars <= 30);
	}

	#[test]
	fn truncates_first_chunk_when_nothing_fits() {
		let long = "y".repeat(80);
		let selected = vec![item("a", "d1", &long, None)];
		let (bundle, citations) = assemble(&selected, &cfg(20));

		assert_eq!(bundle.included_chunk_ids, vec!["a"]);
		assert_eq!(bundle.total_chars, 20);
		assert_eq!(citations.len(), 1);
	}

	#[test]
	fn distinct_keeps_first_of_each_duplicate() {
		let selected = vec![
			item("a", "d1", "same text", Some((0, 9))),
			item("b", "d1", "same text", None),
			item("c", "d1", "inner", Some((2, 7))),
			item("a", "d2", "other", None),
			item("d", "d2", "fresh", Some((2, 7))),
		];
		let ids: Vec<String> =
			distinct(&selected).into_iter().map(|item| item.candidate.chunk_id).collect();

		assert_eq!(ids, vec!["a", "d"]);
	}

	#[test]
	fn excerpt_collapses_whitespace_and_marks_cuts() {
		assert_eq!(excerpt("a  b\n c", 10), "a b c");
		assert_eq!(excerpt("alpha beta gamma", 10), "alpha beta…");
	}
}
