/// Levenshtein edit distance over chars.
pub fn levenshtein(a: &str, b: &str) -> usize {
	let a: Vec<char> = a.chars().collect();
	let b: Vec<char> = b.chars().collect();

	if a.is_empty() {
		return b.len();
	}
	if b.is_empty() {
		return a.len();
	}

	let mut prev: Vec<usize> = (0..=b.len()).collect();
	let mut curr = vec![0_usize; b.len() + 1];

	for (i, ca) in a.iter().enumerate() {
		curr[0] = i + 1;

		for (j, cb) in b.iter().enumerate() {
			let cost = usize::from(ca != cb);

			curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
		}

		std::mem::swap(&mut prev, &mut curr);
	}

	prev[b.len()]
}

/// Case-insensitive similarity in `[0, 1]`: `1 - distance / longest length`.
pub fn normalized_similarity(a: &str, b: &str) -> f32 {
	let a = a.to_lowercase();
	let b = b.to_lowercase();
	let max_len = a.chars().count().max(b.chars().count());

	if max_len == 0 {
		return 1.0;
	}

	let dist = levenshtein(&a, &b);

	(1.0 - dist as f32 / max_len as f32).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn distance_counts_single_edits() {
		assert_eq!(levenshtein("kitten", "sitting"), 3);
		assert_eq!(levenshtein("", "abc"), 3);
		assert_eq!(levenshtein("same", "same"), 0);
	}

	#[test]
	fn one_dropped_letter_stays_in_typo_band() {
		let score = normalized_similarity("Stabilium", "Stabilim");

		assert!(score >= 0.75 && score < 1.0, "score = {score}");
	}

	#[test]
	fn case_only_difference_is_identical() {
		assert!((normalized_similarity("Qdrant", "qdrant") - 1.0).abs() < f32::EPSILON);
	}

	#[test]
	fn unrelated_words_score_low() {
		assert!(normalized_similarity("Stabilium", "Explain") < 0.5);
	}
}
