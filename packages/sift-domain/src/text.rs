use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

const STOPWORDS: &[&str] = &[
	"a", "about", "an", "and", "are", "as", "at", "be", "by", "can", "could", "do", "does",
	"explain", "for", "from", "how", "i", "in", "is", "it", "me", "of", "on", "or", "please",
	"tell", "that", "the", "this", "to", "was", "what", "when", "where", "which", "who", "why",
	"will", "with", "would",
];

/// A whitespace-delimited token split into its leading punctuation, core, and trailing
/// punctuation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenParts {
	pub prefix: String,
	pub core: String,
	pub suffix: String,
}
impl TokenParts {
	pub fn parse(raw: &str) -> Self {
		let start = raw.find(|ch: char| ch.is_alphanumeric()).unwrap_or(raw.len());
		let end = raw
			.char_indices()
			.rev()
			.find(|(_, ch)| ch.is_alphanumeric())
			.map(|(idx, ch)| idx + ch.len_utf8())
			.unwrap_or(start)
			.max(start);

		Self {
			prefix: raw[..start].to_string(),
			core: raw[start..end].to_string(),
			suffix: raw[end..].to_string(),
		}
	}

	pub fn render(&self) -> String {
		format!("{}{}{}", self.prefix, self.core, self.suffix)
	}
}

/// Unicode word tokens, in order.
pub fn word_tokens(text: &str) -> Vec<&str> {
	text.unicode_words().collect()
}

/// Strips punctuation surrounding a token, keeping inner characters like apostrophes.
pub fn strip_punctuation(token: &str) -> &str {
	token.trim_matches(|ch: char| !ch.is_alphanumeric())
}

pub fn starts_uppercase(token: &str) -> bool {
	token.chars().next().map(char::is_uppercase).unwrap_or(false)
}

pub fn is_stopword(token: &str) -> bool {
	let lowered = token.to_lowercase();

	STOPWORDS.binary_search(&lowered.as_str()).is_ok()
}

/// True when the text carries no content word at all.
pub fn is_empty_or_stopwords(text: &str) -> bool {
	word_tokens(text).into_iter().all(is_stopword)
}

/// Cache-key normalization: NFKC, lowercase, collapsed whitespace.
pub fn normalize_query(query: &str) -> String {
	let normalized: String = query.nfkc().collect();
	let lowered = normalized.to_lowercase();

	lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Cuts `text` to at most `max_chars` characters on a char boundary.
pub fn truncate_chars(text: &str, max_chars: usize) -> &str {
	match text.char_indices().nth(max_chars) {
		Some((idx, _)) => &text[..idx],
		None => text,
	}
}
