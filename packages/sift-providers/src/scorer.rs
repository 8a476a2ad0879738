//! LLM relevance judge over an ordinal-numbered candidate list.
//!
//! The model only ever sees ordinals, never chunk ids. Mapping ordinals back to chunks, and
//! dropping ordinals that do not exist, is the caller's job.

use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You judge how well numbered passages answer a search query. \
Respond with JSON only: {\"judgments\": [{\"ordinal\": <passage number>, \"relevance_score\": \
<number between 0 and 1>, \"rationale\": <short string>}]}. Include every passage once.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreCandidate {
	/// 1-based presentation order.
	pub ordinal: usize,
	pub content: String,
	/// Vector similarity. Kept out of the prompt.
	#[serde(skip)]
	pub raw_score: f32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Judgment {
	pub ordinal: usize,
	pub relevance_score: f32,
	pub rationale: Option<String>,
}

pub async fn score(
	cfg: &sift_config::LlmProviderConfig,
	query: &str,
	candidates: &[ScoreCandidate],
) -> Result<Vec<Judgment>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let user = serde_json::json!({
		"query": query,
		"passages": candidates,
	});
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": user.to_string() },
		],
	});

	for attempt in 1..=3 {
		let res = client
			.post(&url)
			.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
			.json(&body)
			.send()
			.await?;
		let json: Value = res.error_for_status()?.json().await?;

		match parse_judgments(&json) {
			Ok(judgments) => return Ok(judgments),
			Err(err) => {
				tracing::warn!(error = %err, attempt, "Judge response is not usable JSON.");
			},
		}
	}

	Err(eyre::eyre!("Judge response is not valid JSON."))
}

/// Accepts `{"judgments": [...]}`, `{"results": [...]}` or a bare array, either as chat-completion
/// content or as the response body itself. Items that cannot be read are skipped.
pub fn parse_judgments(json: &Value) -> Result<Vec<Judgment>> {
	let body = match crate::chat_content(json) {
		Some(content) => serde_json::from_str::<Value>(strip_code_fence(content))
			.map_err(|_| eyre::eyre!("Judge content is not valid JSON."))?,
		None => json.clone(),
	};
	let items = match &body {
		Value::Array(items) => items,
		Value::Object(map) => map
			.get("judgments")
			.or_else(|| map.get("results"))
			.and_then(|v| v.as_array())
			.ok_or_else(|| eyre::eyre!("Judge JSON is missing a judgments array."))?,
		_ => return Err(eyre::eyre!("Judge JSON must be an object or an array.")),
	};
	let mut out = Vec::with_capacity(items.len());

	for item in items {
		let ordinal = item.get("ordinal").or_else(|| item.get("index")).and_then(as_ordinal);
		let score = item.get("relevance_score").or_else(|| item.get("score")).and_then(as_score);
		let (Some(ordinal), Some(relevance_score)) = (ordinal, score) else {
			tracing::warn!(item = %item, "Skipping unreadable judgment.");

			continue;
		};
		let rationale = item.get("rationale").and_then(|v| v.as_str()).map(str::to_string);

		out.push(Judgment { ordinal, relevance_score, rationale });
	}

	Ok(out)
}

fn as_ordinal(value: &Value) -> Option<usize> {
	match value {
		Value::Number(number) => number.as_u64().map(|v| v as usize),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn as_score(value: &Value) -> Option<f32> {
	match value {
		Value::Number(number) => number.as_f64().map(|v| v as f32),
		Value::String(text) => text.trim().parse().ok(),
		_ => None,
	}
}

fn strip_code_fence(content: &str) -> &str {
	let trimmed = content.trim();
	let Some(rest) = trimmed.strip_prefix("```") else {
		return trimmed;
	};
	let rest = rest.strip_prefix("json").unwrap_or(rest);

	rest.strip_suffix("```").unwrap_or(rest).trim()
}
