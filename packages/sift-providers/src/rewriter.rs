use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

const SYSTEM_PROMPT: &str = "You rewrite search queries for a document retrieval system. \
Return only the rewritten query on a single line. Keep every proper noun, product name and \
identifier exactly as written. Do not answer the question.";

/// Asks the chat model for a single rewritten query. The result is unvalidated.
pub async fn rewrite(cfg: &sift_config::LlmProviderConfig, query: &str) -> Result<String> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"temperature": cfg.temperature,
		"messages": [
			{ "role": "system", "content": SYSTEM_PROMPT },
			{ "role": "user", "content": query },
		],
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;

	parse_rewrite(&json)
}

fn parse_rewrite(json: &Value) -> Result<String> {
	let content = crate::chat_content(json)
		.ok_or_else(|| eyre::eyre!("Rewriter response is missing message content."))?;
	// Some models wrap the answer in JSON even when told not to.
	let text = match serde_json::from_str::<Value>(content) {
		Ok(Value::Object(map)) => map
			.get("query")
			.and_then(|v| v.as_str())
			.map(str::to_string)
			.ok_or_else(|| eyre::eyre!("Rewriter JSON content has no query field."))?,
		_ => content.to_string(),
	};
	let line = text.lines().map(str::trim).find(|line| !line.is_empty()).unwrap_or_default();

	Ok(line.trim_matches(|ch| ch == '"' || ch == '\'' || ch == '`').trim().to_string())
}
