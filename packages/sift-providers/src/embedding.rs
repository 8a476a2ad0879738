use std::time::Duration;

use color_eyre::{Result, eyre};
use reqwest::Client;
use serde_json::Value;

/// Embeds a single query string and checks the vector against the configured dimensions.
pub async fn embed_query(cfg: &sift_config::EmbeddingProviderConfig, text: &str) -> Result<Vec<f32>> {
	let client = Client::builder().timeout(Duration::from_millis(cfg.timeout_ms)).build()?;
	let url = format!("{}{}", cfg.api_base, cfg.path);
	let body = serde_json::json!({
		"model": cfg.model,
		"input": [text],
		"dimensions": cfg.dimensions,
	});
	let res = client
		.post(url)
		.headers(crate::auth_headers(&cfg.api_key, &cfg.default_headers)?)
		.json(&body)
		.send()
		.await?;
	let json: Value = res.error_for_status()?.json().await?;
	let vector = parse_first_embedding(&json)?;

	if vector.len() != cfg.dimensions as usize {
		return Err(eyre::eyre!(
			"Embedding has {} dimensions but {} were configured.",
			vector.len(),
			cfg.dimensions
		));
	}

	Ok(vector)
}

fn parse_first_embedding(json: &Value) -> Result<Vec<f32>> {
	let data = json
		.get("data")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding response is missing data array."))?;
	let item = data
		.iter()
		.find(|item| item.get("index").and_then(|v| v.as_u64()).unwrap_or(0) == 0)
		.ok_or_else(|| eyre::eyre!("Embedding response has no item for the query."))?;
	let values = item
		.get("embedding")
		.and_then(|v| v.as_array())
		.ok_or_else(|| eyre::eyre!("Embedding item missing embedding array."))?;

	values
		.iter()
		.map(|value| {
			value
				.as_f64()
				.map(|number| number as f32)
				.ok_or_else(|| eyre::eyre!("Embedding value must be numeric."))
		})
		.collect()
}
