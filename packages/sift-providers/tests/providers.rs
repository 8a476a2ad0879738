use reqwest::header::{AUTHORIZATION, HeaderName};
use serde_json::{Map, Value};

#[test]
fn builds_bearer_auth_header() {
	let headers =
		sift_providers::auth_headers("secret", &Map::new()).expect("Failed to build headers.");
	let value = headers.get(AUTHORIZATION).expect("Missing authorization header.");

	assert_eq!(value, "Bearer secret");
}

#[test]
fn copies_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-tenant".to_string(), Value::String("docs".to_string()));

	let headers =
		sift_providers::auth_headers("secret", &defaults).expect("Failed to build headers.");

	assert_eq!(
		headers.get(HeaderName::from_static("x-tenant")).expect("Missing default header."),
		"docs"
	);
}

#[test]
fn rejects_non_string_default_headers() {
	let mut defaults = Map::new();

	defaults.insert("x-retries".to_string(), Value::from(3));

	assert!(sift_providers::auth_headers("secret", &defaults).is_err());
}

#[test]
fn chat_content_reads_first_choice() {
	let json = serde_json::json!({
		"choices": [
			{ "message": { "content": "first" } },
			{ "message": { "content": "second" } }
		]
	});

	assert_eq!(sift_providers::chat_content(&json), Some("first"));
	assert_eq!(sift_providers::chat_content(&serde_json::json!({})), None);
}
