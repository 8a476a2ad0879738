use std::sync::Arc;

use axum::{
	Router,
	body::{self, Body},
	http::{Request, StatusCode},
};
use serde_json::Value;
use tower::util::ServiceExt;

use sift_api::{routes, state::AppState};
use sift_config::Config;
use sift_service::PassthroughScorer;
use sift_testkit::{Behavior, InMemoryIndex, candidate, collaborators, test_config};

fn state_with(cfg: Config, index: InMemoryIndex) -> AppState {
	let service =
		sift_testkit::service(cfg, collaborators(Arc::new(index), Arc::new(PassthroughScorer)));

	AppState::from_service(service)
}

fn default_state() -> AppState {
	state_with(
		test_config(),
		InMemoryIndex::new(vec![
			candidate("c1", "doc-a", "Stabilium is a corrosion-resistant alloy.", 0.9),
			candidate("c2", "doc-b", "Stabilium melts at 1,450 degrees.", 0.8),
			candidate("c3", "doc-b", "Stabilium is produced in two plants.", 0.75),
		]),
	)
}

fn post_json(uri: &str, payload: &Value, bearer: Option<&str>) -> Request<Body> {
	let mut builder =
		Request::builder().method("POST").uri(uri).header("content-type", "application/json");

	if let Some(token) = bearer {
		builder = builder.header("authorization", format!("Bearer {token}"));
	}

	builder.body(Body::from(payload.to_string())).expect("Failed to build request.")
}

async fn call(app: Router, request: Request<Body>) -> (StatusCode, Value) {
	let response = app.oneshot(request).await.expect("Failed to call router.");
	let status = response.status();
	let body = body::to_bytes(response.into_body(), usize::MAX)
		.await
		.expect("Failed to read response body.");
	let json = if body.is_empty() {
		Value::Null
	} else {
		serde_json::from_slice(&body).expect("Failed to parse response.")
	};

	(status, json)
}

#[tokio::test]
async fn health_ok() {
	let app = routes::router(default_state());
	let (status, _) = call(
		app,
		Request::builder().uri("/health").body(Body::empty()).expect("Failed to build request."),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn retrieve_returns_bundle_citations_and_diagnostics() {
	let app = routes::router(default_state());
	let payload = serde_json::json!({ "query": "What is Stabilium?" });
	let (status, json) = call(app, post_json("/v1/retrieve", &payload, None)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["context_bundle"]["included_chunk_ids"], serde_json::json!(["c1", "c2", "c3"]));
	assert_eq!(json["citations"][0]["index"], 1);
	assert_eq!(json["citations"][0]["chunk_id"], "c1");
	assert_eq!(json["diagnostics"]["state"], "done");
	assert_eq!(json["diagnostics"]["complexity"], "simple");
}

#[tokio::test]
async fn retrieve_applies_document_filters() {
	let app = routes::router(default_state());
	let payload = serde_json::json!({
		"query": "What is Stabilium?",
		"filters": { "document_ids": ["doc-b"] }
	});
	let (status, json) = call(app, post_json("/v1/retrieve", &payload, None)).await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["context_bundle"]["included_chunk_ids"], serde_json::json!(["c2", "c3"]));
}

#[tokio::test]
async fn blank_query_is_bad_request() {
	let app = routes::router(default_state());
	let payload = serde_json::json!({ "query": "  " });
	let (status, json) = call(app, post_json("/v1/retrieve", &payload, None)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
	assert!(json.get("partial").is_none());
}

#[tokio::test]
async fn unavailable_index_returns_partial_with_failed_state() {
	let state = state_with(
		test_config(),
		InMemoryIndex::new(Vec::new()).with_behavior(Behavior::Fail("index offline".into())),
	);
	let app = routes::router(state);
	let payload = serde_json::json!({ "query": "What is Stabilium?" });
	let (status, json) = call(app, post_json("/v1/retrieve", &payload, None)).await;

	assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
	assert_eq!(json["error_code"], "RETRIEVAL_UNAVAILABLE");
	assert_eq!(json["partial"]["diagnostics"]["state"], "failed");
	assert_eq!(json["partial"]["context_bundle"]["text"], "");
}

#[tokio::test]
async fn configured_token_is_required() {
	let mut cfg = test_config();

	cfg.security.api_auth_token = Some("s3cret".to_string());

	let state = state_with(
		cfg,
		InMemoryIndex::new(vec![candidate("c1", "doc", "Stabilium datasheet.", 0.9)]),
	);
	let payload = serde_json::json!({ "query": "What is Stabilium?" });
	let (missing, json) =
		call(routes::router(state.clone()), post_json("/v1/retrieve", &payload, None)).await;

	assert_eq!(missing, StatusCode::UNAUTHORIZED);
	assert_eq!(json["error_code"], "UNAUTHORIZED");

	let (wrong, _) =
		call(routes::router(state.clone()), post_json("/v1/retrieve", &payload, Some("nope")))
			.await;

	assert_eq!(wrong, StatusCode::UNAUTHORIZED);

	let (ok, _) =
		call(routes::router(state), post_json("/v1/retrieve", &payload, Some("s3cret"))).await;

	assert_eq!(ok, StatusCode::OK);
}

#[tokio::test]
async fn admin_bumps_corpus_version() {
	let state = default_state();
	let payload = serde_json::json!({ "corpus_version": "2026-10-16" });
	let (status, json) = call(
		routes::admin_router(state.clone()),
		post_json("/v1/admin/corpus_version", &payload, None),
	)
	.await;

	assert_eq!(status, StatusCode::OK);
	assert_eq!(json["corpus_version"], "2026-10-16");
	assert_eq!(state.service.corpus_version(), "2026-10-16");

	let blank = serde_json::json!({ "corpus_version": " " });
	let (status, json) =
		call(routes::admin_router(state), post_json("/v1/admin/corpus_version", &blank, None)).await;

	assert_eq!(status, StatusCode::BAD_REQUEST);
	assert_eq!(json["error_code"], "INVALID_REQUEST");
}
