use axum::{
	Json, Router,
	extract::State,
	http::{HeaderMap, StatusCode, header},
	response::{IntoResponse, Response},
	routing::{get, post},
};
use serde::{Deserialize, Serialize};

use sift_service::{Error as ServiceError, RetrievalRequest, RetrievalResponse};

use crate::state::AppState;

pub fn router(state: AppState) -> Router {
	Router::new()
		.route("/health", get(health))
		.route("/v1/retrieve", post(retrieve))
		.with_state(state)
}

pub fn admin_router(state: AppState) -> Router {
	Router::new()
		.route("/v1/admin/corpus_version", get(corpus_version).post(set_corpus_version))
		.with_state(state)
}

async fn health() -> StatusCode {
	StatusCode::OK
}

async fn retrieve(
	State(state): State<AppState>,
	headers: HeaderMap,
	Json(payload): Json<RetrievalRequest>,
) -> Result<Json<RetrievalResponse>, ApiError> {
	authorize(&state, &headers)?;

	let response = state.service.process(&payload.query, &payload.filters).await?;

	Ok(Json(response))
}

#[derive(Debug, Serialize, Deserialize)]
pub struct CorpusVersionBody {
	pub corpus_version: String,
}

async fn corpus_version(State(state): State<AppState>) -> Json<CorpusVersionBody> {
	Json(CorpusVersionBody { corpus_version: state.service.corpus_version() })
}

async fn set_corpus_version(
	State(state): State<AppState>,
	Json(payload): Json<CorpusVersionBody>,
) -> Result<Json<CorpusVersionBody>, ApiError> {
	state.service.set_corpus_version(&payload.corpus_version)?;

	tracing::info!(corpus_version = %state.service.corpus_version(), "Corpus version updated.");

	Ok(Json(CorpusVersionBody { corpus_version: state.service.corpus_version() }))
}

fn authorize(state: &AppState, headers: &HeaderMap) -> Result<(), ApiError> {
	let Some(token) = state.service.cfg.security.api_auth_token.as_deref() else {
		return Ok(());
	};
	let presented = headers
		.get(header::AUTHORIZATION)
		.and_then(|value| value.to_str().ok())
		.and_then(|value| value.strip_prefix("Bearer "));

	if presented.map(str::trim) == Some(token) {
		return Ok(());
	}

	Err(ApiError::new(StatusCode::UNAUTHORIZED, "UNAUTHORIZED", "Missing or invalid bearer token."))
}

#[derive(Debug, Serialize)]
struct ErrorBody {
	error_code: String,
	message: String,
	#[serde(skip_serializing_if = "Option::is_none")]
	partial: Option<Box<RetrievalResponse>>,
}

#[derive(Debug)]
pub struct ApiError {
	status: StatusCode,
	error_code: String,
	message: String,
	partial: Option<Box<RetrievalResponse>>,
}
impl ApiError {
	fn new(status: StatusCode, error_code: impl Into<String>, message: impl Into<String>) -> Self {
		Self { status, error_code: error_code.into(), message: message.into(), partial: None }
	}
}
impl From<ServiceError> for ApiError {
	fn from(err: ServiceError) -> Self {
		match err {
			ServiceError::InvalidRequest { message } =>
				Self::new(StatusCode::BAD_REQUEST, "INVALID_REQUEST", message),
			ServiceError::RetrievalUnavailable { message, partial } => Self {
				status: StatusCode::SERVICE_UNAVAILABLE,
				error_code: "RETRIEVAL_UNAVAILABLE".to_string(),
				message,
				partial: Some(partial),
			},
		}
	}
}
impl IntoResponse for ApiError {
	fn into_response(self) -> Response {
		let body =
			ErrorBody { error_code: self.error_code, message: self.message, partial: self.partial };

		(self.status, Json(body)).into_response()
	}
}
