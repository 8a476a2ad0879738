use crate::types::RetrievalResponse;

pub type Result<T, E = Error> = std::result::Result<T, E>;

/// Failures that abort a request. Recoverable problems are reported as
/// [`crate::Degradation`] inside the response instead.
#[derive(Debug, thiserror::Error)]
pub enum Error {
	#[error("Invalid request: {message}")]
	InvalidRequest { message: String },
	/// The vector index or embedder could not be reached. `partial` holds whatever was assembled
	/// before the failure, with its state set to `Failed`.
	#[error("Retrieval unavailable: {message}")]
	RetrievalUnavailable { message: String, partial: Box<RetrievalResponse> },
}
