use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Filter, Query, QueryPointsBuilder, ScoredPoint, Value, point_id::PointIdOptions,
	value::Kind,
};

use crate::{Error, Result, models::ScoredChunk};

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &sift_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self { client, collection: cfg.collection.clone(), vector_dim: cfg.vector_dim })
	}

	/// Nearest-neighbour search, optionally restricted to a set of documents.
	pub async fn search(
		&self,
		vector: Vec<f32>,
		limit: u64,
		document_ids: &[String],
	) -> Result<Vec<ScoredChunk>> {
		if vector.len() != self.vector_dim as usize {
			return Err(Error::InvalidArgument(format!(
				"Query vector has {} dimensions, collection expects {}.",
				vector.len(),
				self.vector_dim
			)));
		}

		let mut search = QueryPointsBuilder::new(self.collection.clone())
			.query(Query::new_nearest(vector))
			.limit(limit)
			.with_payload(true);

		if !document_ids.is_empty() {
			search =
				search.filter(Filter::must([Condition::matches("document_id", document_ids.to_vec())]));
		}

		let response = self.client.query(search).await?;

		Ok(response.result.iter().filter_map(chunk_from_point).collect())
	}
}

fn chunk_from_point(point: &ScoredPoint) -> Option<ScoredChunk> {
	let payload = &point.payload;
	let chunk_id = payload_string(payload, "chunk_id")
		.or_else(|| point.id.as_ref().and_then(|id| point_id_string(&id.point_id_options)))?;
	let document_id = payload_string(payload, "document_id")?;
	let content = payload_string(payload, "content")?;
	let span = match (payload_u64(payload, "start_offset"), payload_u64(payload, "end_offset")) {
		(Some(start), Some(end)) if start <= end => Some((start, end)),
		_ => None,
	};

	Some(ScoredChunk { chunk_id, document_id, content, score: point.score, span })
}

fn point_id_string(options: &Option<PointIdOptions>) -> Option<String> {
	match options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(num)) => Some(num.to_string()),
		None => None,
	}
}

fn payload_string(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		Some(Kind::IntegerValue(value)) => Some(value.to_string()),
		_ => None,
	}
}

fn payload_u64(payload: &HashMap<String, Value>, key: &str) -> Option<u64> {
	match &payload.get(key)?.kind {
		Some(Kind::IntegerValue(value)) => u64::try_from(*value).ok(),
		Some(Kind::DoubleValue(value)) if value.fract() == 0.0 && *value >= 0.0 => Some(*value as u64),
		_ => None,
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn payload(entries: &[(&str, Value)]) -> HashMap<String, Value> {
		entries.iter().map(|(key, value)| (key.to_string(), value.clone())).collect()
	}

	#[test]
	fn reads_string_and_integer_payload_fields() {
		let payload = payload(&[
			("chunk_id", Value::from("c-1")),
			("document_id", Value::from(42_i64)),
			("start_offset", Value::from(120_i64)),
		]);

		assert_eq!(payload_string(&payload, "chunk_id").as_deref(), Some("c-1"));
		assert_eq!(payload_string(&payload, "document_id").as_deref(), Some("42"));
		assert_eq!(payload_u64(&payload, "start_offset"), Some(120));
		assert_eq!(payload_u64(&payload, "end_offset"), None);
	}

	#[test]
	fn negative_offsets_are_ignored() {
		let payload = payload(&[("start_offset", Value::from(-5_i64))]);

		assert_eq!(payload_u64(&payload, "start_offset"), None);
	}

	#[test]
	fn point_without_content_is_skipped() {
		let point = ScoredPoint {
			payload: payload(&[("chunk_id", Value::from("c-1")), ("document_id", Value::from("d"))]),
			score: 0.5,
			..Default::default()
		};

		assert!(chunk_from_point(&point).is_none());
	}

	#[test]
	fn point_maps_span_and_score() {
		let point = ScoredPoint {
			payload: payload(&[
				("chunk_id", Value::from("c-1")),
				("document_id", Value::from("doc-a")),
				("content", Value::from("Stabilium is an alloy.")),
				("start_offset", Value::from(0_i64)),
				("end_offset", Value::from(22_i64)),
			]),
			score: 0.81,
			..Default::default()
		};
		let chunk = chunk_from_point(&point).expect("Point should map to a chunk.");

		assert_eq!(chunk.chunk_id, "c-1");
		assert_eq!(chunk.span, Some((0, 22)));
		assert!((chunk.score - 0.81).abs() < 1e-6);
	}
}
