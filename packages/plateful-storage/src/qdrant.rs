//! Qdrant-backed corpus store.
//!
//! Each corpus lives in its own collection with two named vectors per point:
//! a dense embedding and a BM25 sparse vector. The two paths are queried
//! separately; candidate fusion happens in the service layer, which also
//! uses the BM25 path alone for degraded-mode retrieval.

pub const DENSE_VECTOR_NAME: &str = "dense";
pub const BM25_VECTOR_NAME: &str = "bm25";
pub const BM25_MODEL: &str = "qdrant/bm25";

use std::collections::HashMap;

use qdrant_client::qdrant::{
	Condition, Document, Filter, Query, QueryPointsBuilder, Range, ScoredPoint, Value,
	point_id::PointIdOptions, value::Kind,
};

use plateful_domain::{
	Corpus,
	constraint::{Clause, ItemAttributes, Predicate},
};

use crate::Result;

/// A corpus document pulled back from the index, payload already decoded.
#[derive(Debug, Clone, PartialEq)]
pub struct RetrievedDoc {
	pub id: String,
	pub score: f32,
	pub text: String,
	pub attributes: ItemAttributes,
}

pub struct QdrantStore {
	pub client: qdrant_client::Qdrant,
	pub food_collection: String,
	pub manual_collection: String,
	pub vector_dim: u32,
}
impl QdrantStore {
	pub fn new(cfg: &plateful_config::Qdrant) -> Result<Self> {
		let client = qdrant_client::Qdrant::from_url(&cfg.url).build()?;

		Ok(Self {
			client,
			food_collection: cfg.food_collection.clone(),
			manual_collection: cfg.manual_collection.clone(),
			vector_dim: cfg.vector_dim,
		})
	}

	pub fn collection(&self, corpus: Corpus) -> &str {
		match corpus {
			Corpus::Food => &self.food_collection,
			Corpus::Manual => &self.manual_collection,
		}
	}

	/// Filtered nearest-neighbor query against the dense vector.
	pub async fn dense_query(
		&self,
		corpus: Corpus,
		query_vector: &[f32],
		predicate: &Predicate,
		limit: u64,
	) -> Result<Vec<RetrievedDoc>> {
		let search = QueryPointsBuilder::new(self.collection(corpus))
			.query(Query::new_nearest(query_vector.to_vec()))
			.using(DENSE_VECTOR_NAME)
			.filter(predicate_to_filter(predicate))
			.with_payload(true)
			.limit(limit);
		let response = self.client.query(search).await?;

		Ok(decode_points(response.result))
	}

	/// BM25-only query over the raw text.
	pub async fn keyword_query(
		&self,
		corpus: Corpus,
		query_text: &str,
		predicate: &Predicate,
		limit: u64,
	) -> Result<Vec<RetrievedDoc>> {
		let search = QueryPointsBuilder::new(self.collection(corpus))
			.query(Query::new_nearest(Document::new(query_text, BM25_MODEL)))
			.using(BM25_VECTOR_NAME)
			.filter(predicate_to_filter(predicate))
			.with_payload(true)
			.limit(limit);
		let response = self.client.query(search).await?;

		Ok(decode_points(response.result))
	}
}

/// Translate a compiled predicate into a Qdrant payload filter. Ranges and
/// slot flags become `must` conditions, tag exclusions become `must_not`.
pub fn predicate_to_filter(predicate: &Predicate) -> Filter {
	let mut must = Vec::new();
	let mut must_not = Vec::new();

	for clause in &predicate.clauses {
		match clause {
			Clause::Range { field, min, max } => must.push(Condition::range(
				field.as_str(),
				Range { gte: *min, lte: *max, gt: None, lt: None },
			)),
			Clause::Slot { field } => must.push(Condition::matches(field.as_str(), true)),
			Clause::ExcludeTag { tag } =>
				must_not.push(Condition::matches("tags", tag.to_lowercase())),
		}
	}

	Filter { must, must_not, should: Vec::new(), min_should: None }
}

fn decode_points(points: Vec<ScoredPoint>) -> Vec<RetrievedDoc> {
	points
		.into_iter()
		.filter_map(|point| {
			let id = point.id.as_ref().and_then(point_id_to_string)?;
			let text = payload_str(&point.payload, "text")?;
			let attributes = decode_attributes(&point.payload);

			Some(RetrievedDoc { id, score: point.score, text, attributes })
		})
		.collect()
}

fn decode_attributes(payload: &HashMap<String, Value>) -> ItemAttributes {
	ItemAttributes {
		name: payload_str(payload, "name").unwrap_or_default(),
		calories: payload_f64(payload, "calories").unwrap_or_default(),
		protein_g: payload_f64(payload, "protein_g").unwrap_or_default(),
		carbs_g: payload_f64(payload, "carbs_g").unwrap_or_default(),
		fat_g: payload_f64(payload, "fat_g").unwrap_or_default(),
		fiber_g: payload_f64(payload, "fiber_g").unwrap_or_default(),
		total_time_minutes: payload_f64(payload, "total_time_minutes").unwrap_or_default(),
		is_breakfast: payload_bool(payload, "is_breakfast").unwrap_or_default(),
		is_lunch: payload_bool(payload, "is_lunch").unwrap_or_default(),
		is_dinner: payload_bool(payload, "is_dinner").unwrap_or_default(),
		is_snack: payload_bool(payload, "is_snack").unwrap_or_default(),
		tags: payload_str_list(payload, "tags"),
	}
}

fn point_id_to_string(point_id: &qdrant_client::qdrant::PointId) -> Option<String> {
	match &point_id.point_id_options {
		Some(PointIdOptions::Uuid(id)) => Some(id.clone()),
		Some(PointIdOptions::Num(num)) => Some(num.to_string()),
		None => None,
	}
}

fn payload_str(payload: &HashMap<String, Value>, key: &str) -> Option<String> {
	match &payload.get(key)?.kind {
		Some(Kind::StringValue(text)) => Some(text.clone()),
		_ => None,
	}
}

fn payload_f64(payload: &HashMap<String, Value>, key: &str) -> Option<f64> {
	match &payload.get(key)?.kind {
		Some(Kind::DoubleValue(value)) => Some(*value),
		Some(Kind::IntegerValue(value)) => Some(*value as f64),
		_ => None,
	}
}

fn payload_bool(payload: &HashMap<String, Value>, key: &str) -> Option<bool> {
	match &payload.get(key)?.kind {
		Some(Kind::BoolValue(value)) => Some(*value),
		_ => None,
	}
}

fn payload_str_list(payload: &HashMap<String, Value>, key: &str) -> Vec<String> {
	let Some(Value { kind: Some(Kind::ListValue(list)) }) = payload.get(key) else {
		return Vec::new();
	};

	list.values
		.iter()
		.filter_map(|value| match &value.kind {
			Some(Kind::StringValue(text)) => Some(text.clone()),
			_ => None,
		})
		.collect()
}
